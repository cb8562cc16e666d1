//! Ordered plugin storage with lifecycle bookkeeping
//!
//! Plugins are kept in registration order, which is also the order in which
//! they are started, stopped and notified. Layer plugins form a separate
//! subset keyed by name that can be edited independently of the main registry.
//! Start and stop are tracked per plugin, so calling them twice is harmless.

use crate::{
    core::state::ModuleHandle,
    plugins::base::{PluginContext, SharedPlugin},
    prelude::HashMap,
    MapError, Result,
};
use std::fmt;

/// Lifecycle hook that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Register,
    Unregister,
    Start,
    Stop,
    SetState,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecyclePhase::Register => write!(f, "register"),
            LifecyclePhase::Unregister => write!(f, "unregister"),
            LifecyclePhase::Start => write!(f, "start"),
            LifecyclePhase::Stop => write!(f, "stop"),
            LifecyclePhase::SetState => write!(f, "restore state"),
        }
    }
}

/// A plugin hook that returned an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginFailure {
    pub plugin: String,
    pub phase: LifecyclePhase,
    pub message: String,
}

impl PluginFailure {
    pub(crate) fn new(plugin: &str, phase: LifecyclePhase, error: MapError) -> Self {
        Self {
            plugin: plugin.to_string(),
            phase,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for PluginFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed to {}: {}", self.plugin, self.phase, self.message)
    }
}

struct Entry {
    plugin: SharedPlugin,
    started: bool,
}

#[derive(Default)]
pub struct PluginRegistry {
    order: Vec<String>,
    plugins: HashMap<String, Entry>,
    layer_plugins: Vec<(String, SharedPlugin)>,
}

pub(crate) fn collected(failures: Vec<PluginFailure>) -> Result<()> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(MapError::PluginLifecycle(failures))
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches the plugin to the module and stores it under its name.
    ///
    /// Names are unique: registering a second plugin under a taken name is
    /// rejected and leaves the first one untouched.
    pub fn register(&mut self, plugin: SharedPlugin, module: &ModuleHandle) -> Result<()> {
        let (name, is_layer_plugin) = {
            let mut guard = plugin.lock();
            let name = guard.name().to_string();
            if name.is_empty() {
                return Err(MapError::Plugin("plugin name must not be empty".to_string()));
            }
            if self.plugins.contains_key(&name) {
                return Err(MapError::DuplicatePlugin(name));
            }

            guard.set_map_module(Some(module.clone()));
            if let Err(err) = guard.register() {
                guard.set_map_module(None);
                return Err(MapError::PluginLifecycle(vec![PluginFailure::new(
                    &name,
                    LifecyclePhase::Register,
                    err,
                )]));
            }
            (name, guard.is_layer_plugin())
        };

        log::debug!("Registered plugin {}", name);
        if is_layer_plugin {
            self.set_layer_plugin(&name, Some(plugin.clone()));
        }
        self.order.push(name.clone());
        self.plugins.insert(
            name,
            Entry {
                plugin,
                started: false,
            },
        );
        Ok(())
    }

    /// Stops the plugin if needed, runs its unregister hook and detaches it.
    ///
    /// The plugin is removed even if a hook fails; the failures are returned.
    pub fn unregister(&mut self, name: &str, ctx: &mut PluginContext<'_>) -> Result<SharedPlugin> {
        let mut failures = Vec::new();
        if let Err(MapError::PluginLifecycle(mut stop_failures)) = self.stop_plugin(name, ctx) {
            failures.append(&mut stop_failures);
        }

        let entry = self
            .plugins
            .remove(name)
            .ok_or_else(|| MapError::PluginNotFound(name.to_string()))?;
        self.order.retain(|n| n != name);
        self.layer_plugins.retain(|(n, _)| n != name);

        {
            let mut plugin = entry.plugin.lock();
            if let Err(err) = plugin.unregister() {
                failures.push(PluginFailure::new(name, LifecyclePhase::Unregister, err));
            }
            plugin.set_map_module(None);
        }
        log::debug!("Unregistered plugin {}", name);

        collected(failures)?;
        Ok(entry.plugin)
    }

    /// Starts a single plugin; a started plugin is not started again
    pub fn start_plugin(&mut self, name: &str, ctx: &mut PluginContext<'_>) -> Result<()> {
        let entry = self
            .plugins
            .get_mut(name)
            .ok_or_else(|| MapError::PluginNotFound(name.to_string()))?;
        if entry.started {
            return Ok(());
        }
        let result = entry.plugin.lock().start_plugin(ctx);
        match result {
            Ok(()) => {
                entry.started = true;
                log::debug!("Started plugin {}", name);
                Ok(())
            }
            Err(err) => Err(MapError::PluginLifecycle(vec![PluginFailure::new(
                name,
                LifecyclePhase::Start,
                err,
            )])),
        }
    }

    /// Stops a single plugin; stopping a plugin that is not running does nothing
    pub fn stop_plugin(&mut self, name: &str, ctx: &mut PluginContext<'_>) -> Result<()> {
        let entry = self
            .plugins
            .get_mut(name)
            .ok_or_else(|| MapError::PluginNotFound(name.to_string()))?;
        if !entry.started {
            return Ok(());
        }
        let result = entry.plugin.lock().stop_plugin(ctx);
        // a failing stop still counts as stopped
        entry.started = false;
        match result {
            Ok(()) => {
                log::debug!("Stopped plugin {}", name);
                Ok(())
            }
            Err(err) => Err(MapError::PluginLifecycle(vec![PluginFailure::new(
                name,
                LifecyclePhase::Stop,
                err,
            )])),
        }
    }

    /// Starts every plugin in registration order, collecting failures
    pub fn start_all(&mut self, ctx: &mut PluginContext<'_>) -> Result<()> {
        let mut failures = Vec::new();
        for name in self.order.clone() {
            if let Err(MapError::PluginLifecycle(mut errs)) = self.start_plugin(&name, ctx) {
                failures.append(&mut errs);
            }
        }
        collected(failures)
    }

    /// Stops every plugin in registration order, collecting failures
    pub fn stop_all(&mut self, ctx: &mut PluginContext<'_>) -> Result<()> {
        let mut failures = Vec::new();
        for name in self.order.clone() {
            if let Err(MapError::PluginLifecycle(mut errs)) = self.stop_plugin(&name, ctx) {
                failures.append(&mut errs);
            }
        }
        collected(failures)
    }

    /// Adds (`Some`) or removes (`None`) a layer plugin under the given name
    pub fn set_layer_plugin(&mut self, name: &str, plugin: Option<SharedPlugin>) {
        if name.is_empty() {
            log::warn!("Tried to set a layer plugin without an id");
            return;
        }
        match plugin {
            Some(plugin) => {
                if let Some(slot) = self.layer_plugins.iter_mut().find(|(n, _)| n == name) {
                    slot.1 = plugin;
                } else {
                    self.layer_plugins.push((name.to_string(), plugin));
                }
            }
            None => self.layer_plugins.retain(|(n, _)| n != name),
        }
    }

    pub fn is_plugin_activated(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    pub fn is_started(&self, name: &str) -> bool {
        self.plugins.get(name).is_some_and(|entry| entry.started)
    }

    pub fn get(&self, name: &str) -> Option<SharedPlugin> {
        self.plugins.get(name).map(|entry| entry.plugin.clone())
    }

    /// Plugin names in registration order
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// All plugins in registration order
    pub fn plugins(&self) -> Vec<SharedPlugin> {
        self.order
            .iter()
            .filter_map(|name| self.get(name))
            .collect()
    }

    pub fn layer_plugin(&self, name: &str) -> Option<SharedPlugin> {
        self.layer_plugins
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, plugin)| plugin.clone())
    }

    /// Layer plugins in the order they were set
    pub fn layer_plugins(&self) -> Vec<SharedPlugin> {
        self.layer_plugins
            .iter()
            .map(|(_, plugin)| plugin.clone())
            .collect()
    }

    pub fn layer_plugin_names(&self) -> Vec<String> {
        self.layer_plugins.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.order)
            .field("layer_plugins", &self.layer_plugin_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::{extent::MapExtent, scales::ScaleResolutionModel, state::MapStateStore},
        engine::HeadlessEngine,
        events::RequestQueue,
        plugins::base::{shared, BasePlugin, Plugin},
        ui::controls::ControlRegistry,
    };
    use std::sync::Arc;

    struct Counting {
        name: &'static str,
        starts: usize,
        stops: usize,
        fail_start: bool,
        layer: bool,
        module: Option<ModuleHandle>,
    }

    impl Counting {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                starts: 0,
                stops: 0,
                fail_start: false,
                layer: false,
                module: None,
            }
        }
    }

    impl Plugin for Counting {
        fn name(&self) -> &str {
            self.name
        }

        fn set_map_module(&mut self, module: Option<ModuleHandle>) {
            self.module = module;
        }

        fn map_module(&self) -> Option<&ModuleHandle> {
            self.module.as_ref()
        }

        fn start_plugin(&mut self, _ctx: &mut PluginContext<'_>) -> Result<()> {
            if self.fail_start {
                return Err(MapError::Plugin("no container".to_string()));
            }
            self.starts += 1;
            Ok(())
        }

        fn stop_plugin(&mut self, _ctx: &mut PluginContext<'_>) -> Result<()> {
            self.stops += 1;
            Ok(())
        }

        fn is_layer_plugin(&self) -> bool {
            self.layer
        }
    }

    struct Fixture {
        handle: ModuleHandle,
        engine: HeadlessEngine,
        controls: ControlRegistry,
        requests: RequestQueue,
    }

    impl Fixture {
        fn new() -> Self {
            let store = MapStateStore::new(MapExtent::default(), "EPSG:3067".into());
            let ladder = ScaleResolutionModel::from_resolutions(vec![10.0, 1.0], |r| r).unwrap();
            Self {
                handle: ModuleHandle::new("mainMapModule", &store, Arc::new(ladder)),
                engine: HeadlessEngine::new(crate::core::geo::Size::new(10.0, 10.0)),
                controls: ControlRegistry::new(),
                requests: RequestQueue::new(),
            }
        }

        fn ctx(&mut self) -> PluginContext<'_> {
            PluginContext {
                module: &self.handle,
                engine: &mut self.engine,
                controls: &mut self.controls,
                requests: &mut self.requests,
            }
        }
    }

    #[test]
    fn test_register_sets_module_reference() {
        let fixture = Fixture::new();
        let mut registry = PluginRegistry::new();
        let plugin = Arc::new(parking_lot::Mutex::new(Counting::new("A")));
        registry.register(plugin.clone(), &fixture.handle).unwrap();

        assert!(registry.is_plugin_activated("A"));
        assert!(plugin.lock().map_module().is_some());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let fixture = Fixture::new();
        let mut registry = PluginRegistry::new();
        registry
            .register(shared(BasePlugin::new("A")), &fixture.handle)
            .unwrap();
        let result = registry.register(shared(BasePlugin::new("A")), &fixture.handle);
        assert!(matches!(result, Err(MapError::DuplicatePlugin(name)) if name == "A"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_clears_module_reference() {
        let mut fixture = Fixture::new();
        let mut registry = PluginRegistry::new();
        let plugin = Arc::new(parking_lot::Mutex::new(Counting::new("A")));
        registry.register(plugin.clone(), &fixture.handle).unwrap();
        registry.start_plugin("A", &mut fixture.ctx()).unwrap();

        registry.unregister("A", &mut fixture.ctx()).unwrap();
        assert!(!registry.is_plugin_activated("A"));
        let plugin = plugin.lock();
        assert!(plugin.map_module().is_none());
        assert_eq!(plugin.stops, 1);
    }

    #[test]
    fn test_unregister_unknown_plugin() {
        let mut fixture = Fixture::new();
        let mut registry = PluginRegistry::new();
        let result = registry.unregister("missing", &mut fixture.ctx());
        assert!(matches!(result, Err(MapError::PluginNotFound(_))));
    }

    #[test]
    fn test_start_is_idempotent() {
        let mut fixture = Fixture::new();
        let mut registry = PluginRegistry::new();
        let plugin = Arc::new(parking_lot::Mutex::new(Counting::new("A")));
        registry.register(plugin.clone(), &fixture.handle).unwrap();

        registry.start_all(&mut fixture.ctx()).unwrap();
        registry.start_all(&mut fixture.ctx()).unwrap();
        registry.stop_all(&mut fixture.ctx()).unwrap();
        registry.stop_all(&mut fixture.ctx()).unwrap();

        let plugin = plugin.lock();
        assert_eq!(plugin.starts, 1);
        assert_eq!(plugin.stops, 1);
    }

    #[test]
    fn test_start_all_collects_failures() {
        let mut fixture = Fixture::new();
        let mut registry = PluginRegistry::new();
        let mut broken = Counting::new("Broken");
        broken.fail_start = true;
        let broken = Arc::new(parking_lot::Mutex::new(broken));
        let healthy = Arc::new(parking_lot::Mutex::new(Counting::new("Healthy")));
        registry.register(broken, &fixture.handle).unwrap();
        registry.register(healthy.clone(), &fixture.handle).unwrap();

        let result = registry.start_all(&mut fixture.ctx());
        let Err(MapError::PluginLifecycle(failures)) = result else {
            panic!("expected lifecycle failures");
        };
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].plugin, "Broken");
        assert_eq!(failures[0].phase, LifecyclePhase::Start);
        assert_eq!(healthy.lock().starts, 1);
        assert!(!registry.is_started("Broken"));
    }

    #[test]
    fn test_layer_plugins_subset() {
        let fixture = Fixture::new();
        let mut registry = PluginRegistry::new();
        let mut wms = Counting::new("WmsLayerPlugin");
        wms.layer = true;
        registry
            .register(Arc::new(parking_lot::Mutex::new(wms)), &fixture.handle)
            .unwrap();
        registry
            .register(shared(BasePlugin::new("LogoPlugin")), &fixture.handle)
            .unwrap();

        assert_eq!(registry.layer_plugin_names(), vec!["WmsLayerPlugin"]);
        assert!(registry.layer_plugin("LogoPlugin").is_none());

        registry.set_layer_plugin("WmsLayerPlugin", None);
        assert!(registry.layer_plugins().is_empty());
        assert!(registry.is_plugin_activated("WmsLayerPlugin"));

        registry.set_layer_plugin("", Some(shared(BasePlugin::new("x"))));
        assert!(registry.layer_plugins().is_empty());
    }

    #[test]
    fn test_registration_order_kept() {
        let fixture = Fixture::new();
        let mut registry = PluginRegistry::new();
        for name in ["C", "A", "B"] {
            registry
                .register(shared(BasePlugin::new(name)), &fixture.handle)
                .unwrap();
        }
        assert_eq!(registry.names(), ["C", "A", "B"]);
    }
}
