use crate::{
    core::state::ModuleHandle,
    engine::{EngineLayerRef, MapEngine},
    events::{MapEvent, MapRequest, RequestQueue},
    layers::MapLayer,
    ui::controls::ControlRegistry,
    Result,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// What a plugin gets to work with while the module calls into it
pub struct PluginContext<'a> {
    pub module: &'a ModuleHandle,
    pub engine: &'a mut dyn MapEngine,
    pub controls: &'a mut ControlRegistry,
    pub requests: &'a mut RequestQueue,
}

impl<'a> PluginContext<'a> {
    /// Queues a request for the module; it runs once the current call returns
    pub fn request(&mut self, request: MapRequest) {
        self.requests.push(request);
    }
}

/// Work a layer plugin wants done after every layer plugin has seen a new layer
pub type DeferredAction = Box<dyn FnOnce(&mut PluginContext<'_>) + Send>;

/// Plugin handle shared between the caller and the module
pub type SharedPlugin = Arc<Mutex<dyn Plugin>>;

/// Wraps a plugin for registration
pub fn shared<P: Plugin + 'static>(plugin: P) -> SharedPlugin {
    Arc::new(Mutex::new(plugin))
}

/// A component cooperating with the map module.
///
/// Lifecycle: `register` (attach, no side effects) → `start_plugin` →
/// `stop_plugin` → `unregister`. Everything except [`Plugin::name`] has a
/// default, so a plugin only implements what it takes part in.
pub trait Plugin: Send {
    /// Unique key of the plugin within a module
    fn name(&self) -> &str;

    /// Set on register, cleared on unregister
    fn set_map_module(&mut self, _module: Option<ModuleHandle>) {}

    fn map_module(&self) -> Option<&ModuleHandle> {
        None
    }

    fn register(&mut self) -> Result<()> {
        Ok(())
    }

    fn unregister(&mut self) -> Result<()> {
        Ok(())
    }

    fn start_plugin(&mut self, _ctx: &mut PluginContext<'_>) -> Result<()> {
        Ok(())
    }

    fn stop_plugin(&mut self, _ctx: &mut PluginContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Called for every event the module dispatches while the plugin is registered
    fn on_event(&mut self, _event: &MapEvent, _ctx: &mut PluginContext<'_>) {}

    /// Serializable state, if the plugin has any
    fn state(&self) -> Option<serde_json::Value> {
        None
    }

    /// Whether [`Plugin::set_state`] should be called on state restore
    fn accepts_state(&self) -> bool {
        false
    }

    fn set_state(&mut self, _state: serde_json::Value) -> Result<()> {
        Ok(())
    }

    /// Link parameters describing the plugin state, e.g. `"&markers=..."`
    fn state_parameters(&self) -> Option<String> {
        None
    }

    /// Plugins with a UI follow the module tool style
    fn has_ui(&self) -> bool {
        false
    }

    /// `None` means the plugin's own default look
    fn change_tool_style(&mut self, _style: Option<&str>, _ctx: &mut PluginContext<'_>) {}

    fn change_font(&mut self, _font: Option<&str>, _ctx: &mut PluginContext<'_>) {}

    /// Layer plugins render map layers and are kept in the layer plugin subset
    fn is_layer_plugin(&self) -> bool {
        false
    }

    fn is_layer_supported(&self, _layer: &MapLayer) -> bool {
        true
    }

    /// Adds the layer to the engine. A returned action runs after all layer plugins were asked.
    fn add_map_layer_to_map(
        &mut self,
        _layer: &MapLayer,
        _keep_layers_order: bool,
        _is_basemap: bool,
        _ctx: &mut PluginContext<'_>,
    ) -> Result<Option<DeferredAction>> {
        Ok(None)
    }

    /// Engine layers this plugin created for the given layer
    fn engine_layers(&self, _layer: &MapLayer) -> Vec<EngineLayerRef> {
        Vec::new()
    }

    /// Adds layers that were selected before the module started
    fn preselect_layers(&mut self, _layers: &[MapLayer], _ctx: &mut PluginContext<'_>) {}

    /// Refreshes a layer the plugin has on the map
    fn update_layer(
        &mut self,
        _layer: &MapLayer,
        _force_redraw: bool,
        _params: Option<&serde_json::Value>,
        _ctx: &mut PluginContext<'_>,
    ) {
    }
}

/// Plugin without behaviour of its own, keeping only the module reference
pub struct BasePlugin {
    pub name: String,
    pub has_ui: bool,
    module: Option<ModuleHandle>,
}

impl BasePlugin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            has_ui: false,
            module: None,
        }
    }
}

impl Plugin for BasePlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_map_module(&mut self, module: Option<ModuleHandle>) {
        self.module = module;
    }

    fn map_module(&self) -> Option<&ModuleHandle> {
        self.module.as_ref()
    }

    fn has_ui(&self) -> bool {
        self.has_ui
    }
}
