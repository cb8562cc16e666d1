//! The map module facade
//!
//! [`MapModule`] owns the engine adapter, the state store, the plugin and
//! control registries and the event router. Every public operation follows
//! the same shape: validate through the ladder, call the engine, refresh the
//! state store from the engine, then notify. Notifications are delivered
//! synchronously; requests queued by listeners run right after the delivery
//! that produced them.

use crate::{
    background::geolocation::{
        GeolocationOptions, GeolocationProvider, GeolocationService, LocationCallback, QueryId,
    },
    core::{
        config::{ResolvedOptions, Units},
        constants::{GEOLOCATION_SRS_NAME, MAX_DISPATCH_DEPTH},
        extent::MapExtent,
        geo::{LonLat, Size},
        scales::ScaleResolutionModel,
        state::{MapState, MapStateStore, ModuleHandle},
    },
    engine::{EngineConfig, EngineLayerRef, MapEngine},
    events::{
        EventKind, EventRouter, ListenerId, MapEvent, MapRequest, MoveZoom, RequestQueue,
    },
    layers::{LayerSelection, MapLayer},
    plugins::{
        registry::collected, LifecyclePhase, PluginContext, PluginFailure, PluginRegistry,
        SharedPlugin,
    },
    ui::{
        controls::{ControlRef, ControlRegistry},
        style::ToolStyle,
    },
    MapError, Result,
};
use std::sync::Arc;

/// Builds a [`PluginContext`] from disjoint module fields
macro_rules! plugin_ctx {
    ($module:ident, $requests:expr) => {
        PluginContext {
            module: &$module.handle,
            engine: $module.engine.as_mut(),
            controls: &mut $module.controls,
            requests: $requests,
        }
    };
}

pub struct MapModule {
    id: String,
    name: String,
    image_url: String,
    map_element_id: Option<String>,
    srs_name: String,
    units: Units,
    max_extent: MapExtent,
    style: ToolStyle,
    ladder: Arc<ScaleResolutionModel>,
    store: MapStateStore,
    handle: ModuleHandle,
    engine: Box<dyn MapEngine>,
    controls: ControlRegistry,
    plugins: PluginRegistry,
    router: EventRouter,
    selection: LayerSelection,
    geolocation: GeolocationService,
    started: bool,
    layer_tools_edit_mode: bool,
    dispatch_depth: usize,
}

impl MapModule {
    pub(crate) fn new(
        id: String,
        image_url: String,
        map_element_id: Option<String>,
        options: ResolvedOptions,
        mut engine: Box<dyn MapEngine>,
        geolocation: Option<Box<dyn GeolocationProvider>>,
    ) -> Result<Self> {
        let config = EngineConfig {
            map_element_id: map_element_id.clone(),
            options,
        };
        engine.create_map(&config)?;
        let ResolvedOptions {
            resolutions,
            max_extent,
            srs_name,
            units,
            style,
        } = config.options;

        let ladder = ScaleResolutionModel::from_resolutions(resolutions, |resolution| {
            engine.scale_for_resolution(resolution, units)
        })?;
        let ladder = Arc::new(ladder);

        let name = format!("{}MapModule", id);
        let store = MapStateStore::new(max_extent, srs_name.clone());
        let handle = ModuleHandle::new(&name, &store, Arc::clone(&ladder));

        let module = Self {
            id,
            name,
            image_url,
            map_element_id,
            srs_name,
            units,
            max_extent,
            style,
            ladder,
            store,
            handle,
            engine,
            controls: ControlRegistry::new(),
            plugins: PluginRegistry::new(),
            router: EventRouter::new(),
            selection: LayerSelection::new(),
            geolocation: GeolocationService::new(geolocation),
            started: false,
            layer_tools_edit_mode: false,
            dispatch_depth: 0,
        };
        module.update_domain();
        log::debug!(
            "Created {} with {} zoom levels in {}",
            module.name,
            module.ladder.len(),
            module.srs_name
        );
        Ok(module)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Module name, `<id>MapModule`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Base url for plugin images
    pub fn image_url(&self) -> &str {
        &self.image_url
    }

    pub fn map_element_id(&self) -> Option<&str> {
        self.map_element_id.as_deref()
    }

    /// Projection code of the map
    pub fn projection(&self) -> &str {
        &self.srs_name
    }

    pub fn units(&self) -> Units {
        self.units
    }

    pub fn max_extent(&self) -> MapExtent {
        self.max_extent
    }

    /// Read-only handle for plugins and other components
    pub fn handle(&self) -> ModuleHandle {
        self.handle.clone()
    }

    pub fn engine(&self) -> &dyn MapEngine {
        self.engine.as_ref()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_in_layer_tools_edit_mode(&self) -> bool {
        self.layer_tools_edit_mode
    }

    /// Starts all plugins, hands preselected layers to the layer plugins and
    /// starts the engine. Plugin failures are returned after every plugin was
    /// tried; the module is started regardless.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }
        log::debug!("Starting {}", self.name);

        let result = self.start_plugins();
        self.update_current_state();
        self.started = self.engine.start();
        result
    }

    /// Stops all plugins and the engine
    pub fn stop(&mut self) -> Result<()> {
        if !self.started {
            return Ok(());
        }
        log::debug!("Stopping {}", self.name);

        let result = self.stop_plugins();
        self.started = self.engine.stop();
        result
    }

    /// Pushes the currently selected layers to every layer plugin
    fn update_current_state(&mut self) {
        let layers = self.selection.layers().to_vec();
        let mut requests = RequestQueue::new();
        for (name, plugin) in self
            .plugins
            .layer_plugin_names()
            .into_iter()
            .zip(self.plugins.layer_plugins())
        {
            log::debug!("Preselecting layers for {}", name);
            let mut ctx = plugin_ctx!(self, &mut requests);
            plugin.lock().preselect_layers(&layers, &mut ctx);
        }
        self.execute_requests(requests);
    }

    pub fn state(&self) -> MapState {
        self.store.snapshot()
    }

    pub fn map_center(&self) -> LonLat {
        self.store.center()
    }

    pub fn map_zoom(&self) -> usize {
        self.store.zoom()
    }

    pub fn map_scale(&self) -> f64 {
        self.store.scale()
    }

    pub fn resolution(&self) -> f64 {
        self.store.resolution()
    }

    pub fn size(&self) -> Size {
        self.store.size()
    }

    pub fn current_extent(&self) -> MapExtent {
        self.store.extent()
    }

    pub fn is_moving(&self) -> bool {
        self.store.is_moving()
    }

    /// Refreshes the state store from the engine
    pub fn update_domain(&self) {
        self.store.update_from_engine(
            self.engine.center(),
            self.engine.zoom(),
            self.engine.size(),
            self.engine.current_extent(),
            &self.ladder,
        );
    }

    pub fn ladder(&self) -> &ScaleResolutionModel {
        &self.ladder
    }

    pub fn resolutions(&self) -> &[f64] {
        self.ladder.resolutions()
    }

    pub fn scales(&self) -> &[f64] {
        self.ladder.scales()
    }

    pub fn max_zoom_level(&self) -> usize {
        self.ladder.max_zoom_level()
    }

    pub fn resolution_for_scale(&self, scale: f64) -> Option<f64> {
        self.ladder.resolution_for_scale(scale)
    }

    /// Closest zoom level to the current one where a layer with the given bounds is visible
    pub fn closest_zoom_level(&self, max_scale: Option<f64>, min_scale: Option<f64>) -> usize {
        self.ladder
            .closest_zoom_level(self.map_zoom(), max_scale, min_scale)
    }

    pub fn calculate_layer_scales(&self, max_scale: Option<f64>, min_scale: Option<f64>) -> Vec<f64> {
        self.ladder.layer_scales(max_scale, min_scale)
    }

    pub fn calculate_layer_resolutions(
        &self,
        max_scale: Option<f64>,
        min_scale: Option<f64>,
    ) -> Vec<f64> {
        self.ladder.layer_resolutions(max_scale, min_scale)
    }

    /// Current zoom adjusted by the given amount, or the current zoom if that is out of range
    pub fn new_zoom_level(&self, adjustment: i64) -> usize {
        self.ladder.new_zoom_level(self.map_zoom(), adjustment)
    }

    /// False for NaN values and for coordinates outside the max extent (edges included)
    pub fn is_valid_lon_lat(&self, lon: f64, lat: f64) -> bool {
        if lon.is_nan() || lat.is_nan() {
            return false;
        }
        self.max_extent.contains(lon, lat)
    }

    /// Transforms a position between projections through the engine
    pub fn transform_coordinates(&self, lonlat: LonLat, from_srs: &str, to_srs: &str) -> LonLat {
        if from_srs == to_srs {
            return lonlat;
        }
        self.engine.transform_coordinates(lonlat, from_srs, to_srs)
    }

    /// Sets moving and sends a move-start notification with the current center
    pub fn notify_start_move(&mut self) {
        self.store.set_moving(true);
        let center = self.engine.center();
        self.dispatch(MapEvent::MapMoveStart { center });
    }

    /// Clears moving, refreshes the state store and sends a move-end notification
    pub fn notify_move_end(&mut self, creator: Option<&str>) {
        self.emit_move_end(creator, false);
    }

    fn emit_move_end(&mut self, creator: Option<&str>, immediate: bool) {
        self.store.set_moving(false);
        self.update_domain();
        let state = self.store.snapshot();
        self.dispatch(MapEvent::AfterMapMove {
            center: state.center,
            zoom: state.zoom,
            scale: state.scale,
            creator: creator.map(str::to_string),
            immediate,
        });
    }

    /// Moves the map to the given position and zoom level.
    ///
    /// An invalid position is rejected (returns false); an out-of-range zoom
    /// keeps the current zoom.
    pub fn center_map(&mut self, center: LonLat, zoom: Option<usize>, suppress_end: bool) -> bool {
        if !self.is_valid_lon_lat(center.lon, center.lat) {
            log::warn!(
                "Ignoring move to {:?}, outside of the max extent of {}",
                center,
                self.name
            );
            return false;
        }
        let zoom = zoom
            .filter(|z| *z <= self.max_zoom_level())
            .unwrap_or_else(|| self.map_zoom());

        self.engine.pan_to(center, zoom, suppress_end);
        self.update_domain();
        if !suppress_end {
            self.notify_move_end(None);
        }
        true
    }

    /// Moves the map, silently unless a zoom adjustment is given.
    ///
    /// Call [`MapModule::notify_move_end`] afterwards to let others know
    /// about a silent move.
    pub fn move_map_to_lon_lat(&mut self, center: impl Into<LonLat>, zoom_adjust: Option<i64>) -> bool {
        let (zoom, silent) = match zoom_adjust.filter(|adjust| *adjust != 0) {
            Some(adjust) => (self.new_zoom_level(adjust), false),
            None => (self.map_zoom(), true),
        };
        self.center_map(center.into(), Some(zoom), silent)
    }

    /// Changes the zoom level by a relative amount; out-of-range adjustments are ignored
    pub fn adjust_zoom_level(&mut self, amount: i64, suppress_event: bool) {
        let zoom = self.new_zoom_level(amount);
        self.set_zoom_level(zoom as i64, suppress_event);
    }

    /// Sets an absolute zoom level; an out-of-range level keeps the current zoom
    pub fn set_zoom_level(&mut self, zoom: i64, suppress_event: bool) {
        let zoom = if self.ladder.is_valid_zoom(zoom) {
            zoom as usize
        } else {
            log::warn!("Zoom level {} out of range, keeping {}", zoom, self.map_zoom());
            self.map_zoom()
        };
        self.engine.set_zoom(zoom);
        self.update_domain();
        if !suppress_event {
            self.notify_move_end(None);
        }
    }

    /// Zooms to the ladder level matching the scale.
    ///
    /// With `prefer_closest` the level with the nearest scale is used instead
    /// of the bracket containing it. Returns false if no level matches.
    pub fn zoom_to_scale(&mut self, scale: f64, prefer_closest: bool, suppress_end: bool) -> bool {
        let zoom = if prefer_closest {
            self.ladder.nearest_zoom_for_scale(scale)
        } else {
            self.ladder
                .resolution_for_scale(scale)
                .and_then(|resolution| self.ladder.zoom_for_resolution(resolution))
        };
        match zoom {
            Some(zoom) => {
                self.set_zoom_level(zoom as i64, suppress_end);
                true
            }
            None => false,
        }
    }

    /// Pans the map by a pixel delta
    pub fn pan_map_by_pixels(
        &mut self,
        dx: f64,
        dy: f64,
        suppress_start: bool,
        suppress_end: bool,
        is_drag: bool,
    ) {
        if !dx.is_finite() || !dy.is_finite() {
            log::warn!("Ignoring pan by ({}, {})", dx, dy);
            return;
        }
        if !suppress_start {
            self.notify_start_move();
        }
        self.engine.pan_by_pixels(dx, dy);
        self.update_domain();
        if !suppress_end {
            self.emit_move_end(None, is_drag);
        }
    }

    /// Zooms so that the given bounds are visible
    pub fn zoom_to_extent(&mut self, extent: &MapExtent, suppress_start: bool, suppress_end: bool) {
        if let Err(err) = extent.validate() {
            log::warn!("Ignoring zoom to extent: {}", err);
            return;
        }
        if !suppress_start {
            self.notify_start_move();
        }
        self.engine.fit_extent(extent);
        self.update_domain();
        if !suppress_end {
            self.notify_move_end(None);
        }
    }

    /// Re-reads the map element size; notifies when both sides are non-zero
    pub fn update_size(&mut self) {
        self.engine.update_size();
        self.update_domain();
        let size = self.store.size();
        if !size.is_empty() {
            self.dispatch(MapEvent::MapSizeChanged {
                width: size.width,
                height: size.height,
            });
        }
    }

    /// Attaches a plugin. Names are unique within a module.
    pub fn register_plugin(&mut self, plugin: SharedPlugin) -> Result<()> {
        self.plugins.register(plugin, &self.handle)
    }

    /// Stops (if running) and detaches the plugin
    pub fn unregister_plugin(&mut self, name: &str) -> Result<SharedPlugin> {
        let mut requests = RequestQueue::new();
        let result = {
            let mut ctx = plugin_ctx!(self, &mut requests);
            self.plugins.unregister(name, &mut ctx)
        };
        self.execute_requests(requests);
        result
    }

    pub fn start_plugin(&mut self, name: &str) -> Result<()> {
        let mut requests = RequestQueue::new();
        let result = {
            let mut ctx = plugin_ctx!(self, &mut requests);
            self.plugins.start_plugin(name, &mut ctx)
        };
        self.execute_requests(requests);
        result
    }

    pub fn stop_plugin(&mut self, name: &str) -> Result<()> {
        let mut requests = RequestQueue::new();
        let result = {
            let mut ctx = plugin_ctx!(self, &mut requests);
            self.plugins.stop_plugin(name, &mut ctx)
        };
        self.execute_requests(requests);
        result
    }

    /// Starts every registered plugin in registration order
    pub fn start_plugins(&mut self) -> Result<()> {
        let mut requests = RequestQueue::new();
        let result = {
            let mut ctx = plugin_ctx!(self, &mut requests);
            self.plugins.start_all(&mut ctx)
        };
        self.execute_requests(requests);
        result
    }

    /// Stops every registered plugin in registration order
    pub fn stop_plugins(&mut self) -> Result<()> {
        let mut requests = RequestQueue::new();
        let result = {
            let mut ctx = plugin_ctx!(self, &mut requests);
            self.plugins.stop_all(&mut ctx)
        };
        self.execute_requests(requests);
        result
    }

    pub fn is_plugin_activated(&self, name: &str) -> bool {
        self.plugins.is_plugin_activated(name)
    }

    pub fn plugin_instance(&self, name: &str) -> Option<SharedPlugin> {
        self.plugins.get(name)
    }

    /// Plugin names in registration order
    pub fn plugin_names(&self) -> &[String] {
        self.plugins.names()
    }

    pub fn set_layer_plugin(&mut self, name: &str, plugin: Option<SharedPlugin>) {
        self.plugins.set_layer_plugin(name, plugin);
    }

    pub fn layer_plugin(&self, name: &str) -> Option<SharedPlugin> {
        self.plugins.layer_plugin(name)
    }

    pub fn layer_plugins(&self) -> Vec<SharedPlugin> {
        self.plugins.layer_plugins()
    }

    /// State of every plugin that has one, as `{ "plugins": { name: state } }`
    pub fn get_state(&self) -> serde_json::Value {
        let mut plugins = serde_json::Map::new();
        for plugin in self.plugins.plugins() {
            let plugin = plugin.lock();
            if let Some(state) = plugin.state() {
                plugins.insert(plugin.name().to_string(), state);
            }
        }
        serde_json::json!({ "plugins": plugins })
    }

    /// Link parameters of all plugins, concatenated in registration order
    pub fn get_state_parameters(&self) -> String {
        self.plugins
            .plugins()
            .iter()
            .filter_map(|plugin| plugin.lock().state_parameters())
            .collect()
    }

    /// Hands each plugin accepting state its entry from `state`.
    ///
    /// Accepts the shape produced by [`MapModule::get_state`] as well as a
    /// plain object keyed by plugin name. Every plugin gets its entry even if
    /// an earlier one rejects its state; rejections are returned together.
    pub fn set_state(&mut self, state: &serde_json::Value) -> Result<()> {
        let states = state.get("plugins").unwrap_or(state);
        let Some(states) = states.as_object() else {
            return Err(MapError::Plugin(
                "plugin state must be an object keyed by plugin name".to_string(),
            ));
        };
        let mut failures = Vec::new();
        for plugin in self.plugins.plugins() {
            let mut plugin = plugin.lock();
            let Some(plugin_state) = states.get(plugin.name()) else {
                continue;
            };
            if plugin_state.is_null() || !plugin.accepts_state() {
                continue;
            }
            if let Err(err) = plugin.set_state(plugin_state.clone()) {
                log::warn!("{} rejected its state: {}", plugin.name(), err);
                failures.push(PluginFailure::new(plugin.name(), LifecyclePhase::SetState, err));
            }
        }
        collected(failures)
    }

    /// Stores the style and pushes it to every plugin with a UI
    pub fn change_tool_style(&mut self, style: ToolStyle) {
        self.style = style;
        let tool_style = self.style.effective_tool_style().map(str::to_string);
        let font = self.style.font().map(str::to_string);

        let mut requests = RequestQueue::new();
        for plugin in self.plugins.plugins() {
            let mut plugin = plugin.lock();
            if !plugin.has_ui() {
                continue;
            }
            let mut ctx = plugin_ctx!(self, &mut requests);
            plugin.change_tool_style(tool_style.as_deref(), &mut ctx);
            plugin.change_font(font.as_deref(), &mut ctx);
        }
        self.execute_requests(requests);
    }

    /// Tool style for plugins; `None` when unset or `"default"`
    pub fn tool_style(&self) -> Option<&str> {
        self.style.effective_tool_style()
    }

    pub fn tool_font(&self) -> Option<&str> {
        self.style.font()
    }

    pub fn tool_colour_scheme(&self) -> Option<&serde_json::Value> {
        self.style.colour_scheme.as_ref()
    }

    pub fn add_map_control(&mut self, id: &str, control: ControlRef) {
        self.controls
            .add_map_control(id, control, self.engine.as_mut());
    }

    pub fn remove_map_control(&mut self, id: &str) -> Option<ControlRef> {
        self.controls.remove_map_control(id, self.engine.as_mut())
    }

    pub fn get_map_control(&self, id: &str) -> Option<ControlRef> {
        self.controls.get_map_control(id)
    }

    pub fn controls(&self) -> &ControlRegistry {
        &self.controls
    }

    /// Selects a layer and lets the layer plugins add it to the map.
    ///
    /// Returns false if the layer is already selected.
    pub fn add_map_layer(&mut self, mut layer: MapLayer, keep_layers_order: bool, is_basemap: bool) -> bool {
        if is_basemap {
            layer.is_basemap = true;
        }
        if !self.selection.add_layer(layer.clone()) {
            log::warn!("Layer {} is already on the map", layer.id);
            return false;
        }
        self.dispatch(MapEvent::AfterMapLayerAdd {
            layer,
            keep_layers_order,
            is_basemap,
        });
        true
    }

    /// Removes a layer from the selection and notifies the layer plugins
    pub fn remove_map_layer(&mut self, layer_id: &str) -> Option<MapLayer> {
        let layer = self.selection.remove_layer(layer_id)?;
        self.dispatch(MapEvent::AfterMapLayerRemove {
            layer: layer.clone(),
        });
        Some(layer)
    }

    /// Reorders the selected layers (bottom to top) and the engine layers with them
    pub fn rearrange_map_layers(&mut self, order: &[String]) -> bool {
        if !self.selection.rearrange(order) {
            return false;
        }
        let layer_ids = self.selection.ids();
        self.dispatch(MapEvent::AfterRearrangeSelectedMapLayer { layer_ids });
        true
    }

    /// Selected layers from bottom to top
    pub fn selected_layers(&self) -> &[MapLayer] {
        self.selection.layers()
    }

    pub fn selected_layer(&self, layer_id: &str) -> Option<&MapLayer> {
        self.selection.get_layer(layer_id)
    }

    /// Engine layers of a selected layer, from every layer plugin. `None` if the layer is not selected.
    pub fn engine_layers(&self, layer_id: &str) -> Option<Vec<EngineLayerRef>> {
        let layer = self.selection.get_layer(layer_id)?;
        Some(
            self.plugins
                .layer_plugins()
                .iter()
                .flat_map(|plugin| plugin.lock().engine_layers(layer))
                .collect(),
        )
    }

    /// Asks the layer plugins to refresh a selected layer
    pub fn update_map_layer(
        &mut self,
        layer_id: &str,
        force_redraw: bool,
        params: Option<&serde_json::Value>,
    ) {
        let Some(layer) = self.selection.get_layer(layer_id).cloned() else {
            log::warn!("Cannot update layer {}, it is not on the map", layer_id);
            return;
        };
        let mut requests = RequestQueue::new();
        for plugin in self.plugins.layer_plugins() {
            let mut plugin = plugin.lock();
            if !plugin.is_layer_supported(&layer) {
                continue;
            }
            let mut ctx = plugin_ctx!(self, &mut requests);
            plugin.update_layer(&layer, force_redraw, params, &mut ctx);
        }
        self.execute_requests(requests);
    }

    fn after_map_layer_add(
        &mut self,
        layer: &MapLayer,
        keep_layers_order: bool,
        is_basemap: bool,
        requests: &mut RequestQueue,
    ) {
        let mut deferred = Vec::new();
        for plugin in self.plugins.layer_plugins() {
            let mut plugin = plugin.lock();
            if !plugin.is_layer_supported(layer) {
                continue;
            }
            let mut ctx = plugin_ctx!(self, &mut *requests);
            match plugin.add_map_layer_to_map(layer, keep_layers_order, is_basemap, &mut ctx) {
                Ok(Some(action)) => deferred.push(action),
                Ok(None) => {}
                Err(err) => log::warn!(
                    "{} could not add layer {}: {}",
                    plugin.name(),
                    layer.id,
                    err
                ),
            }
        }

        for action in deferred {
            let mut ctx = plugin_ctx!(self, &mut *requests);
            action(&mut ctx);
        }
    }

    fn after_rearrange_selected_map_layer(&mut self) {
        let mut index = 0;
        for layer in self.selection.ids() {
            for engine_layer in self.engine_layers(&layer).unwrap_or_default() {
                self.engine.set_layer_index(&engine_layer, index);
                index += 1;
            }
        }
        self.engine.reorder_layers();
    }

    /// Subscribes a listener to one kind of event
    pub fn on<F>(&mut self, kind: EventKind, listener: F) -> ListenerId
    where
        F: FnMut(&MapEvent, &mut RequestQueue) + Send + 'static,
    {
        self.router.on(kind, listener)
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        self.router.off(id)
    }

    /// Delivers an event to the module itself, then to plugins, then to listeners.
    ///
    /// Requests queued during delivery are executed afterwards, which may
    /// dispatch further events. Cascades deeper than
    /// [`MAX_DISPATCH_DEPTH`] are cut off.
    pub fn dispatch(&mut self, event: MapEvent) {
        if self.dispatch_depth >= MAX_DISPATCH_DEPTH {
            log::warn!(
                "Dropping {}: event cascade deeper than {}",
                event.name(),
                MAX_DISPATCH_DEPTH
            );
            return;
        }
        self.dispatch_depth += 1;

        let mut requests = RequestQueue::new();
        self.handle_event(&event, &mut requests);
        for plugin in self.plugins.plugins() {
            let mut ctx = plugin_ctx!(self, &mut requests);
            plugin.lock().on_event(&event, &mut ctx);
        }
        self.router.dispatch(&event, &mut requests);
        self.execute_requests(requests);

        self.dispatch_depth -= 1;
    }

    /// Handlers the module itself has for events
    fn handle_event(&mut self, event: &MapEvent, requests: &mut RequestQueue) {
        match event {
            MapEvent::AfterMapLayerAdd {
                layer,
                keep_layers_order,
                is_basemap,
            } => self.after_map_layer_add(layer, *keep_layers_order, *is_basemap, requests),
            MapEvent::AfterRearrangeSelectedMapLayer { .. } => {
                self.after_rearrange_selected_map_layer()
            }
            MapEvent::LayerToolsEditMode { in_mode } => self.layer_tools_edit_mode = *in_mode,
            MapEvent::MapMoveStart { .. }
            | MapEvent::AfterMapMove { .. }
            | MapEvent::MapSizeChanged { .. }
            | MapEvent::UserLocation { .. }
            | MapEvent::AfterMapLayerRemove { .. } => {}
        }
    }

    fn execute_requests(&mut self, mut requests: RequestQueue) {
        while let Some(request) = requests.pop() {
            self.handle_request(request);
        }
    }

    /// Executes a request right away
    pub fn handle_request(&mut self, request: MapRequest) {
        log::debug!("{} handling {}", self.name, request.name());
        match request {
            MapRequest::MapMove { center, zoom } => self.handle_map_move(center, zoom),
            MapRequest::AdjustZoom { adjustment } => self.adjust_zoom_level(adjustment, false),
            MapRequest::SetZoom { zoom } => self.set_zoom_level(zoom, false),
            MapRequest::ZoomToScale {
                scale,
                prefer_closest,
            } => {
                self.zoom_to_scale(scale, prefer_closest, false);
            }
            MapRequest::ZoomToExtent { extent } => self.zoom_to_extent(&extent, false, false),
            MapRequest::PanByPixels { dx, dy } => self.pan_map_by_pixels(dx, dy, false, false, false),
            MapRequest::UpdateSize => self.update_size(),
            MapRequest::MapLayerUpdate {
                layer_id,
                force_redraw,
                params,
            } => self.update_map_layer(&layer_id, force_redraw, params.as_ref()),
            MapRequest::GetUserLocation { center_map } => {
                self.request_user_location(GeolocationOptions::default(), None, center_map);
            }
        }
    }

    fn handle_map_move(&mut self, center: LonLat, zoom: Option<MoveZoom>) {
        match zoom {
            None => {
                self.center_map(center, None, false);
            }
            Some(MoveZoom::Level(level)) => {
                let level = usize::try_from(level)
                    .ok()
                    .filter(|level| *level <= self.max_zoom_level());
                self.center_map(center, level, false);
            }
            Some(MoveZoom::Scale(scale)) => {
                if self.center_map(center, None, true) {
                    self.zoom_to_scale(scale, false, false);
                }
            }
            Some(MoveZoom::Extent(extent)) => self.zoom_to_extent(&extent, false, false),
        }
    }

    /// Queries the user location.
    ///
    /// The answer arrives asynchronously; call [`MapModule::process_pending`]
    /// to deliver it as a `UserLocation` event and through the callback.
    pub fn get_user_location(
        &mut self,
        options: Option<GeolocationOptions>,
        callback: Option<LocationCallback>,
    ) -> QueryId {
        self.request_user_location(options.unwrap_or_default(), callback, false)
    }

    fn request_user_location(
        &mut self,
        options: GeolocationOptions,
        callback: Option<LocationCallback>,
        center_map: bool,
    ) -> QueryId {
        self.geolocation.request(&options, callback, center_map)
    }

    pub fn set_geolocation_provider(&mut self, provider: Box<dyn GeolocationProvider>) {
        self.geolocation.set_provider(provider);
    }

    /// Number of location queries still waiting for an answer
    pub fn pending_location_queries(&self) -> usize {
        self.geolocation.pending_count()
    }

    /// Delivers finished location queries. Returns the number delivered.
    pub fn process_pending(&mut self) -> usize {
        let completed = self.geolocation.try_recv_results();
        let count = completed.len();
        for query in completed {
            let position = match query.result {
                Ok(position) => Some(self.transform_coordinates(
                    position.lonlat(),
                    GEOLOCATION_SRS_NAME,
                    &self.srs_name,
                )),
                Err(err) => {
                    log::warn!("Error getting user location: {}", err);
                    None
                }
            };

            self.dispatch(MapEvent::UserLocation { position });
            if let Some(callback) = query.callback {
                callback(position);
            }
            if let (Some(position), true) = (position, query.center_map) {
                self.center_map(position, None, false);
            }
        }
        count
    }
}

impl std::fmt::Debug for MapModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapModule")
            .field("name", &self.name)
            .field("srs_name", &self.srs_name)
            .field("state", &self.store.snapshot())
            .field("plugins", &self.plugins)
            .field("controls", &self.controls)
            .field("router", &self.router)
            .field("started", &self.started)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::builder::MapModuleBuilder,
        engine::{EngineCall, HeadlessEngine},
    };

    fn module() -> (MapModule, HeadlessEngine) {
        let engine = HeadlessEngine::new(Size::new(100.0, 100.0))
            .with_view(LonLat::new(500_000.0, 500_000.0), 0)
            .with_scale_factor(10.0);
        let module = MapModuleBuilder::new("main")
            .with_resolutions(vec![2000.0, 1000.0, 500.0, 200.0])
            .with_engine(engine.clone())
            .build()
            .unwrap();
        (module, engine)
    }

    #[test]
    fn test_name_and_defaults() {
        let (module, _) = module();
        assert_eq!(module.name(), "mainMapModule");
        assert_eq!(module.projection(), "EPSG:3067");
        assert_eq!(module.image_url(), "/Oskari/bundles");
        assert_eq!(module.scales(), [20_000.0, 10_000.0, 5_000.0, 2_000.0]);
    }

    #[test]
    fn test_state_populated_on_creation() {
        let (module, _) = module();
        let state = module.state();
        assert_eq!(state.center, LonLat::new(500_000.0, 500_000.0));
        assert_eq!(state.zoom, 0);
        assert_eq!(state.resolution, 2000.0);
        assert_eq!(state.scale, 20_000.0);
    }

    #[test]
    fn test_is_valid_lon_lat() {
        let (module, _) = module();
        assert!(module.is_valid_lon_lat(0.0, 0.0));
        assert!(module.is_valid_lon_lat(10_000_000.0, 10_000_000.0));
        assert!(!module.is_valid_lon_lat(f64::NAN, 1.0));
        assert!(!module.is_valid_lon_lat(1.0, f64::NAN));
        assert!(!module.is_valid_lon_lat(-1.0, 1.0));
        assert!(!module.is_valid_lon_lat(1.0, 10_000_001.0));
    }

    #[test]
    fn test_center_map_rejects_invalid_position() {
        let (mut module, engine) = module();
        engine.clear_calls();
        assert!(!module.center_map(LonLat::new(-5.0, 5.0), None, false));
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_center_map_out_of_range_zoom_keeps_current() {
        let (mut module, _) = module();
        module.set_zoom_level(2, true);
        assert!(module.center_map(LonLat::new(1_000.0, 1_000.0), Some(99), true));
        assert_eq!(module.map_zoom(), 2);
        assert_eq!(module.map_center(), LonLat::new(1_000.0, 1_000.0));
    }

    #[test]
    fn test_set_zoom_out_of_range_unchanged() {
        let (mut module, _) = module();
        module.set_zoom_level(1, true);
        module.set_zoom_level(4, true);
        assert_eq!(module.map_zoom(), 1);
        module.set_zoom_level(-1, true);
        assert_eq!(module.map_zoom(), 1);
    }

    #[test]
    fn test_zoom_to_scale_unresolvable_is_noop() {
        let (mut module, engine) = module();
        engine.clear_calls();
        assert!(!module.zoom_to_scale(f64::NAN, false, false));
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_zoom_to_scale_prefer_closest() {
        let (mut module, _) = module();
        // 6000 falls in the bracket of level 1 but is nearest to level 2
        assert!(module.zoom_to_scale(6_000.0, false, true));
        assert_eq!(module.map_zoom(), 1);
        assert!(module.zoom_to_scale(6_000.0, true, true));
        assert_eq!(module.map_zoom(), 2);
    }

    #[test]
    fn test_move_map_to_lon_lat_silent_without_adjust() {
        let (mut module, engine) = module();
        engine.clear_calls();
        module.move_map_to_lon_lat([1_000.0, 2_000.0], None);
        assert_eq!(
            engine.calls(),
            vec![EngineCall::PanTo {
                center: LonLat::new(1_000.0, 2_000.0),
                zoom: 0,
                silent: true
            }]
        );

        module.move_map_to_lon_lat([1_000.0, 2_000.0], Some(2));
        assert_eq!(module.map_zoom(), 2);
    }

    #[test]
    fn test_update_size_notifies_only_non_empty() {
        let (mut module, engine) = module();
        let sizes = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen = sizes.clone();
        module.on(EventKind::MapSizeChanged, move |event, _| {
            if let MapEvent::MapSizeChanged { width, height } = event {
                seen.lock().push((*width, *height));
            }
        });

        engine.resize_element(Size::new(0.0, 300.0));
        module.update_size();
        engine.resize_element(Size::new(640.0, 480.0));
        module.update_size();

        assert_eq!(*sizes.lock(), vec![(640.0, 480.0)]);
        assert_eq!(module.size(), Size::new(640.0, 480.0));
    }

    #[test]
    fn test_layer_tools_edit_mode_event() {
        let (mut module, _) = module();
        module.dispatch(MapEvent::LayerToolsEditMode { in_mode: true });
        assert!(module.is_in_layer_tools_edit_mode());
        module.dispatch(MapEvent::LayerToolsEditMode { in_mode: false });
        assert!(!module.is_in_layer_tools_edit_mode());
    }

    #[test]
    fn test_start_and_stop_are_idempotent() {
        let (mut module, engine) = module();
        engine.clear_calls();
        module.start().unwrap();
        module.start().unwrap();
        assert!(module.is_started());
        module.stop().unwrap();
        module.stop().unwrap();
        assert!(!module.is_started());
        assert_eq!(engine.calls(), vec![EngineCall::Start, EngineCall::Stop]);
    }

    #[test]
    fn test_cascade_depth_is_limited() {
        let (mut module, _) = module();
        let moves = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = moves.clone();
        module.on(EventKind::AfterMapMove, move |_, requests| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            requests.push(MapRequest::PanByPixels { dx: 0.0, dy: 0.0 });
        });

        module.notify_move_end(None);
        assert_eq!(
            moves.load(std::sync::atomic::Ordering::SeqCst),
            MAX_DISPATCH_DEPTH
        );
        assert!(!module.is_moving());
    }

    fn event_names(module: &mut MapModule) -> Arc<parking_lot::Mutex<Vec<&'static str>>> {
        let names = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for kind in [EventKind::MapMoveStart, EventKind::AfterMapMove] {
            let seen = names.clone();
            module.on(kind, move |event, _| seen.lock().push(event.name()));
        }
        names
    }

    #[test]
    fn test_huge_zoom_adjustment_is_ignored() {
        let (mut module, _) = module();
        module.set_zoom_level(2, true);
        module.handle_request(MapRequest::AdjustZoom {
            adjustment: i64::MAX,
        });
        assert_eq!(module.map_zoom(), 2);
        module.adjust_zoom_level(i64::MIN, false);
        assert_eq!(module.map_zoom(), 2);
    }

    #[test]
    fn test_zoom_to_extent_fits_engine() {
        let (mut module, engine) = module();
        engine.clear_calls();
        let extent = MapExtent::new(0.0, 0.0, 40_000.0, 20_000.0);
        module.zoom_to_extent(&extent, false, false);

        assert_eq!(engine.calls(), vec![EngineCall::FitExtent(extent)]);
        assert_eq!(module.map_center(), LonLat::new(20_000.0, 10_000.0));
        assert_eq!(module.map_zoom(), 2);
        assert!(!module.is_moving());
    }

    #[test]
    fn test_zoom_to_extent_notification_flags() {
        let extent = MapExtent::new(0.0, 0.0, 40_000.0, 20_000.0);
        let cases = [
            (false, false, vec!["MapMoveStartEvent", "AfterMapMoveEvent"]),
            (true, false, vec!["AfterMapMoveEvent"]),
            (false, true, vec!["MapMoveStartEvent"]),
            (true, true, vec![]),
        ];
        for (suppress_start, suppress_end, expected) in cases {
            let (mut module, _) = module();
            let names = event_names(&mut module);
            module.zoom_to_extent(&extent, suppress_start, suppress_end);
            assert_eq!(*names.lock(), expected, "start {} end {}", suppress_start, suppress_end);
            // a suppressed end leaves the move open
            assert_eq!(module.is_moving(), !suppress_start && suppress_end);
        }
    }

    #[test]
    fn test_zoom_to_invalid_extent_is_noop() {
        let (mut module, engine) = module();
        let names = event_names(&mut module);
        engine.clear_calls();
        module.zoom_to_extent(&MapExtent::new(10.0, 0.0, 0.0, 10.0), false, false);
        module.zoom_to_extent(&MapExtent::new(0.0, 0.0, f64::INFINITY, 10.0), false, false);

        assert!(engine.calls().is_empty());
        assert!(names.lock().is_empty());
        assert_eq!(module.map_center(), LonLat::new(500_000.0, 500_000.0));
    }

    #[test]
    fn test_center_map_suppress_end() {
        let (mut module, _) = module();
        let names = event_names(&mut module);
        module.center_map(LonLat::new(1_000.0, 1_000.0), Some(1), true);
        assert!(names.lock().is_empty());

        module.center_map(LonLat::new(2_000.0, 2_000.0), Some(2), false);
        assert_eq!(*names.lock(), vec!["AfterMapMoveEvent"]);
        assert_eq!(module.map_zoom(), 2);
    }

    #[test]
    fn test_set_zoom_suppress_event() {
        let (mut module, _) = module();
        let names = event_names(&mut module);
        module.set_zoom_level(1, true);
        assert!(names.lock().is_empty());

        module.set_zoom_level(3, false);
        assert_eq!(*names.lock(), vec!["AfterMapMoveEvent"]);
        assert_eq!(module.map_scale(), 2_000.0);
    }

    struct StatePlugin {
        name: &'static str,
        rejects: bool,
        received: Option<serde_json::Value>,
    }

    impl crate::plugins::Plugin for StatePlugin {
        fn name(&self) -> &str {
            self.name
        }

        fn accepts_state(&self) -> bool {
            true
        }

        fn set_state(&mut self, state: serde_json::Value) -> Result<()> {
            if self.rejects {
                return Err(MapError::Plugin("unreadable state".to_string()));
            }
            self.received = Some(state);
            Ok(())
        }
    }

    #[test]
    fn test_set_state_reaches_plugins_after_failure() {
        let (mut module, _) = module();
        let failing = Arc::new(parking_lot::Mutex::new(StatePlugin {
            name: "Broken",
            rejects: true,
            received: None,
        }));
        let working = Arc::new(parking_lot::Mutex::new(StatePlugin {
            name: "Search",
            rejects: false,
            received: None,
        }));
        module.register_plugin(failing).unwrap();
        module.register_plugin(working.clone()).unwrap();

        let result = module.set_state(&serde_json::json!({
            "Broken": { "a": 1 },
            "Search": { "query": "turku" }
        }));

        match result {
            Err(MapError::PluginLifecycle(failures)) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].plugin, "Broken");
                assert_eq!(failures[0].phase, LifecyclePhase::SetState);
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert_eq!(
            working.lock().received,
            Some(serde_json::json!({ "query": "turku" }))
        );
    }
}
