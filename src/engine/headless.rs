//! In-memory engine adapter
//!
//! Keeps center/zoom/size in plain fields and derives the visible extent from
//! the resolution ladder. Every call is recorded so callers can inspect the
//! exact sequence of engine operations a module issued. Clones share state, so
//! a clone kept outside the module observes (and can resize) the same map.

use crate::{
    core::{
        config::Units,
        extent::MapExtent,
        geo::{LonLat, Size},
    },
    engine::{default_scale_for_resolution, EngineConfig, EngineLayerRef, MapControl, MapEngine},
    MapError, Result,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// A recorded engine operation
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    CreateMap,
    PanTo {
        center: LonLat,
        zoom: usize,
        silent: bool,
    },
    PanByPixels {
        dx: f64,
        dy: f64,
    },
    FitExtent(MapExtent),
    SetZoom(usize),
    UpdateSize,
    AddControl(String),
    RemoveControl(String),
    AddLayer {
        id: String,
        on_top: bool,
    },
    RemoveLayer(String),
    SetLayerIndex {
        id: String,
        index: usize,
    },
    ReorderLayers,
    Start,
    Stop,
}

struct HeadlessState {
    resolutions: Vec<f64>,
    center: LonLat,
    zoom: usize,
    size: Size,
    element_size: Size,
    initial_view: Option<(LonLat, usize)>,
    scale_factor: Option<f64>,
    layers: Vec<(EngineLayerRef, usize)>,
    controls: Vec<String>,
    calls: Vec<EngineCall>,
}

impl HeadlessState {
    fn resolution(&self) -> f64 {
        self.resolutions.get(self.zoom).copied().unwrap_or(1.0)
    }

    fn max_zoom(&self) -> usize {
        self.resolutions.len().saturating_sub(1)
    }
}

#[derive(Clone)]
pub struct HeadlessEngine {
    shared: Arc<Mutex<HeadlessState>>,
}

impl HeadlessEngine {
    /// Creates an engine whose map element has the given pixel size
    pub fn new(size: Size) -> Self {
        Self {
            shared: Arc::new(Mutex::new(HeadlessState {
                resolutions: Vec::new(),
                center: LonLat::default(),
                zoom: 0,
                size,
                element_size: size,
                initial_view: None,
                scale_factor: None,
                layers: Vec::new(),
                controls: Vec::new(),
                calls: Vec::new(),
            })),
        }
    }

    /// Initial view applied when the map is created; defaults to the max extent center at zoom 0
    pub fn with_view(self, center: LonLat, zoom: usize) -> Self {
        self.shared.lock().initial_view = Some((center, zoom));
        self
    }

    /// Derives scales as `resolution * factor` instead of the dpi based default
    pub fn with_scale_factor(self, factor: f64) -> Self {
        self.shared.lock().scale_factor = Some(factor);
        self
    }

    /// Changes the size of the map element; picked up by the next `update_size`
    pub fn resize_element(&self, size: Size) {
        self.shared.lock().element_size = size;
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.shared.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.shared.lock().calls.clear();
    }

    /// Layer ids from bottom to top
    pub fn layer_ids(&self) -> Vec<String> {
        self.shared
            .lock()
            .layers
            .iter()
            .map(|(layer, _)| layer.id().to_string())
            .collect()
    }

    pub fn control_ids(&self) -> Vec<String> {
        self.shared.lock().controls.clone()
    }

    fn record(state: &mut HeadlessState, call: EngineCall) {
        log::trace!("headless engine: {:?}", call);
        state.calls.push(call);
    }
}

impl MapEngine for HeadlessEngine {
    fn create_map(&mut self, config: &EngineConfig) -> Result<()> {
        let mut state = self.shared.lock();
        if config.options.resolutions.is_empty() {
            return Err(MapError::Engine(
                "cannot create a map without resolutions".to_string(),
            ));
        }
        state.resolutions = config.options.resolutions.clone();
        let (center, zoom) = state
            .initial_view
            .unwrap_or((config.options.max_extent.center(), 0));
        state.center = center;
        state.zoom = zoom.min(state.max_zoom());
        Self::record(&mut state, EngineCall::CreateMap);
        Ok(())
    }

    fn center(&self) -> LonLat {
        self.shared.lock().center
    }

    fn zoom(&self) -> usize {
        self.shared.lock().zoom
    }

    fn size(&self) -> Size {
        self.shared.lock().size
    }

    fn current_extent(&self) -> MapExtent {
        let state = self.shared.lock();
        let resolution = state.resolution();
        MapExtent::from_center(
            state.center,
            state.size.width * resolution,
            state.size.height * resolution,
        )
    }

    fn pan_to(&mut self, center: LonLat, zoom: usize, silent: bool) {
        let mut state = self.shared.lock();
        state.center = center;
        state.zoom = zoom.min(state.max_zoom());
        Self::record(&mut state, EngineCall::PanTo { center, zoom, silent });
    }

    fn pan_by_pixels(&mut self, dx: f64, dy: f64) {
        let mut state = self.shared.lock();
        let resolution = state.resolution();
        // screen y grows downwards
        state.center = state.center.offset(dx * resolution, -dy * resolution);
        Self::record(&mut state, EngineCall::PanByPixels { dx, dy });
    }

    fn fit_extent(&mut self, extent: &MapExtent) {
        let mut state = self.shared.lock();
        state.center = extent.center();
        if !state.size.is_empty() {
            let needed = (extent.width() / state.size.width).max(extent.height() / state.size.height);
            state.zoom = state
                .resolutions
                .iter()
                .rposition(|r| *r >= needed)
                .unwrap_or(0);
        }
        Self::record(&mut state, EngineCall::FitExtent(*extent));
    }

    fn set_zoom(&mut self, zoom: usize) {
        let mut state = self.shared.lock();
        state.zoom = zoom.min(state.max_zoom());
        Self::record(&mut state, EngineCall::SetZoom(zoom));
    }

    fn update_size(&mut self) {
        let mut state = self.shared.lock();
        state.size = state.element_size;
        Self::record(&mut state, EngineCall::UpdateSize);
    }

    fn add_control(&mut self, id: &str, _control: &dyn MapControl) {
        let mut state = self.shared.lock();
        state.controls.push(id.to_string());
        Self::record(&mut state, EngineCall::AddControl(id.to_string()));
    }

    fn remove_control(&mut self, id: &str, _control: &dyn MapControl) {
        let mut state = self.shared.lock();
        state.controls.retain(|c| c != id);
        Self::record(&mut state, EngineCall::RemoveControl(id.to_string()));
    }

    fn add_layer(&mut self, layer: EngineLayerRef, on_top: bool) {
        let mut state = self.shared.lock();
        let id = layer.id().to_string();
        if on_top {
            let index = state.layers.len();
            state.layers.push((layer, index));
        } else {
            state.layers.insert(0, (layer, 0));
        }
        Self::record(&mut state, EngineCall::AddLayer { id, on_top });
    }

    fn remove_layer(&mut self, layer: &EngineLayerRef) {
        let mut state = self.shared.lock();
        state.layers.retain(|(l, _)| !Arc::ptr_eq(l, layer));
        Self::record(&mut state, EngineCall::RemoveLayer(layer.id().to_string()));
    }

    fn set_layer_index(&mut self, layer: &EngineLayerRef, index: usize) {
        let mut state = self.shared.lock();
        if let Some(entry) = state.layers.iter_mut().find(|(l, _)| Arc::ptr_eq(l, layer)) {
            entry.1 = index;
        }
        Self::record(
            &mut state,
            EngineCall::SetLayerIndex {
                id: layer.id().to_string(),
                index,
            },
        );
    }

    fn reorder_layers(&mut self) {
        let mut state = self.shared.lock();
        state.layers.sort_by_key(|(_, index)| *index);
        Self::record(&mut state, EngineCall::ReorderLayers);
    }

    fn scale_for_resolution(&self, resolution: f64, units: Units) -> f64 {
        match self.shared.lock().scale_factor {
            Some(factor) => resolution * factor,
            None => default_scale_for_resolution(resolution, units),
        }
    }

    fn start(&mut self) -> bool {
        Self::record(&mut self.shared.lock(), EngineCall::Start);
        true
    }

    fn stop(&mut self) -> bool {
        Self::record(&mut self.shared.lock(), EngineCall::Stop);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ResolvedOptions;
    use std::any::Any;

    struct TestLayer(&'static str);

    impl crate::engine::EngineLayer for TestLayer {
        fn id(&self) -> &str {
            self.0
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn created_engine() -> HeadlessEngine {
        let mut engine = HeadlessEngine::new(Size::new(100.0, 100.0))
            .with_view(LonLat::new(500_000.0, 500_000.0), 1);
        let config = EngineConfig {
            map_element_id: None,
            options: ResolvedOptions {
                resolutions: vec![2000.0, 1000.0, 500.0, 200.0],
                ..ResolvedOptions::default()
            },
        };
        engine.create_map(&config).unwrap();
        engine
    }

    #[test]
    fn test_create_map_applies_initial_view() {
        let engine = created_engine();
        assert_eq!(engine.center(), LonLat::new(500_000.0, 500_000.0));
        assert_eq!(engine.zoom(), 1);
        assert_eq!(engine.calls(), vec![EngineCall::CreateMap]);
    }

    #[test]
    fn test_extent_follows_resolution() {
        let engine = created_engine();
        let extent = engine.current_extent();
        assert_eq!(extent.width(), 100_000.0);
        assert_eq!(extent.center(), LonLat::new(500_000.0, 500_000.0));
    }

    #[test]
    fn test_pan_by_pixels_moves_center() {
        let mut engine = created_engine();
        engine.pan_by_pixels(10.0, 5.0);
        assert_eq!(engine.center(), LonLat::new(510_000.0, 495_000.0));
    }

    #[test]
    fn test_fit_extent_picks_finest_fitting_zoom() {
        let mut engine = created_engine();
        engine.fit_extent(&MapExtent::new(0.0, 0.0, 40_000.0, 20_000.0));
        // 40000 map units over 100 pixels needs at least 400 per pixel
        assert_eq!(engine.zoom(), 2);
        assert_eq!(engine.center(), LonLat::new(20_000.0, 10_000.0));
    }

    #[test]
    fn test_layer_reordering() {
        let mut engine = created_engine();
        let a: EngineLayerRef = Arc::new(TestLayer("a"));
        let b: EngineLayerRef = Arc::new(TestLayer("b"));
        engine.add_layer(a.clone(), true);
        engine.add_layer(b.clone(), true);
        assert_eq!(engine.layer_ids(), vec!["a", "b"]);

        engine.set_layer_index(&b, 0);
        engine.set_layer_index(&a, 1);
        engine.reorder_layers();
        assert_eq!(engine.layer_ids(), vec!["b", "a"]);

        engine.remove_layer(&a);
        assert_eq!(engine.layer_ids(), vec!["b"]);
    }

    #[test]
    fn test_update_size_reads_element() {
        let mut engine = created_engine();
        engine.resize_element(Size::new(640.0, 480.0));
        assert_eq!(engine.size(), Size::new(100.0, 100.0));
        engine.update_size();
        assert_eq!(engine.size(), Size::new(640.0, 480.0));
    }
}
