use crate::core::{
    extent::MapExtent,
    geo::{LonLat, Size},
    scales::ScaleResolutionModel,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The current view of the map: center, zoom and everything derived from them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapState {
    pub center: LonLat,
    /// Index into the resolution ladder
    pub zoom: usize,
    pub scale: f64,
    pub resolution: f64,
    /// Viewport size in pixels
    pub size: Size,
    pub extent: MapExtent,
    pub max_extent: MapExtent,
    pub srs_name: String,
    pub moving: bool,
}

impl MapState {
    fn initial(max_extent: MapExtent, srs_name: String) -> Self {
        Self {
            center: max_extent.center(),
            zoom: 0,
            scale: 0.0,
            resolution: 0.0,
            size: Size::default(),
            extent: max_extent,
            max_extent,
            srs_name,
            moving: false,
        }
    }
}

/// Single-writer store for [`MapState`].
///
/// Only the map module owns a store; everybody else reads through a
/// [`ModuleHandle`]. Writes take the lock once, so readers never see a
/// half-applied update.
#[derive(Debug)]
pub struct MapStateStore {
    shared: Arc<RwLock<MapState>>,
}

impl MapStateStore {
    pub(crate) fn new(max_extent: MapExtent, srs_name: String) -> Self {
        Self {
            shared: Arc::new(RwLock::new(MapState::initial(max_extent, srs_name))),
        }
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> MapState {
        self.shared.read().clone()
    }

    pub fn center(&self) -> LonLat {
        self.shared.read().center
    }

    pub fn zoom(&self) -> usize {
        self.shared.read().zoom
    }

    pub fn scale(&self) -> f64 {
        self.shared.read().scale
    }

    pub fn resolution(&self) -> f64 {
        self.shared.read().resolution
    }

    pub fn size(&self) -> Size {
        self.shared.read().size
    }

    pub fn extent(&self) -> MapExtent {
        self.shared.read().extent
    }

    pub fn is_moving(&self) -> bool {
        self.shared.read().moving
    }

    pub(crate) fn set_moving(&self, moving: bool) {
        self.shared.write().moving = moving;
    }

    /// Writes the values read back from the engine, deriving scale and resolution from the ladder
    pub(crate) fn update_from_engine(
        &self,
        center: LonLat,
        zoom: usize,
        size: Size,
        extent: MapExtent,
        ladder: &ScaleResolutionModel,
    ) {
        let zoom = zoom.min(ladder.max_zoom_level());
        let scale = ladder.scale_at(zoom).unwrap_or_default();
        let resolution = ladder.resolution_at(zoom).unwrap_or_default();

        let mut state = self.shared.write();
        state.center = center;
        state.zoom = zoom;
        state.scale = scale;
        state.resolution = resolution;
        state.size = size;
        state.extent = extent;
    }

    fn reader(&self) -> Arc<RwLock<MapState>> {
        Arc::clone(&self.shared)
    }
}

/// Read-only reference to a map module, handed to plugins and listeners
#[derive(Debug, Clone)]
pub struct ModuleHandle {
    name: Arc<str>,
    state: Arc<RwLock<MapState>>,
    ladder: Arc<ScaleResolutionModel>,
}

impl ModuleHandle {
    pub(crate) fn new(name: &str, store: &MapStateStore, ladder: Arc<ScaleResolutionModel>) -> Self {
        Self {
            name: Arc::from(name),
            state: store.reader(),
            ladder,
        }
    }

    /// Name of the module this handle points to
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> MapState {
        self.state.read().clone()
    }

    pub fn zoom(&self) -> usize {
        self.state.read().zoom
    }

    pub fn scale(&self) -> f64 {
        self.state.read().scale
    }

    pub fn center(&self) -> LonLat {
        self.state.read().center
    }

    pub fn ladder(&self) -> &ScaleResolutionModel {
        &self.ladder
    }

    /// True if both handles point to the same module instance
    pub fn same_module(&self, other: &ModuleHandle) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}
