use crate::core::{extent::MapExtent, geo::LonLat};
use std::collections::VecDeque;

/// Zoom part of a move request
#[derive(Debug, Clone, PartialEq)]
pub enum MoveZoom {
    Level(i64),
    Scale(f64),
    Extent(MapExtent),
}

/// Requests that listeners and plugins may send to the map module
#[derive(Debug, Clone, PartialEq)]
pub enum MapRequest {
    /// Center the map, optionally changing the zoom
    MapMove {
        center: LonLat,
        zoom: Option<MoveZoom>,
    },
    AdjustZoom {
        adjustment: i64,
    },
    SetZoom {
        zoom: i64,
    },
    ZoomToScale {
        scale: f64,
        prefer_closest: bool,
    },
    ZoomToExtent {
        extent: MapExtent,
    },
    PanByPixels {
        dx: f64,
        dy: f64,
    },
    UpdateSize,
    /// Ask the layer plugins to refresh a selected layer
    MapLayerUpdate {
        layer_id: String,
        force_redraw: bool,
        params: Option<serde_json::Value>,
    },
    GetUserLocation {
        center_map: bool,
    },
}

impl MapRequest {
    /// Wire name of the request
    pub fn name(&self) -> &'static str {
        match self {
            MapRequest::MapMove { .. } => "MapMoveRequest",
            MapRequest::AdjustZoom { .. } => "AdjustZoomRequest",
            MapRequest::SetZoom { .. } => "SetZoomRequest",
            MapRequest::ZoomToScale { .. } => "ZoomToScaleRequest",
            MapRequest::ZoomToExtent { .. } => "ZoomToExtentRequest",
            MapRequest::PanByPixels { .. } => "PanByPixelsRequest",
            MapRequest::UpdateSize => "UpdateSizeRequest",
            MapRequest::MapLayerUpdate { .. } => "MapModulePlugin.MapLayerUpdateRequest",
            MapRequest::GetUserLocation { .. } => "MyLocationPlugin.GetUserLocationRequest",
        }
    }
}

/// Requests collected while an event is being delivered
#[derive(Debug, Default)]
pub struct RequestQueue {
    queue: VecDeque<MapRequest>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, request: MapRequest) {
        self.queue.push_back(request);
    }

    pub fn pop(&mut self) -> Option<MapRequest> {
        self.queue.pop_front()
    }

    /// Takes all queued requests in the order they were sent
    pub fn drain(&mut self) -> Vec<MapRequest> {
        self.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
