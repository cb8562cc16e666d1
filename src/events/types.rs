use crate::{core::geo::LonLat, layers::MapLayer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminant of [`MapEvent`], used as the subscription key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    MapMoveStart,
    AfterMapMove,
    MapSizeChanged,
    UserLocation,
    AfterMapLayerAdd,
    AfterMapLayerRemove,
    AfterRearrangeSelectedMapLayer,
    LayerToolsEditMode,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::MapMoveStart,
        EventKind::AfterMapMove,
        EventKind::MapSizeChanged,
        EventKind::UserLocation,
        EventKind::AfterMapLayerAdd,
        EventKind::AfterMapLayerRemove,
        EventKind::AfterRearrangeSelectedMapLayer,
        EventKind::LayerToolsEditMode,
    ];

    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::MapMoveStart => "MapMoveStartEvent",
            EventKind::AfterMapMove => "AfterMapMoveEvent",
            EventKind::MapSizeChanged => "MapSizeChangedEvent",
            EventKind::UserLocation => "UserLocationEvent",
            EventKind::AfterMapLayerAdd => "AfterMapLayerAddEvent",
            EventKind::AfterMapLayerRemove => "AfterMapLayerRemoveEvent",
            EventKind::AfterRearrangeSelectedMapLayer => "AfterRearrangeSelectedMapLayerEvent",
            EventKind::LayerToolsEditMode => "LayerToolsEditModeEvent",
        }
    }

    /// Looks up a kind by its wire name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Notifications emitted by the map module
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    /// The map is about to move; carries the center before the move
    MapMoveStart { center: LonLat },
    /// The map has moved and the state store already reflects the new view
    AfterMapMove {
        center: LonLat,
        zoom: usize,
        scale: f64,
        /// Identifier of the component that caused the move
        creator: Option<String>,
        /// Set for user driven drags
        immediate: bool,
    },
    MapSizeChanged { width: f64, height: f64 },
    /// Result of a user location query, `None` on failure
    UserLocation { position: Option<LonLat> },
    AfterMapLayerAdd {
        layer: MapLayer,
        keep_layers_order: bool,
        is_basemap: bool,
    },
    AfterMapLayerRemove { layer: MapLayer },
    /// Selected layers were reordered; ids from bottom to top
    AfterRearrangeSelectedMapLayer { layer_ids: Vec<String> },
    LayerToolsEditMode { in_mode: bool },
}

impl MapEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            MapEvent::MapMoveStart { .. } => EventKind::MapMoveStart,
            MapEvent::AfterMapMove { .. } => EventKind::AfterMapMove,
            MapEvent::MapSizeChanged { .. } => EventKind::MapSizeChanged,
            MapEvent::UserLocation { .. } => EventKind::UserLocation,
            MapEvent::AfterMapLayerAdd { .. } => EventKind::AfterMapLayerAdd,
            MapEvent::AfterMapLayerRemove { .. } => EventKind::AfterMapLayerRemove,
            MapEvent::AfterRearrangeSelectedMapLayer { .. } => {
                EventKind::AfterRearrangeSelectedMapLayer
            }
            MapEvent::LayerToolsEditMode { .. } => EventKind::LayerToolsEditMode,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Checks if this is one of the map movement notifications
    pub fn is_move_event(&self) -> bool {
        matches!(
            self,
            MapEvent::MapMoveStart { .. } | MapEvent::AfterMapMove { .. }
        )
    }

    /// The layer carried by layer events
    pub fn layer(&self) -> Option<&MapLayer> {
        match self {
            MapEvent::AfterMapLayerAdd { layer, .. } | MapEvent::AfterMapLayerRemove { layer } => {
                Some(layer)
            }
            _ => None,
        }
    }
}
