//! Prelude module for common mapmodule types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use mapmodule::prelude::*;`

pub use crate::core::{
    builder::MapModuleBuilder,
    config::{MapModuleOptions, ResolvedOptions, Units},
    extent::MapExtent,
    geo::{LonLat, Size},
    map::MapModule,
    scales::ScaleResolutionModel,
    state::{MapState, ModuleHandle},
};

pub use crate::engine::{
    EngineCall, EngineConfig, EngineLayer, EngineLayerRef, HeadlessEngine, MapControl, MapEngine,
};

pub use crate::events::{
    EventKind, EventRouter, ListenerId, MapEvent, MapRequest, MoveZoom, RequestQueue,
};

pub use crate::layers::{LayerSelection, MapLayer};

pub use crate::plugins::{
    shared, BasePlugin, DeferredAction, LifecyclePhase, Plugin, PluginContext, PluginFailure,
    PluginRegistry, SharedPlugin,
};

pub use crate::ui::{ControlRef, ControlRegistry, ToolStyle};

pub use crate::background::geolocation::{
    FixedPositionProvider, GeoPosition, GeolocationError, GeolocationOptions, GeolocationProvider,
    LocationCallback, PositionReply, PositionResult,
};

pub use crate::{Error as MapError, Result};

pub use std::sync::Arc;

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};
