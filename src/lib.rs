//! # mapmodule
//!
//! Engine-independent map module core: a resolution/scale ladder, a
//! single-writer map state store, an ordered plugin runtime and a typed event
//! router, composed behind the [`MapModule`] facade.
//!
//! Rendering is delegated to a [`engine::MapEngine`] adapter supplied by the
//! caller. [`engine::HeadlessEngine`] keeps everything in memory and is what
//! the demos and tests run against.

pub mod background;
pub mod core;
pub mod engine;
pub mod events;
pub mod layers;
pub mod plugins;
pub mod prelude;
pub mod ui;
pub use crate::core::constants;

// Re-export public API
pub use crate::core::{
    builder::MapModuleBuilder,
    config::{MapModuleOptions, ResolvedOptions, Units},
    extent::MapExtent,
    geo::{LonLat, Size},
    map::MapModule,
    scales::ScaleResolutionModel,
    state::{MapState, ModuleHandle},
};

pub use engine::{EngineLayer, EngineLayerRef, HeadlessEngine, MapControl, MapEngine};

pub use events::{EventKind, MapEvent, MapRequest, RequestQueue};

pub use layers::{LayerSelection, MapLayer};

pub use plugins::{Plugin, PluginContext, PluginFailure, SharedPlugin};

pub use background::geolocation::{GeolocationError, GeolocationOptions, GeolocationProvider};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

fn join_failures(failures: &[PluginFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid resolutions: {0}")]
    InvalidResolutions(String),

    #[error("Invalid extent: {0}")]
    InvalidExtent(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Plugin error: {0}")]
    Plugin(String),

    #[error("Plugin {0} is already registered")]
    DuplicatePlugin(String),

    #[error("Plugin {0} not found")]
    PluginNotFound(String),

    #[error("Plugin lifecycle failed: {}", join_failures(.0))]
    PluginLifecycle(Vec<PluginFailure>),
}

/// Error type alias for convenience
pub type Error = MapError;
