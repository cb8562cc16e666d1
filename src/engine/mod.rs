//! Capability interface of the rendering engine
//!
//! The map module never renders anything itself. Every literal map action is
//! delegated to a [`MapEngine`] adapter (OpenLayers, a native renderer, or the
//! [`HeadlessEngine`] used for tests and server-side processing).

pub mod headless;

pub use headless::{EngineCall, HeadlessEngine};

use crate::{
    core::{
        config::{ResolvedOptions, Units},
        constants::DOTS_PER_INCH,
        extent::MapExtent,
        geo::{LonLat, Size},
    },
    Result,
};
use std::any::Any;
use std::sync::Arc;

/// Engine-specific control object (zoom bar, scale line, mouse navigation...)
pub trait MapControl: Send + Sync {
    /// Dynamic casting support
    fn as_any(&self) -> &dyn Any;
}

/// Engine-specific renderable produced by layer plugins
pub trait EngineLayer: Send + Sync {
    fn id(&self) -> &str;

    /// Dynamic casting support
    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to an engine layer
pub type EngineLayerRef = Arc<dyn EngineLayer>;

/// Everything an engine needs to create its map
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub map_element_id: Option<String>,
    pub options: ResolvedOptions,
}

/// Default scale derivation: `resolution * inches per unit * dpi`
pub fn default_scale_for_resolution(resolution: f64, units: Units) -> f64 {
    resolution * units.inches_per_unit() * DOTS_PER_INCH
}

pub trait MapEngine: Send {
    /// Creates the engine-side map. Called once, during module construction.
    fn create_map(&mut self, config: &EngineConfig) -> Result<()>;

    fn center(&self) -> LonLat;
    fn zoom(&self) -> usize;
    fn size(&self) -> Size;
    fn current_extent(&self) -> MapExtent;

    /// Moves to an absolute position and zoom level
    fn pan_to(&mut self, center: LonLat, zoom: usize, silent: bool);
    fn pan_by_pixels(&mut self, dx: f64, dy: f64);
    /// Zooms so that the given bounds are visible in the viewport
    fn fit_extent(&mut self, extent: &MapExtent);
    fn set_zoom(&mut self, zoom: usize);
    /// Re-reads the size of the map element
    fn update_size(&mut self);

    fn add_control(&mut self, id: &str, control: &dyn MapControl);
    fn remove_control(&mut self, id: &str, control: &dyn MapControl);

    fn add_layer(&mut self, layer: EngineLayerRef, on_top: bool);
    fn remove_layer(&mut self, layer: &EngineLayerRef);
    fn set_layer_index(&mut self, layer: &EngineLayerRef, index: usize);
    /// Applies the indices assigned with `set_layer_index`
    fn reorder_layers(&mut self);

    fn scale_for_resolution(&self, resolution: f64, units: Units) -> f64 {
        default_scale_for_resolution(resolution, units)
    }

    /// Projection transform; engines without projection support return the input
    fn transform_coordinates(&self, lonlat: LonLat, _from_srs: &str, _to_srs: &str) -> LonLat {
        lonlat
    }

    /// Returns whether the engine is running afterwards
    fn start(&mut self) -> bool {
        true
    }

    /// Returns whether the engine is still running afterwards
    fn stop(&mut self) -> bool {
        false
    }
}
