//! Map layers as seen by the map module
//!
//! The module does not render layers. It only tracks which layers are
//! selected, in which order, and hands them to the layer plugins that know how
//! to turn them into engine layers.

pub mod selection;

pub use selection::LayerSelection;

use serde::{Deserialize, Serialize};

/// Layer description shared between the module and the layer plugins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapLayer {
    pub id: String,
    /// Layer type handled by a layer plugin, e.g. `"wmslayer"`
    pub layer_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_scale: Option<f64>,
    pub visible: bool,
    pub opacity: f64,
    #[serde(default)]
    pub is_basemap: bool,
    #[serde(default)]
    pub options: serde_json::Value,
}

impl MapLayer {
    pub fn new(id: impl Into<String>, layer_type: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            layer_type: layer_type.into(),
            min_scale: None,
            max_scale: None,
            visible: true,
            opacity: 1.0,
            is_basemap: false,
            options: serde_json::Value::Null,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Scale bounds: `max_scale` is the most zoomed-in scale, `min_scale` the most zoomed-out
    pub fn with_scale_bounds(mut self, max_scale: Option<f64>, min_scale: Option<f64>) -> Self {
        self.max_scale = max_scale;
        self.min_scale = min_scale;
        self
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn with_visibility(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn as_basemap(mut self) -> Self {
        self.is_basemap = true;
        self
    }

    pub fn with_options(mut self, options: serde_json::Value) -> Self {
        self.options = options;
        self
    }

    pub fn is_type(&self, layer_type: &str) -> bool {
        self.layer_type == layer_type
    }
}
