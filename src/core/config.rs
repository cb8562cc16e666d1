//! Configuration accepted by the map module at construction
//!
//! Every field is optional. Missing values fall back to the built-in ladder,
//! reference projection and max extent from [`crate::core::constants`].
//! Validation happens once in [`MapModuleOptions::resolve`]; a module is never
//! built from an invalid ladder.

use crate::{
    core::{
        constants::{DEFAULT_RESOLUTIONS, DEFAULT_SRS_NAME},
        extent::MapExtent,
    },
    ui::style::ToolStyle,
    MapError, Result,
};
use serde::{Deserialize, Serialize};

/// Map units of the projection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Units {
    #[default]
    #[serde(rename = "m")]
    Meters,
    #[serde(rename = "km")]
    Kilometers,
    #[serde(rename = "ft")]
    Feet,
    #[serde(rename = "degrees", alias = "dd")]
    Degrees,
}

impl Units {
    /// Inches per map unit, as used by the OpenLayers scale calculation
    pub fn inches_per_unit(&self) -> f64 {
        match self {
            Units::Meters => 39.37,
            Units::Kilometers => 39_370.0,
            Units::Feet => 12.0,
            Units::Degrees => 4_374_754.0,
        }
    }
}

impl std::fmt::Display for Units {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Units::Meters => write!(f, "m"),
            Units::Kilometers => write!(f, "km"),
            Units::Feet => write!(f, "ft"),
            Units::Degrees => write!(f, "degrees"),
        }
    }
}

/// Raw map options, typically deserialized from bundle configuration JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapModuleOptions {
    pub resolutions: Option<Vec<f64>>,
    pub max_extent: Option<MapExtent>,
    pub srs_name: Option<String>,
    pub units: Option<Units>,
    pub style: Option<ToolStyle>,
}

impl MapModuleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses options from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_resolutions(mut self, resolutions: Vec<f64>) -> Self {
        self.resolutions = Some(resolutions);
        self
    }

    pub fn with_max_extent(mut self, extent: MapExtent) -> Self {
        self.max_extent = Some(extent);
        self
    }

    pub fn with_srs_name(mut self, srs_name: impl Into<String>) -> Self {
        self.srs_name = Some(srs_name.into());
        self
    }

    pub fn with_units(mut self, units: Units) -> Self {
        self.units = Some(units);
        self
    }

    pub fn with_style(mut self, style: ToolStyle) -> Self {
        self.style = Some(style);
        self
    }

    /// Applies defaults and validates the result
    pub fn resolve(self) -> Result<ResolvedOptions> {
        let resolutions = self
            .resolutions
            .unwrap_or_else(|| DEFAULT_RESOLUTIONS.to_vec());
        validate_resolutions(&resolutions)?;

        let max_extent = self.max_extent.unwrap_or_default();
        max_extent.validate()?;

        let srs_name = match self.srs_name {
            Some(name) if !name.trim().is_empty() => name,
            Some(_) => {
                return Err(MapError::Configuration(
                    "srsName must not be empty".to_string(),
                ))
            }
            None => DEFAULT_SRS_NAME.to_string(),
        };

        Ok(ResolvedOptions {
            resolutions,
            max_extent,
            srs_name,
            units: self.units.unwrap_or_default(),
            style: self.style.unwrap_or_default(),
        })
    }
}

/// Validated options with all defaults applied
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedOptions {
    pub resolutions: Vec<f64>,
    pub max_extent: MapExtent,
    pub srs_name: String,
    pub units: Units,
    pub style: ToolStyle,
}

impl Default for ResolvedOptions {
    fn default() -> Self {
        Self {
            resolutions: DEFAULT_RESOLUTIONS.to_vec(),
            max_extent: MapExtent::default(),
            srs_name: DEFAULT_SRS_NAME.to_string(),
            units: Units::default(),
            style: ToolStyle::default(),
        }
    }
}

/// Checks that a ladder is non-empty, positive, finite and strictly decreasing
pub fn validate_resolutions(resolutions: &[f64]) -> Result<()> {
    if resolutions.is_empty() {
        return Err(MapError::InvalidResolutions(
            "resolution ladder is empty".to_string(),
        ));
    }
    if let Some(bad) = resolutions.iter().find(|r| !r.is_finite() || **r <= 0.0) {
        return Err(MapError::InvalidResolutions(format!(
            "resolution {} is not a positive number",
            bad
        )));
    }
    if let Some(pair) = resolutions.windows(2).find(|pair| pair[1] >= pair[0]) {
        return Err(MapError::InvalidResolutions(format!(
            "resolutions must be strictly decreasing, found {} followed by {}",
            pair[0], pair[1]
        )));
    }
    Ok(())
}
