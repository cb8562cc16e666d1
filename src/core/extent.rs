use crate::{core::geo::LonLat, MapError, Result};
use serde::{Deserialize, Serialize};

/// Represents a bounding box in map projection coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapExtent {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

impl MapExtent {
    /// Creates an extent without validating it
    pub fn new(left: f64, bottom: f64, right: f64, top: f64) -> Self {
        Self {
            left,
            bottom,
            right,
            top,
        }
    }

    /// Creates an extent, rejecting degenerate or non-finite bounds
    pub fn try_new(left: f64, bottom: f64, right: f64, top: f64) -> Result<Self> {
        let extent = Self::new(left, bottom, right, top);
        extent.validate()?;
        Ok(extent)
    }

    /// Creates an extent from a center point and size in map units
    pub fn from_center(center: LonLat, width: f64, height: f64) -> Self {
        let half_width = width / 2.0;
        let half_height = height / 2.0;
        Self::new(
            center.lon - half_width,
            center.lat - half_height,
            center.lon + half_width,
            center.lat + half_height,
        )
    }

    pub fn validate(&self) -> Result<()> {
        let finite = [self.left, self.bottom, self.right, self.top]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(MapError::InvalidExtent(format!(
                "non-finite bounds in {:?}",
                self
            )));
        }
        if self.left >= self.right || self.bottom >= self.top {
            return Err(MapError::InvalidExtent(format!(
                "expected left < right and bottom < top, got {:?}",
                self
            )));
        }
        Ok(())
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }

    pub fn center(&self) -> LonLat {
        LonLat::new(
            (self.left + self.right) / 2.0,
            (self.bottom + self.top) / 2.0,
        )
    }

    /// Boundary-inclusive containment check
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.left && lon <= self.right && lat >= self.bottom && lat <= self.top
    }
}

impl Default for MapExtent {
    fn default() -> Self {
        let (left, bottom, right, top) = crate::core::constants::DEFAULT_MAX_EXTENT;
        Self::new(left, bottom, right, top)
    }
}
