//! Zoom level, resolution and scale ladder
//!
//! The ladder is indexed by zoom level: index 0 is the coarsest resolution and
//! the largest scale denominator. Scales are derived once from the resolutions
//! by the engine adapter and never change afterwards.

use crate::{core::config::validate_resolutions, MapError, Result};

/// Treats absent, zero and NaN scale bounds alike: as "no bound"
fn bound(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0 && !v.is_nan())
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScaleResolutionModel {
    resolutions: Vec<f64>,
    scales: Vec<f64>,
}

impl ScaleResolutionModel {
    /// Builds the ladder from resolutions and matching scales
    pub fn new(resolutions: Vec<f64>, scales: Vec<f64>) -> Result<Self> {
        validate_resolutions(&resolutions)?;
        if scales.len() != resolutions.len() {
            return Err(MapError::InvalidResolutions(format!(
                "{} scales derived for {} resolutions",
                scales.len(),
                resolutions.len()
            )));
        }
        if scales.windows(2).any(|pair| pair[1] > pair[0]) {
            return Err(MapError::InvalidResolutions(
                "derived scales must not increase with zoom level".to_string(),
            ));
        }
        Ok(Self {
            resolutions,
            scales,
        })
    }

    /// Builds the ladder deriving each scale from its resolution
    pub fn from_resolutions<F>(resolutions: Vec<f64>, scale_for: F) -> Result<Self>
    where
        F: Fn(f64) -> f64,
    {
        let scales = resolutions.iter().map(|r| scale_for(*r)).collect();
        Self::new(resolutions, scales)
    }

    pub fn resolutions(&self) -> &[f64] {
        &self.resolutions
    }

    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    pub fn len(&self) -> usize {
        self.resolutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolutions.is_empty()
    }

    pub fn max_zoom_level(&self) -> usize {
        self.resolutions.len() - 1
    }

    pub fn is_valid_zoom(&self, zoom: i64) -> bool {
        zoom >= 0 && zoom <= self.max_zoom_level() as i64
    }

    pub fn resolution_at(&self, zoom: usize) -> Option<f64> {
        self.resolutions.get(zoom).copied()
    }

    pub fn scale_at(&self, zoom: usize) -> Option<f64> {
        self.scales.get(zoom).copied()
    }

    /// Zoom level whose resolution equals the given one exactly
    pub fn zoom_for_resolution(&self, resolution: f64) -> Option<usize> {
        self.resolutions.iter().position(|r| *r == resolution)
    }

    /// Max resolution for the given scale.
    ///
    /// Finds `i` with `scales[i] < scale <= scales[i - 1]` and returns
    /// `resolutions[i - 1]`. Scales above the ladder map to the coarsest
    /// resolution, scales at or below the smallest scale to the finest. Returns `None` for NaN or
    /// when the ladder has fewer than two entries.
    pub fn resolution_for_scale(&self, scale: f64) -> Option<f64> {
        if scale.is_nan() || self.scales.len() < 2 {
            return None;
        }
        let index = (1..self.scales.len())
            .find(|&i| scale > self.scales[i] && scale <= self.scales[i - 1])
            .map(|i| i - 1)
            .unwrap_or_else(|| {
                let last = self.scales.len() - 1;
                if scale <= self.scales[last] {
                    last
                } else {
                    0
                }
            });
        self.resolution_at(index)
    }

    /// Zoom level whose scale is nearest to the given one
    pub fn nearest_zoom_for_scale(&self, scale: f64) -> Option<usize> {
        if !scale.is_finite() {
            return None;
        }
        self.scales
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| (*a - scale).abs().total_cmp(&(*b - scale).abs()))
            .map(|(zoom, _)| zoom)
    }

    /// Closest zoom level at which a layer with the given scale bounds is visible.
    ///
    /// Only adjusts when both bounds are present. When zoomed in too close
    /// (current scale below `min_scale`) scans towards level 0, when zoomed out
    /// too far (current scale above `max_scale`) scans towards the finest
    /// level. Falls back to `current_zoom`.
    pub fn closest_zoom_level(
        &self,
        current_zoom: usize,
        max_scale: Option<f64>,
        min_scale: Option<f64>,
    ) -> usize {
        let (Some(max_scale), Some(min_scale)) = (bound(max_scale), bound(min_scale)) else {
            return current_zoom;
        };
        let Some(scale) = self.scale_at(current_zoom) else {
            return current_zoom;
        };

        if scale < min_scale {
            if let Some(zoom) = (0..=current_zoom)
                .rev()
                .find(|&i| self.scales[i] >= min_scale)
            {
                return zoom;
            }
        } else if scale > max_scale {
            if let Some(zoom) = (current_zoom..self.scales.len()).find(|&i| self.scales[i] <= max_scale)
            {
                return zoom;
            }
        }
        current_zoom
    }

    fn in_layer_range(scale: f64, max_scale: Option<f64>, min_scale: Option<f64>) -> bool {
        bound(min_scale).map_or(true, |min| min >= scale)
            && bound(max_scale).map_or(true, |max| max <= scale)
    }

    /// Ladder scales visible for a layer with the given bounds, in ladder order
    pub fn layer_scales(&self, max_scale: Option<f64>, min_scale: Option<f64>) -> Vec<f64> {
        self.scales
            .iter()
            .copied()
            .filter(|s| Self::in_layer_range(*s, max_scale, min_scale))
            .collect()
    }

    /// Ladder resolutions visible for a layer with the given bounds, in ladder order
    pub fn layer_resolutions(&self, max_scale: Option<f64>, min_scale: Option<f64>) -> Vec<f64> {
        self.scales
            .iter()
            .zip(self.resolutions.iter())
            .filter(|(s, _)| Self::in_layer_range(**s, max_scale, min_scale))
            .map(|(_, r)| *r)
            .collect()
    }

    /// `current + adjustment` if it is a valid level, otherwise `current`.
    ///
    /// Out-of-range adjustments are ignored as a whole, not clamped.
    pub fn new_zoom_level(&self, current: usize, adjustment: i64) -> usize {
        (current as i64)
            .checked_add(adjustment)
            .filter(|zoom| self.is_valid_zoom(*zoom))
            .map_or(current, |zoom| zoom as usize)
    }
}
