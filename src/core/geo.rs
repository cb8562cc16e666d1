use serde::{Deserialize, Serialize};

/// A position in map projection coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl LonLat {
    /// Creates a new position
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// True if neither component is NaN
    pub fn is_number(&self) -> bool {
        !self.lon.is_nan() && !self.lat.is_nan()
    }

    /// Offsets the position by the given amount of map units
    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.lon + dx, self.lat + dy)
    }
}

impl Default for LonLat {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Array form `[lon, lat]` as accepted by move requests.
impl From<[f64; 2]> for LonLat {
    fn from(value: [f64; 2]) -> Self {
        Self::new(value[0], value[1])
    }
}

impl From<(f64, f64)> for LonLat {
    fn from(value: (f64, f64)) -> Self {
        Self::new(value.0, value.1)
    }
}

/// Size of the map viewport in pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// A size is usable for notifications only when both sides are non-zero
    pub fn is_empty(&self) -> bool {
        self.width == 0.0 || self.height == 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lon_lat_from_array() {
        let lonlat = LonLat::from([385_000.0, 6_675_000.0]);
        assert_eq!(lonlat.lon, 385_000.0);
        assert_eq!(lonlat.lat, 6_675_000.0);
    }

    #[test]
    fn test_lon_lat_is_number() {
        assert!(LonLat::new(1.0, 2.0).is_number());
        assert!(!LonLat::new(f64::NAN, 2.0).is_number());
        assert!(!LonLat::new(1.0, f64::NAN).is_number());
    }

    #[test]
    fn test_size_is_empty() {
        assert!(Size::new(0.0, 600.0).is_empty());
        assert!(Size::new(800.0, 0.0).is_empty());
        assert!(!Size::new(800.0, 600.0).is_empty());
    }
}
