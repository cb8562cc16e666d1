//! Module-wide defaults.
//! Keeping them in a single place makes the built-in ladder and projection easy to find.

/// Resolution ladder used when the configuration does not provide one.
pub const DEFAULT_RESOLUTIONS: [f64; 13] = [
    2000.0, 1000.0, 500.0, 200.0, 100.0, 50.0, 20.0, 10.0, 4.0, 2.0, 1.0, 0.5, 0.25,
];

/// Reference projection code.
pub const DEFAULT_SRS_NAME: &str = "EPSG:3067";

/// Projection of positions reported by geolocation providers.
pub const GEOLOCATION_SRS_NAME: &str = "EPSG:4326";

/// Default max extent as (left, bottom, right, top).
pub const DEFAULT_MAX_EXTENT: (f64, f64, f64, f64) = (0.0, 0.0, 10_000_000.0, 10_000_000.0);

/// Base url for plugin images.
pub const DEFAULT_IMAGE_URL: &str = "/Oskari/bundles";

/// Screen resolution used by the default scale derivation.
pub const DOTS_PER_INCH: f64 = 72.0;

/// Cached positions younger than this are acceptable (milliseconds).
pub const DEFAULT_GEOLOCATION_MAX_AGE_MS: u64 = 3_600_000;

/// Give up on a position query after this long (milliseconds).
pub const DEFAULT_GEOLOCATION_TIMEOUT_MS: u64 = 6_000;

/// Nested dispatch limit for request cascades triggered from listeners.
pub const MAX_DISPATCH_DEPTH: usize = 32;
