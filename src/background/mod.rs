pub mod geolocation;

pub use geolocation::{
    FixedPositionProvider, GeoPosition, GeolocationError, GeolocationOptions, GeolocationProvider,
    GeolocationService, LocationCallback, PositionReply, PositionResult, QueryId,
};
