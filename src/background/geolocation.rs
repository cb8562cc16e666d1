//! User location queries
//!
//! The platform answers location queries asynchronously. A provider gets a
//! [`PositionReply`] it may complete from any thread; results travel over a
//! channel and are picked up by the map module on its own thread through
//! [`GeolocationService::try_recv_results`], so they re-enter the module as
//! ordinary synchronous work.

use crate::{
    core::{
        constants::{DEFAULT_GEOLOCATION_MAX_AGE_MS, DEFAULT_GEOLOCATION_TIMEOUT_MS},
        geo::LonLat,
    },
    prelude::HashMap,
};
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Options passed through to the provider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeolocationOptions {
    /// Age of a cached position that is still acceptable
    #[serde(with = "millis")]
    pub maximum_age: Duration,
    #[serde(with = "millis")]
    pub timeout: Duration,
    pub enable_high_accuracy: bool,
}

impl Default for GeolocationOptions {
    fn default() -> Self {
        Self {
            maximum_age: Duration::from_millis(DEFAULT_GEOLOCATION_MAX_AGE_MS),
            timeout: Duration::from_millis(DEFAULT_GEOLOCATION_TIMEOUT_MS),
            enable_high_accuracy: false,
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

/// Position reported by the platform, in WGS84 degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub lon: f64,
    pub lat: f64,
    /// Accuracy radius in meters
    pub accuracy: Option<f64>,
}

impl GeoPosition {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self {
            lon,
            lat,
            accuracy: None,
        }
    }

    pub fn lonlat(&self) -> LonLat {
        LonLat::new(self.lon, self.lat)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GeolocationError {
    #[error("User denied the location query")]
    PermissionDenied,
    #[error("Position unavailable")]
    PositionUnavailable,
    #[error("Location query timed out")]
    Timeout,
    #[error("No geolocation provider available")]
    Unsupported,
}

pub type PositionResult = std::result::Result<GeoPosition, GeolocationError>;

/// Identifies an outstanding location query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryId(u64);

/// One-shot reply channel handed to the provider.
///
/// Dropping a reply without sending completes the query with
/// [`GeolocationError::PositionUnavailable`].
#[derive(Debug)]
pub struct PositionReply {
    id: QueryId,
    sender: Sender<(QueryId, PositionResult)>,
    sent: bool,
}

impl PositionReply {
    fn new(id: QueryId, sender: Sender<(QueryId, PositionResult)>) -> Self {
        Self {
            id,
            sender,
            sent: false,
        }
    }

    pub fn id(&self) -> QueryId {
        self.id
    }

    /// Completes the query. Returns false if the service is gone.
    pub fn send(mut self, result: PositionResult) -> bool {
        self.sent = true;
        self.sender.send((self.id, result)).is_ok()
    }
}

impl Drop for PositionReply {
    fn drop(&mut self) {
        if !self.sent {
            log::debug!("Location query {:?} dropped without an answer", self.id);
            let _ = self
                .sender
                .send((self.id, Err(GeolocationError::PositionUnavailable)));
        }
    }
}

/// Source of user positions (browser geolocation, GPS daemon, fixed test value...)
pub trait GeolocationProvider: Send {
    /// Starts a query. The reply may be completed now or later, from any thread.
    fn current_position(&mut self, options: &GeolocationOptions, reply: PositionReply);
}

/// Called with the position in map projection, or `None` on failure
pub type LocationCallback = Box<dyn FnOnce(Option<LonLat>) + Send>;

struct PendingQuery {
    callback: Option<LocationCallback>,
    center_map: bool,
}

/// A finished query, ready to be delivered
pub struct CompletedQuery {
    pub id: QueryId,
    pub result: PositionResult,
    pub callback: Option<LocationCallback>,
    pub center_map: bool,
}

pub struct GeolocationService {
    provider: Option<Box<dyn GeolocationProvider>>,
    result_tx: Sender<(QueryId, PositionResult)>,
    result_rx: Receiver<(QueryId, PositionResult)>,
    pending: HashMap<QueryId, PendingQuery>,
    next_id: u64,
}

impl GeolocationService {
    pub fn new(provider: Option<Box<dyn GeolocationProvider>>) -> Self {
        let (result_tx, result_rx) = unbounded();
        Self {
            provider,
            result_tx,
            result_rx,
            pending: HashMap::default(),
            next_id: 0,
        }
    }

    pub fn set_provider(&mut self, provider: Box<dyn GeolocationProvider>) {
        self.provider = Some(provider);
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Starts a location query.
    ///
    /// Without a provider the query fails with [`GeolocationError::Unsupported`]
    /// on the next drain, like any other failure.
    pub fn request(
        &mut self,
        options: &GeolocationOptions,
        callback: Option<LocationCallback>,
        center_map: bool,
    ) -> QueryId {
        let id = QueryId(self.next_id);
        self.next_id += 1;
        self.pending.insert(
            id,
            PendingQuery {
                callback,
                center_map,
            },
        );

        let reply = PositionReply::new(id, self.result_tx.clone());
        match self.provider.as_mut() {
            Some(provider) => provider.current_position(options, reply),
            None => {
                reply.send(Err(GeolocationError::Unsupported));
            }
        }
        id
    }

    /// Collects every query that has completed since the last call
    pub fn try_recv_results(&mut self) -> Vec<CompletedQuery> {
        let mut completed = Vec::new();
        while let Ok((id, result)) = self.result_rx.try_recv() {
            // a provider answering twice only counts once
            let Some(query) = self.pending.remove(&id) else {
                continue;
            };
            completed.push(CompletedQuery {
                id,
                result,
                callback: query.callback,
                center_map: query.center_map,
            });
        }
        completed
    }

    /// Number of queries still waiting for an answer
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl std::fmt::Debug for GeolocationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeolocationService")
            .field("has_provider", &self.has_provider())
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// Provider answering every query immediately with the same result
#[derive(Debug, Clone)]
pub struct FixedPositionProvider {
    result: PositionResult,
}

impl FixedPositionProvider {
    pub fn new(position: GeoPosition) -> Self {
        Self {
            result: Ok(position),
        }
    }

    pub fn failing(error: GeolocationError) -> Self {
        Self { result: Err(error) }
    }
}

impl GeolocationProvider for FixedPositionProvider {
    fn current_position(&mut self, _options: &GeolocationOptions, reply: PositionReply) {
        reply.send(self.result);
    }
}
