//! Public API surface for the reconciliation engine.
//!
//! This file consolidates the identifier newtypes and the DTO types consumed
//! by the presentation layer. All types derive Serialize/Deserialize for JSON
//! serialization.

pub use crate::connection::{ConnectionManager, EngineEvent, SubscriptionHandle};
pub use crate::engine::state::{EngineSnapshot, TrainView, UnresolvedDelta};
pub use crate::models::dataset::{RouteStop, Station, StaticDataset, Train};
pub use crate::models::delta::{RawDeltaFields, RawEnvelope, TrainDelta};
pub use crate::services::resolver::{MatchReason, Resolution, UnresolvedReason};

use serde::{Deserialize, Serialize};

/// Train identifier (static dataset primary key).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrainId(pub i64);

/// Station identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StationId(pub i64);

/// Composite transport-level identity of a telemetry sample.
///
/// Formed as `trainKey:variantKey` from the two-level feed envelope; stable
/// across repeated reports from the same source variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeltaId(pub String);

impl TrainId {
    pub fn new(value: i64) -> Self {
        TrainId(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl StationId {
    pub fn new(value: i64) -> Self {
        StationId(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl DeltaId {
    /// Build the composite identity from the two envelope keys.
    pub fn from_keys(outer: &str, inner: &str) -> Self {
        DeltaId(format!("{}:{}", outer, inner))
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TrainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::fmt::Display for StationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::fmt::Display for DeltaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<TrainId> for i64 {
    fn from(id: TrainId) -> Self {
        id.0
    }
}

/// Travel direction of a train or a telemetry sample.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Unknown,
}

/// Lifecycle status of the realtime feed connection.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Reconnecting,
    Disconnected,
    Error,
}

/// Last reported position of a live train.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivePosition {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
}

/// A scheduled stop derived from the selected run's station references,
/// resolved against the train's route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopRef {
    pub station_id: StationId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station_name: Option<String>,
    /// Scheduled arrival time as published in the route, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arrival: Option<String>,
    /// Scheduled departure time as published in the route, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departure: Option<String>,
    /// Order index of the stop within the route.
    pub order: i32,
    /// Day index for schedules that cross midnight.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<i64>,
}

/// Aggregate counters surfaced to the presentation layer.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineCounts {
    /// Trains with at least one live run
    pub live_trains: usize,
    /// Deltas that arrived but could not be attributed to any train
    pub unresolved_deltas: usize,
    /// Envelope triples discarded at normalization (non-finite position)
    pub dropped_invalid: u64,
}
