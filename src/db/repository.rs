//! Store traits: the persistence collaborator contract.
//!
//! The engine treats persistence as an external key-value collaborator.
//! Writes are best-effort checkpoints for the next cold start; the in-memory
//! view is the source of truth for a running process.
//!
//! # Thread Safety
//! Implementations must be `Send + Sync` to work with async Rust.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::StoreResult;
use crate::api::{DeltaId, StationId, TrainId};
use crate::models::dataset::{Station, Train};
use crate::models::delta::TrainDelta;

/// Key-value collection of trains, keyed by train id.
#[async_trait]
pub trait TrainStore: Send + Sync {
    /// Replace the persisted train collection.
    ///
    /// # Returns
    /// * `Ok(usize)` - Number of trains written
    async fn put_trains(&self, trains: &[Train]) -> StoreResult<usize>;

    /// Fetch one train by id.
    async fn get_train(&self, id: TrainId) -> StoreResult<Option<Train>>;

    /// Fetch all persisted trains.
    async fn list_trains(&self) -> StoreResult<Vec<Train>>;
}

/// Key-value collection of stations, keyed by station id.
#[async_trait]
pub trait StationStore: Send + Sync {
    /// Replace the persisted station collection.
    async fn put_stations(&self, stations: &[Station]) -> StoreResult<usize>;

    /// Fetch one station by id.
    async fn get_station(&self, id: StationId) -> StoreResult<Option<Station>>;

    /// Fetch all persisted stations.
    async fn list_stations(&self) -> StoreResult<Vec<Station>>;
}

/// Key-value collection of telemetry deltas, keyed by delta identity and
/// range-queryable by `last_updated`.
#[async_trait]
pub trait DeltaStore: Send + Sync {
    /// Upsert a batch of deltas by identity.
    async fn put_deltas(&self, deltas: &[TrainDelta]) -> StoreResult<usize>;

    /// Fetch one delta by identity.
    async fn get_delta(&self, id: &DeltaId) -> StoreResult<Option<TrainDelta>>;

    /// Fetch all persisted deltas ordered by `last_updated` ascending.
    async fn list_deltas_sorted(&self) -> StoreResult<Vec<TrainDelta>>;

    /// Delete every delta whose `last_updated` predates `cutoff`.
    ///
    /// # Returns
    /// * `Ok(usize)` - Number of deltas deleted
    async fn delete_deltas_older_than(&self, cutoff: DateTime<Utc>) -> StoreResult<usize>;
}

/// Single "last synced" timestamp record used to judge cache freshness.
#[async_trait]
pub trait MetaStore: Send + Sync {
    async fn set_last_sync(&self, at: DateTime<Utc>) -> StoreResult<()>;

    async fn last_sync(&self) -> StoreResult<Option<DateTime<Utc>>>;
}

/// Combined store interface the engine depends on.
pub trait FullStore: TrainStore + StationStore + DeltaStore + MetaStore {}

impl<T: TrainStore + StationStore + DeltaStore + MetaStore> FullStore for T {}
