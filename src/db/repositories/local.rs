//! In-memory store implementation.
//!
//! Backs tests and local development. All collections live behind
//! `parking_lot` locks; no operation here can fail, which makes this
//! implementation useful as the happy-path baseline in integration tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::api::{DeltaId, StationId, TrainId};
use crate::db::error::StoreResult;
use crate::db::repository::{DeltaStore, MetaStore, StationStore, TrainStore};
use crate::models::dataset::{Station, Train};
use crate::models::delta::TrainDelta;

/// In-memory key-value store.
#[derive(Default)]
pub struct MemoryStore {
    trains: RwLock<HashMap<TrainId, Train>>,
    stations: RwLock<HashMap<StationId, Station>>,
    deltas: RwLock<HashMap<DeltaId, TrainDelta>>,
    last_sync: RwLock<Option<DateTime<Utc>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted deltas, for test assertions.
    pub fn delta_count(&self) -> usize {
        self.deltas.read().len()
    }
}

#[async_trait]
impl TrainStore for MemoryStore {
    async fn put_trains(&self, trains: &[Train]) -> StoreResult<usize> {
        let mut guard = self.trains.write();
        guard.clear();
        for train in trains {
            guard.insert(train.id, train.clone());
        }
        Ok(trains.len())
    }

    async fn get_train(&self, id: TrainId) -> StoreResult<Option<Train>> {
        Ok(self.trains.read().get(&id).cloned())
    }

    async fn list_trains(&self) -> StoreResult<Vec<Train>> {
        let mut trains: Vec<Train> = self.trains.read().values().cloned().collect();
        trains.sort_by_key(|t| t.id);
        Ok(trains)
    }
}

#[async_trait]
impl StationStore for MemoryStore {
    async fn put_stations(&self, stations: &[Station]) -> StoreResult<usize> {
        let mut guard = self.stations.write();
        guard.clear();
        for station in stations {
            guard.insert(station.id, station.clone());
        }
        Ok(stations.len())
    }

    async fn get_station(&self, id: StationId) -> StoreResult<Option<Station>> {
        Ok(self.stations.read().get(&id).cloned())
    }

    async fn list_stations(&self) -> StoreResult<Vec<Station>> {
        let mut stations: Vec<Station> = self.stations.read().values().cloned().collect();
        stations.sort_by_key(|s| s.id);
        Ok(stations)
    }
}

#[async_trait]
impl DeltaStore for MemoryStore {
    async fn put_deltas(&self, deltas: &[TrainDelta]) -> StoreResult<usize> {
        let mut guard = self.deltas.write();
        for delta in deltas {
            guard.insert(delta.id.clone(), delta.clone());
        }
        Ok(deltas.len())
    }

    async fn get_delta(&self, id: &DeltaId) -> StoreResult<Option<TrainDelta>> {
        Ok(self.deltas.read().get(id).cloned())
    }

    async fn list_deltas_sorted(&self) -> StoreResult<Vec<TrainDelta>> {
        let mut deltas: Vec<TrainDelta> = self.deltas.read().values().cloned().collect();
        deltas.sort_by(|a, b| a.last_updated.cmp(&b.last_updated));
        Ok(deltas)
    }

    async fn delete_deltas_older_than(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        let mut guard = self.deltas.write();
        let before = guard.len();
        guard.retain(|_, delta| delta.last_updated >= cutoff);
        Ok(before - guard.len())
    }
}

#[async_trait]
impl MetaStore for MemoryStore {
    async fn set_last_sync(&self, at: DateTime<Utc>) -> StoreResult<()> {
        *self.last_sync.write() = Some(at);
        Ok(())
    }

    async fn last_sync(&self) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(*self.last_sync.read())
    }
}
