//! The live reconciliation engine.
//!
//! One logical owner of the train view collection: every mutation — live
//! batch merge, sweep, cold-start replay, run pinning, dataset refresh —
//! goes through the single state lock, so no two mutations interleave and a
//! batch is always published as one atomic transition.
//!
//! Persistence is write-through and fire-and-forget: a failed write is
//! logged and never blocks or rolls back the in-memory view.

pub mod state;

use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::api::{ConnectionStatus, DeltaId, TrainId};
use crate::config::EngineConfig;
use crate::connection::{ConnectionManager, EngineEvent};
use crate::db::checksum::is_cache_fresh;
use crate::db::repository::FullStore;
use crate::models::dataset::StaticDataset;
use crate::models::delta::{normalize_envelope, RawEnvelope};
use crate::services::reconciler::{replay_persisted_deltas, ReplayStats};
use state::{ApplyOutcome, EngineSnapshot, EngineState};

/// Counters from applying one feed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Deltas merged into a train's run set
    pub applied: usize,
    /// Deltas parked in the unresolved pool
    pub unresolved: usize,
    /// Envelope triples dropped at normalization
    pub dropped: u64,
}

/// The reconciliation engine.
pub struct LiveEngine {
    state: Arc<Mutex<EngineState>>,
    store: Option<Arc<dyn FullStore>>,
    connection: Arc<ConnectionManager>,
    config: EngineConfig,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl LiveEngine {
    /// Create an engine.
    ///
    /// `store` is the best-effort persistence collaborator; `None` means the
    /// store was unavailable and the engine runs from the static dataset
    /// alone.
    pub fn new(config: EngineConfig, store: Option<Arc<dyn FullStore>>) -> Self {
        if store.is_none() {
            info!("Engine running without a persisted store");
        }
        Self {
            state: Arc::new(Mutex::new(EngineState::new())),
            store,
            connection: ConnectionManager::new(),
            config,
            sweeper: Mutex::new(None),
        }
    }

    pub fn connection(&self) -> &Arc<ConnectionManager> {
        &self.connection
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replace the static dataset wholesale and write it through.
    pub fn set_dataset(&self, dataset: StaticDataset) {
        let trains = dataset.trains.clone();
        let stations = dataset.stations.clone();
        let count = trains.len();
        self.state.lock().set_dataset(dataset);
        self.connection
            .publish(&EngineEvent::DatasetLoaded { trains: count });

        if let Some(store) = self.store.clone() {
            Self::spawn_persist("put_dataset", async move {
                store.put_trains(&trains).await?;
                store.put_stations(&stations).await?;
                store.set_last_sync(Utc::now()).await
            });
        }
    }

    /// Cold start: load the dataset, replay persisted deltas through the
    /// live resolve-and-merge path, and sweep once.
    ///
    /// Runs before any feed batch; a store read failure degrades to an empty
    /// replay rather than an error.
    pub async fn cold_start(&self, dataset: StaticDataset) -> ReplayStats {
        self.set_dataset(dataset);

        let persisted = match &self.store {
            Some(store) => match store.list_deltas_sorted().await {
                Ok(deltas) => deltas,
                Err(err) => {
                    warn!("Cold start: failed to read persisted deltas: {}", err);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let now = Utc::now();
        let stats = {
            let mut state = self.state.lock();
            replay_persisted_deltas(&mut state, persisted, now, self.config.ttl())
        };
        self.prune_persisted(now);
        stats
    }

    /// Judge whether the persisted snapshot is fresh enough to skip a
    /// dataset refetch.
    pub async fn cache_is_fresh(&self) -> bool {
        let Some(store) = &self.store else {
            return false;
        };
        match store.last_sync().await {
            Ok(last_sync) => is_cache_fresh(last_sync, Utc::now(), self.config.cache_freshness()),
            Err(err) => {
                warn!("Failed to read last-sync record: {}", err);
                false
            }
        }
    }

    /// Apply one feed batch as a single atomic state transition.
    ///
    /// All deltas in the envelope are normalized, resolved and merged before
    /// observers see anything; the batch event is published after the lock
    /// is released.
    pub fn apply_batch(&self, envelope: &RawEnvelope) -> BatchStats {
        let now = Utc::now();
        let outcome = normalize_envelope(envelope, now);
        let to_persist = outcome.deltas.clone();

        let mut stats = BatchStats {
            dropped: outcome.dropped,
            ..Default::default()
        };

        {
            let mut state = self.state.lock();
            state.note_dropped(outcome.dropped);
            for delta in outcome.deltas {
                match state.apply_delta(delta) {
                    ApplyOutcome::Merged(_) => stats.applied += 1,
                    ApplyOutcome::Unresolved(_) => stats.unresolved += 1,
                }
            }
            state.note_batch_applied(now);
        }

        self.connection.publish(&EngineEvent::BatchApplied {
            applied: stats.applied,
            unresolved: stats.unresolved,
            dropped: stats.dropped,
            at: now,
        });

        if let Some(store) = self.store.clone() {
            if !to_persist.is_empty() {
                Self::spawn_persist("put_deltas", async move {
                    store.put_deltas(&to_persist).await?;
                    store.set_last_sync(Utc::now()).await
                });
            }
        }

        stats
    }

    /// Run one sweep pass over views, pool and persisted deltas.
    pub fn sweep_now(&self) {
        let now = Utc::now();
        let stats = self.state.lock().sweep(now, self.config.ttl());
        if stats.evicted_runs > 0 || stats.cleared_trains > 0 {
            debug!(
                "Sweep evicted {} runs, cleared {} trains",
                stats.evicted_runs, stats.cleared_trains
            );
        }
        self.connection.publish(&EngineEvent::Swept {
            evicted_runs: stats.evicted_runs,
            cleared_trains: stats.cleared_trains,
        });
        self.prune_persisted(now);
    }

    /// Pin a specific concurrent run as authoritative for a train.
    pub fn select_run(&self, train_id: TrainId, run_id: &DeltaId) -> bool {
        self.state.lock().select_run(train_id, run_id)
    }

    /// Read-only snapshot for the presentation layer.
    pub fn snapshot(&self) -> EngineSnapshot {
        self.state
            .lock()
            .snapshot(self.connection.status(), self.connection.last_error())
    }

    /// Arm the periodic sweeper. The period equals the TTL.
    pub fn start_sweeper(&self) {
        let mut guard = self.sweeper.lock();
        if guard.is_some() {
            return;
        }

        let state = Arc::clone(&self.state);
        let store = self.store.clone();
        let connection = Arc::clone(&self.connection);
        let ttl = self.config.ttl();
        let period = ttl.to_std().unwrap_or(std::time::Duration::from_secs(600));

        *guard = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick fires immediately; skip it.
            interval.tick().await;
            loop {
                interval.tick().await;
                let now = Utc::now();
                let stats = state.lock().sweep(now, ttl);
                connection.publish(&EngineEvent::Swept {
                    evicted_runs: stats.evicted_runs,
                    cleared_trains: stats.cleared_trains,
                });
                if let Some(store) = store.clone() {
                    let cutoff = now - ttl;
                    if let Err(err) = store.delete_deltas_older_than(cutoff).await {
                        warn!("Failed to prune persisted deltas: {}", err);
                    }
                }
            }
        }));
    }

    /// Disarm the sweeper timer and mark the feed disconnected.
    pub fn shutdown(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
        self.connection.set_status(ConnectionStatus::Disconnected);
    }

    /// Mirror the in-memory eviction cutoff onto the persisted delta store.
    fn prune_persisted(&self, now: chrono::DateTime<Utc>) {
        if let Some(store) = self.store.clone() {
            let cutoff = now - self.config.ttl();
            Self::spawn_persist("delete_deltas_older_than", async move {
                store.delete_deltas_older_than(cutoff).await.map(|_| ())
            });
        }
    }

    /// Fire-and-forget persistence. Outside a runtime the write is skipped;
    /// the in-memory view remains the source of truth either way.
    fn spawn_persist<F, T>(operation: &'static str, fut: F)
    where
        F: std::future::Future<Output = crate::db::error::StoreResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = fut.await {
                        warn!("Persistence write failed: {}", err.with_operation(operation));
                    }
                });
            }
            Err(_) => debug!("No async runtime, skipping persistence ({})", operation),
        }
    }
}

impl Drop for LiveEngine {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
    }
}
