//! Engine state: the live train view collection.
//!
//! All mutation goes through the reducer-style methods here, invoked by the
//! engine while holding its single lock. Read access happens via cloned
//! snapshots only.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{
    ConnectionStatus, DeltaId, EngineCounts, LivePosition, StopRef, TrainId,
};
use crate::models::dataset::{StaticDataset, Train};
use crate::models::delta::TrainDelta;
use crate::services::resolver::{
    self, Resolution, ResolutionCache, UnresolvedReason,
};
use crate::services::{merger, sweeper};

/// The externally consumed composite of a static train and its live state.
///
/// Invariant: `selected_run` always references a run present in `runs`; when
/// `runs` is empty, selection, position, stops and the live flag are all
/// cleared together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainView {
    pub train: Train,
    /// Concurrent live runs, freshest first
    pub runs: Vec<TrainDelta>,
    /// Identity of the run authoritative for display
    pub selected_run: Option<DeltaId>,
    /// Whether the selection was pinned by the caller
    pub pinned: bool,
    pub live_position: Option<LivePosition>,
    pub upcoming_stop: Option<StopRef>,
    pub previous_stop: Option<StopRef>,
    pub is_live: bool,
}

impl TrainView {
    pub fn new(train: Train) -> Self {
        Self {
            train,
            runs: Vec::new(),
            selected_run: None,
            pinned: false,
            live_position: None,
            upcoming_stop: None,
            previous_stop: None,
            is_live: false,
        }
    }

    /// The run currently authoritative for display.
    pub fn selected(&self) -> Option<&TrainDelta> {
        let id = self.selected_run.as_ref()?;
        self.runs.iter().find(|r| &r.id == id)
    }

    /// Atomic reset of all live state. Never clears fields piecemeal.
    pub fn clear_live(&mut self) {
        self.runs.clear();
        self.selected_run = None;
        self.pinned = false;
        self.live_position = None;
        self.upcoming_stop = None;
        self.previous_stop = None;
        self.is_live = false;
    }
}

/// A delta that arrived but could not be attributed to any train.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnresolvedDelta {
    pub delta: TrainDelta,
    pub reason: UnresolvedReason,
}

/// Outcome of applying one delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Merged(TrainId),
    Unresolved(UnresolvedReason),
}

/// Read-only snapshot published to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub views: Vec<TrainView>,
    pub counts: EngineCounts,
    pub status: ConnectionStatus,
    pub last_batch_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// The mutable engine state. One logical owner; see the engine lock.
#[derive(Default)]
pub struct EngineState {
    dataset: Option<StaticDataset>,
    views: HashMap<TrainId, TrainView>,
    unresolved: HashMap<DeltaId, UnresolvedDelta>,
    cache: ResolutionCache,
    dropped_invalid: u64,
    last_batch_at: Option<DateTime<Utc>>,
}

impl EngineState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the static dataset wholesale.
    ///
    /// Rebuilds every train view and clears the resolution cache; previously
    /// unresolved deltas stay pooled and are retried on their next arrival.
    pub fn set_dataset(&mut self, dataset: StaticDataset) {
        self.views = dataset
            .trains
            .iter()
            .map(|t| (t.id, TrainView::new(t.clone())))
            .collect();
        self.cache.clear();
        self.dataset = Some(dataset);
    }

    pub fn dataset(&self) -> Option<&StaticDataset> {
        self.dataset.as_ref()
    }

    pub fn view(&self, id: TrainId) -> Option<&TrainView> {
        self.views.get(&id)
    }

    pub fn unresolved(&self) -> &HashMap<DeltaId, UnresolvedDelta> {
        &self.unresolved
    }

    pub fn note_dropped(&mut self, count: u64) {
        self.dropped_invalid += count;
    }

    pub fn note_batch_applied(&mut self, at: DateTime<Utc>) {
        self.last_batch_at = at.into();
    }

    /// Resolve one delta and integrate it into its train's run set.
    ///
    /// Both the live feed path and cold-start replay funnel through here, so
    /// the two can never diverge.
    pub fn apply_delta(&mut self, delta: TrainDelta) -> ApplyOutcome {
        let Some(dataset) = self.dataset.as_ref() else {
            let reason = UnresolvedReason::NoCandidate;
            self.unresolved
                .insert(delta.id.clone(), UnresolvedDelta { delta, reason });
            return ApplyOutcome::Unresolved(reason);
        };

        match resolver::resolve(&delta, dataset, &mut self.cache) {
            Resolution::Resolved(train_id) => {
                self.unresolved.remove(&delta.id);
                if let Some(view) = self.views.get_mut(&train_id) {
                    merger::merge_run(view, delta);
                }
                ApplyOutcome::Merged(train_id)
            }
            Resolution::Unresolved(reason) => {
                self.unresolved
                    .insert(delta.id.clone(), UnresolvedDelta { delta, reason });
                ApplyOutcome::Unresolved(reason)
            }
        }
    }

    /// Pin a specific run as authoritative for a train.
    ///
    /// Returns false when the train or the run is unknown; the run set is
    /// never altered.
    pub fn select_run(&mut self, train_id: TrainId, run_id: &DeltaId) -> bool {
        match self.views.get_mut(&train_id) {
            Some(view) => merger::pin_run(view, run_id),
            None => false,
        }
    }

    /// Evict stale runs and stale pool entries.
    pub fn sweep(&mut self, now: DateTime<Utc>, ttl: Duration) -> sweeper::SweepStats {
        let mut stats = sweeper::sweep_views(&mut self.views, now, ttl);
        stats.evicted_unresolved = sweeper::sweep_unresolved(&mut self.unresolved, now, ttl);
        stats
    }

    pub fn counts(&self) -> EngineCounts {
        EngineCounts {
            live_trains: self.views.values().filter(|v| v.is_live).count(),
            unresolved_deltas: self.unresolved.len(),
            dropped_invalid: self.dropped_invalid,
        }
    }

    /// Clone the view collection into a snapshot, ordered by train id.
    pub fn snapshot(&self, status: ConnectionStatus, last_error: Option<String>) -> EngineSnapshot {
        let mut views: Vec<TrainView> = self.views.values().cloned().collect();
        views.sort_by_key(|v| v.train.id);
        EngineSnapshot {
            views,
            counts: self.counts(),
            status,
            last_batch_at: self.last_batch_at,
            last_error,
        }
    }
}
