//! Staleness sweeping.
//!
//! A run or pooled delta never outlives its `last_updated + TTL` window.
//! The sweep runs over the in-memory view set; the engine mirrors the same
//! cutoff onto the persisted delta store so the two cannot disagree about
//! liveness.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::api::{DeltaId, TrainId};
use crate::engine::state::{TrainView, UnresolvedDelta};
use crate::services::merger;

/// Counters from one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub evicted_runs: usize,
    /// Trains whose last run aged out and were fully reset
    pub cleared_trains: usize,
    pub evicted_unresolved: usize,
}

/// Drop every run older than the TTL.
///
/// A train losing its last run is reset atomically: selection, position,
/// stops and the live flag all clear together. A train losing its selected
/// run (but not all runs) falls back to the freshest survivor.
pub fn sweep_views(
    views: &mut HashMap<TrainId, TrainView>,
    now: DateTime<Utc>,
    ttl: Duration,
) -> SweepStats {
    let mut stats = SweepStats::default();

    for view in views.values_mut() {
        let before = view.runs.len();
        view.runs.retain(|run| now - run.last_updated <= ttl);
        let evicted = before - view.runs.len();
        if evicted == 0 {
            continue;
        }
        stats.evicted_runs += evicted;

        if view.runs.is_empty() {
            view.clear_live();
            stats.cleared_trains += 1;
        } else {
            merger::reselect(view);
            merger::recompute_derived(view);
        }
    }

    stats
}

/// Drop pooled unresolved deltas older than the TTL.
pub fn sweep_unresolved(
    pool: &mut HashMap<DeltaId, UnresolvedDelta>,
    now: DateTime<Utc>,
    ttl: Duration,
) -> usize {
    let before = pool.len();
    pool.retain(|_, entry| now - entry.delta.last_updated <= ttl);
    before - pool.len()
}

#[cfg(test)]
#[path = "sweeper_tests.rs"]
mod sweeper_tests;
