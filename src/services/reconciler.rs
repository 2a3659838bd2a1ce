//! Cold-start reconciliation.
//!
//! On startup the engine replays persisted deltas onto the freshly loaded
//! static dataset before accepting new feed messages, reproducing the view
//! state that existed at the last successful write, bounded by the TTL.

use chrono::{DateTime, Duration, Utc};
use log::debug;

use crate::engine::state::{ApplyOutcome, EngineState};
use crate::models::delta::TrainDelta;
use crate::services::sweeper::SweepStats;

/// Counters from one cold-start replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub replayed: usize,
    pub merged: usize,
    pub unresolved: usize,
    pub sweep: SweepStats,
}

/// Replay persisted deltas through the live resolve-and-merge path.
///
/// Deltas are applied in `last_updated` ascending order, exactly as if each
/// had just arrived, then a single sweep evicts everything the TTL no longer
/// covers. Data older than the TTL is therefore never resurrected.
pub fn replay_persisted_deltas(
    state: &mut EngineState,
    mut deltas: Vec<TrainDelta>,
    now: DateTime<Utc>,
    ttl: Duration,
) -> ReplayStats {
    deltas.sort_by(|a, b| a.last_updated.cmp(&b.last_updated));

    let mut stats = ReplayStats {
        replayed: deltas.len(),
        ..Default::default()
    };

    for delta in deltas {
        match state.apply_delta(delta) {
            ApplyOutcome::Merged(_) => stats.merged += 1,
            ApplyOutcome::Unresolved(_) => stats.unresolved += 1,
        }
    }

    stats.sweep = state.sweep(now, ttl);
    debug!(
        "Cold-start replay: {} deltas, {} merged, {} unresolved, {} evicted",
        stats.replayed, stats.merged, stats.unresolved, stats.sweep.evicted_runs
    );
    stats
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod reconciler_tests;
