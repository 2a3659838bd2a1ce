//! Service layer: the reconciliation algorithms.
//!
//! Each service is a set of pure functions over the model types; the engine
//! orchestrates them behind its single mutation point. Keeping the algorithms
//! free of locks and I/O makes the weight tables and eviction rules directly
//! unit-testable.

pub mod merger;
pub mod reconciler;
pub mod resolver;
pub mod sweeper;

pub use merger::{merge_run, pin_run};
pub use reconciler::{replay_persisted_deltas, ReplayStats};
pub use resolver::{resolve, score_candidate, Resolution, ResolutionCache, UnresolvedReason};
pub use sweeper::{sweep_unresolved, sweep_views, SweepStats};
