//! Persistence module: the external key-value collaborator.
//!
//! The engine persists the static dataset, the raw telemetry deltas, and a
//! single last-sync timestamp through the store traits defined here. The
//! store is a best-effort checkpoint for the next cold start; a write failure
//! is logged and never rolled back.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Engine (apply-batch, sweep, cold start)    │
//! └───────────────────┬─────────────────────────┘
//!                     │ fire-and-forget writes / cold-start reads
//! ┌───────────────────▼─────────────────────────┐
//! │  Store Traits (repository.rs)               │
//! └───────────────────┬─────────────────────────┘
//!                     │
//!     ┌───────────────▼───────────────┐
//!     │        Memory Store           │
//!     │        (in-memory)            │
//!     └───────────────────────────────┘
//! ```

pub mod checksum;
pub mod error;
pub mod factory;
pub mod repositories;
pub mod repository;

pub use checksum::{calculate_checksum, is_cache_fresh};
pub use error::{ErrorContext, StoreError, StoreResult};
pub use factory::{StoreFactory, StoreHandle, StoreType};
pub use repositories::MemoryStore;
pub use repository::{DeltaStore, FullStore, MetaStore, StationStore, TrainStore};
