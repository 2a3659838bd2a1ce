//! Store factory.
//!
//! Creates store instances from runtime configuration and implements the
//! open policy: an open failure that asks for a schema migration is treated
//! as transient and retried once; any further failure marks the store
//! unavailable and the engine runs without cached live state.

use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use log::warn;

use super::error::{StoreError, StoreResult};
use super::repositories::MemoryStore;
use super::repository::FullStore;

/// Store backend configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreType {
    /// In-memory store
    Memory,
}

impl FromStr for StoreType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "mem" | "local" => Ok(Self::Memory),
            _ => Err(format!("Unknown store type: {}", s)),
        }
    }
}

impl StoreType {
    /// Get store type from the `STORE_TYPE` environment variable.
    /// Defaults to Memory.
    pub fn from_env() -> Self {
        std::env::var("STORE_TYPE")
            .ok()
            .and_then(|val| val.parse().ok())
            .unwrap_or(Self::Memory)
    }
}

/// Outcome of opening a store.
pub enum StoreHandle {
    /// The store opened and is usable.
    Available(Arc<dyn FullStore>),
    /// The store could not be opened; the engine falls back to building
    /// views entirely from the static dataset.
    Unavailable { reason: String },
}

impl StoreHandle {
    pub fn available(self) -> Option<Arc<dyn FullStore>> {
        match self {
            Self::Available(store) => Some(store),
            Self::Unavailable { .. } => None,
        }
    }
}

/// Store factory for creating store instances.
pub struct StoreFactory;

impl StoreFactory {
    /// Create a store instance based on type.
    pub fn create(store_type: StoreType) -> StoreResult<Arc<dyn FullStore>> {
        match store_type {
            StoreType::Memory => Ok(Arc::new(MemoryStore::new())),
        }
    }

    /// Open a store with the migrate-and-retry policy.
    ///
    /// A `MigrationError` on first open is retried once; every other failure,
    /// and a failed retry, yields `StoreHandle::Unavailable`.
    pub async fn open(store_type: StoreType) -> StoreHandle {
        Self::open_with(|| async move { Self::create(store_type) }).await
    }

    /// Open via a caller-supplied opener, applying the same retry policy.
    /// Exposed so failure paths are testable without a faulty backend.
    pub async fn open_with<F, Fut>(opener: F) -> StoreHandle
    where
        F: Fn() -> Fut,
        Fut: Future<Output = StoreResult<Arc<dyn FullStore>>>,
    {
        match opener().await {
            Ok(store) => StoreHandle::Available(store),
            Err(err) if err.is_migration() => {
                warn!("Store open requires migration, retrying once: {}", err);
                match opener().await {
                    Ok(store) => StoreHandle::Available(store),
                    Err(retry_err) => {
                        warn!("Store unavailable after migration retry: {}", retry_err);
                        StoreHandle::Unavailable {
                            reason: retry_err.to_string(),
                        }
                    }
                }
            }
            Err(err) => {
                warn!("Store unavailable: {}", err);
                StoreHandle::Unavailable {
                    reason: err.to_string(),
                }
            }
        }
    }
}
