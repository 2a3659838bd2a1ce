//! Explicit connection manager.
//!
//! The realtime transport lives outside this crate; what the engine owns is
//! the connection lifecycle state and the subscriber list. Callers register
//! through [`ConnectionManager::subscribe`] and hold the returned handle;
//! dropping the handle unregisters the callback. Nothing here is
//! module-global.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::api::ConnectionStatus;

/// Events published to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum EngineEvent {
    StatusChanged {
        status: ConnectionStatus,
    },
    DatasetLoaded {
        trains: usize,
    },
    BatchApplied {
        applied: usize,
        unresolved: usize,
        dropped: u64,
        at: DateTime<Utc>,
    },
    Swept {
        evicted_runs: usize,
        cleared_trains: usize,
    },
}

type Subscriber = Box<dyn Fn(&EngineEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    subscribers: HashMap<u64, Subscriber>,
    next_id: u64,
}

/// Owner of the connection lifecycle state and the subscriber list.
pub struct ConnectionManager {
    registry: RwLock<Registry>,
    status: RwLock<ConnectionStatus>,
    last_error: RwLock<Option<String>>,
}

impl ConnectionManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            registry: RwLock::new(Registry::default()),
            status: RwLock::new(ConnectionStatus::Disconnected),
            last_error: RwLock::new(None),
        })
    }

    /// Register a callback; the subscription lives as long as the handle.
    pub fn subscribe(
        self: &Arc<Self>,
        callback: impl Fn(&EngineEvent) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        let mut registry = self.registry.write();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.subscribers.insert(id, Box::new(callback));
        SubscriptionHandle {
            id,
            manager: Arc::downgrade(self),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.read().subscribers.len()
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.read()
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Transition the connection status, notifying subscribers on change.
    pub fn set_status(&self, status: ConnectionStatus) {
        {
            let mut current = self.status.write();
            if *current == status {
                return;
            }
            *current = status;
        }
        self.publish(&EngineEvent::StatusChanged { status });
    }

    /// Record a transport failure: remembers the message and transitions to
    /// the error status. Reconciliation state is untouched.
    pub fn record_error(&self, message: impl Into<String>) {
        *self.last_error.write() = Some(message.into());
        self.set_status(ConnectionStatus::Error);
    }

    /// Deliver an event to every subscriber.
    pub fn publish(&self, event: &EngineEvent) {
        let registry = self.registry.read();
        for subscriber in registry.subscribers.values() {
            subscriber(event);
        }
    }

    fn unsubscribe(&self, id: u64) {
        self.registry.write().subscribers.remove(&id);
    }
}

/// Handle returned at subscribe time; dropping it unregisters the callback.
pub struct SubscriptionHandle {
    id: u64,
    manager: Weak<ConnectionManager>,
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.unsubscribe(self.id);
        }
    }
}
