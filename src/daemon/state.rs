//! Daemon state: the history store, settings and subscriptions.
//!
//! Owned exclusively by the daemon loop. No concurrent access; this is
//! what keeps the store single-writer.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

use crate::history::{HistoryConfig, HistoryStore};

/// Unique identifier for a client connection.
///
/// Monotonically increasing counter. Used to route pushed
/// notifications to subscribed connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug)]
pub struct DaemonState {
    pub store: HistoryStore,
    /// Publishes settings to the store; the store reads them on the
    /// next upsert or load.
    config: watch::Sender<HistoryConfig>,
    /// Connections that asked for change notifications.
    subscribers: HashSet<ConnectionId>,
}

impl DaemonState {
    pub fn new(store: HistoryStore, config: watch::Sender<HistoryConfig>) -> Self {
        Self {
            store,
            config,
            subscribers: HashSet::new(),
        }
    }

    /// Forget the subscription of a closed connection, if it had one.
    pub fn unsubscribe(&mut self, id: ConnectionId) {
        self.subscribers.remove(&id);
    }

    /// Register `id` for change notifications. Idempotent.
    pub fn subscribe(&mut self, id: ConnectionId) {
        self.subscribers.insert(id);
    }

    pub fn subscribers(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.subscribers.iter().copied()
    }

    pub fn config(&self) -> HistoryConfig {
        *self.config.borrow()
    }

    /// Publish new settings. Returns whether anything changed.
    pub fn set_config(&mut self, config: HistoryConfig) -> bool {
        self.config.send_if_modified(|current| {
            if *current == config {
                false
            } else {
                *current = config;
                true
            }
        })
    }
}
