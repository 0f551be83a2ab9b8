//! Replica change listeners

use billsync_aggregate::AggregateSnapshot;
use billsync_partition::PartitionName;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use ulid::Ulid;

/// Handle for removing a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListenerId(Ulid);

impl ListenerId {
    /// Generate new id
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Notification delivered after every effective replica change
#[derive(Debug, Clone)]
pub struct ReplicaChange {
    /// Partition the replica is bound to after the change
    pub partition: Option<PartitionName>,
    /// Replica version after the change
    pub version: u64,
    /// Number of records after the change
    pub record_count: usize,
    /// Aggregates recomputed from the changed replica
    pub aggregates: Arc<AggregateSnapshot>,
}

/// Listener callback
pub type ListenerFn = Arc<dyn Fn(&ReplicaChange) + Send + Sync>;

/// Registered listeners
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: DashMap<ListenerId, ListenerFn>,
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("count", &self.listeners.len())
            .finish()
    }
}

impl ListenerRegistry {
    /// Create new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback
    pub fn add(&self, callback: ListenerFn) -> ListenerId {
        let id = ListenerId::new();
        self.listeners.insert(id, callback);
        id
    }

    /// Unregister; returns whether it was registered
    pub fn remove(&self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    /// Number of registered listeners
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Check if none are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Invoke every listener
    ///
    /// Callbacks are collected first so a callback may add or remove
    /// listeners without deadlocking the map.
    pub fn notify(&self, change: &ReplicaChange) {
        let callbacks: Vec<ListenerFn> = self.listeners.iter().map(|e| Arc::clone(e.value())).collect();
        for callback in callbacks {
            callback(change);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn change() -> ReplicaChange {
        ReplicaChange {
            partition: None,
            version: 1,
            record_count: 0,
            aggregates: Arc::new(AggregateSnapshot::empty(&Utc::now())),
        }
    }

    #[test]
    fn add_notify_remove() {
        let registry = ListenerRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let id = registry.add(Arc::new(move |_: &ReplicaChange| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        registry.notify(&change());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        registry.notify(&change());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
