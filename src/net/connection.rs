//! Connection identity and in-flight tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Track which connections are currently open

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Tracks open connections. Clones share the same set.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    active: Arc<Mutex<BTreeSet<ConnectionId>>>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new active connection. Returns a guard that removes it on drop.
    pub fn track(&self, id: ConnectionId) -> ConnectionGuard {
        lock(&self.active).insert(id);
        ConnectionGuard {
            active: Arc::clone(&self.active),
            id,
        }
    }

    /// Get current active connection count.
    pub fn active_count(&self) -> usize {
        lock(&self.active).len()
    }

    /// IDs of the connections open right now, oldest first.
    pub fn active_ids(&self) -> Vec<ConnectionId> {
        lock(&self.active).iter().copied().collect()
    }
}

fn lock(set: &Mutex<BTreeSet<ConnectionId>>) -> MutexGuard<'_, BTreeSet<ConnectionId>> {
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Guard that tracks a connection's lifetime.
/// Removes the connection when dropped, including when the connection
/// task is aborted.
#[derive(Debug)]
pub struct ConnectionGuard {
    active: Arc<Mutex<BTreeSet<ConnectionId>>>,
    id: ConnectionId,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        lock(&self.active).remove(&self.id);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
        assert!(id2.as_u64() > id1.as_u64());
    }

    #[test]
    fn connection_tracker_counts() {
        let tracker = ConnectionTracker::new();
        assert_eq!(tracker.active_count(), 0);

        let id1 = ConnectionId::new();
        let guard1 = tracker.track(id1);
        assert_eq!(guard1.id(), id1);
        assert_eq!(tracker.active_count(), 1);

        let id2 = ConnectionId::new();
        let guard2 = tracker.clone().track(id2);
        assert_eq!(tracker.active_count(), 2);
        assert_eq!(tracker.active_ids(), vec![id1, id2]);

        drop(guard1);
        assert_eq!(tracker.active_count(), 1);

        drop(guard2);
        assert_eq!(tracker.active_count(), 0);
    }
}
