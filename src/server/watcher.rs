//! Live-connection accounting.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counts sockets that have been accepted and not yet closed.
///
/// Scoped to one server; clones share the same counter.
#[derive(Debug, Clone, Default)]
pub struct ConnectionWatcher {
    live: Arc<AtomicU64>,
}

impl ConnectionWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly accepted connection. The count drops again when the
    /// returned guard is dropped.
    pub fn track(&self) -> ConnectionGuard {
        self.live.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            live: Arc::clone(&self.live),
        }
    }

    pub fn count(&self) -> u64 {
        self.live.load(Ordering::SeqCst)
    }
}

/// Holds one slot in the live-connection count for as long as it exists.
#[derive(Debug)]
pub struct ConnectionGuard {
    live: Arc<AtomicU64>,
}

impl ConnectionGuard {
    /// Current count across the whole server, this connection included.
    pub fn live_connections(&self) -> u64 {
        self.live.load(Ordering::SeqCst)
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_increment_and_decrement() {
        let watcher = ConnectionWatcher::new();
        assert_eq!(watcher.count(), 0);

        let first = watcher.track();
        let second = watcher.track();
        assert_eq!(watcher.count(), 2);
        assert_eq!(first.live_connections(), 2);

        drop(first);
        assert_eq!(watcher.count(), 1);

        drop(second);
        assert_eq!(watcher.count(), 0);
    }

    #[test]
    fn separate_watchers_do_not_share_counts() {
        let a = ConnectionWatcher::new();
        let b = ConnectionWatcher::new();
        let _guard = a.track();

        assert_eq!(a.count(), 1);
        assert_eq!(b.count(), 0);
    }
}
