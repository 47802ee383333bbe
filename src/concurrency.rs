//! Per-root serialization of mutating workspace operations
//!
//! Mutations against the same workspace root run one at a time, in the order
//! they were issued. Reads never go through the queue: they read the last
//! committed tree snapshot.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-root FIFO operation queue.
///
/// `tokio::sync::Mutex` grants the lock in request order, so a second
/// mutation issued while one is in flight waits behind it.
pub struct OperationQueue {
    /// Map from workspace root to the lock guarding its mutations
    locks: Arc<RwLock<HashMap<String, Arc<RootSlot>>>>,
    /// Operations queued or in flight, across all roots
    pending: Arc<AtomicUsize>,
}

/// Lock and pending count of one root.
struct RootSlot {
    lock: Arc<Mutex<()>>,
    pending: Arc<AtomicUsize>,
}

impl RootSlot {
    fn new() -> Self {
        Self {
            lock: Arc::new(Mutex::new(())),
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// Held for the duration of one mutating operation.
pub struct OperationGuard {
    _guard: OwnedMutexGuard<()>,
    _ticket: PendingTicket,
}

/// Counts an operation as pending, globally and for its root, from the moment
/// it starts waiting.
struct PendingTicket {
    total: Arc<AtomicUsize>,
    root: Arc<AtomicUsize>,
}

impl PendingTicket {
    fn new(total: &Arc<AtomicUsize>, root: &Arc<AtomicUsize>) -> Self {
        total.fetch_add(1, Ordering::SeqCst);
        root.fetch_add(1, Ordering::SeqCst);
        Self {
            total: Arc::clone(total),
            root: Arc::clone(root),
        }
    }
}

impl Drop for PendingTicket {
    fn drop(&mut self) {
        self.root.fetch_sub(1, Ordering::SeqCst);
        self.total.fetch_sub(1, Ordering::SeqCst);
    }
}

impl OperationQueue {
    pub fn new() -> Self {
        Self {
            locks: Arc::new(RwLock::new(HashMap::new())),
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn slot(&self, root: &str) -> Arc<RootSlot> {
        {
            let map = self.locks.read();
            if let Some(slot) = map.get(root) {
                return slot.clone();
            }
        }

        let mut map = self.locks.write();
        // Another caller may have inserted it between the two locks
        map.entry(root.to_string())
            .or_insert_with(|| Arc::new(RootSlot::new()))
            .clone()
    }

    /// Wait for the root to be free, then hold it until the guard drops.
    pub async fn acquire(&self, root: &str) -> OperationGuard {
        let slot = self.slot(root);
        let ticket = PendingTicket::new(&self.pending, &slot.pending);
        let guard = Arc::clone(&slot.lock).lock_owned().await;
        OperationGuard {
            _guard: guard,
            _ticket: ticket,
        }
    }

    /// True when a mutation for `root` is currently in flight.
    pub fn is_busy(&self, root: &str) -> bool {
        let map = self.locks.read();
        map.get(root)
            .map(|slot| slot.lock.try_lock().is_err())
            .unwrap_or(false)
    }

    /// Number of operations queued or in flight, across every root.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Number of operations queued or in flight for `root`.
    pub fn pending_for(&self, root: &str) -> usize {
        let map = self.locks.read();
        map.get(root)
            .map(|slot| slot.pending.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

impl Default for OperationQueue {
    fn default() -> Self {
        Self::new()
    }
}
