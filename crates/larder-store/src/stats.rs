use std::sync::atomic::{AtomicU64, Ordering};

/// Per-operation call counters of a backing store.
///
/// Every call is counted, including calls that fail.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub creates: u64,
    pub reads: u64,
    pub updates: u64,
    pub deletes: u64,
}

impl StoreStats {
    /// Total number of calls across all operations.
    pub fn total(&self) -> u64 {
        self.creates + self.reads + self.updates + self.deletes
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    creates: AtomicU64,
    reads: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
}

impl Counters {
    pub(crate) fn create(&self) {
        self.creates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn update(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> StoreStats {
        StoreStats {
            creates: self.creates.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
        }
    }
}
