use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use larder_types::{QueryOptions, Record};

use crate::error::{StoreError, StoreResult};
use crate::stats::{Counters, StoreStats};
use crate::traits::BackingStore;

/// In-memory, HashMap-based backing store.
///
/// Intended for tests and embedding. All records are held in memory behind a
/// `RwLock` for safe concurrent access. Records are cloned on read/write.
pub struct InMemoryBackingStore<T: Record> {
    records: RwLock<HashMap<T::Key, T>>,
    read_only: AtomicBool,
    counters: Counters,
}

impl<T: Record> InMemoryBackingStore<T> {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            read_only: AtomicBool::new(false),
            counters: Counters::default(),
        }
    }

    /// Create a store pre-populated with `records`, without counting a call.
    pub fn with_records(records: impl IntoIterator<Item = T>) -> Self {
        let store = Self::new();
        {
            let mut map = store.records.write();
            for r in records {
                map.insert(r.key(), r);
            }
        }
        store
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Look up a record by key, without counting a call.
    pub fn get(&self, key: &T::Key) -> Option<T> {
        self.records.read().get(key).cloned()
    }

    /// Returns `true` if a record with this key is stored.
    pub fn contains(&self, key: &T::Key) -> bool {
        self.records.read().contains_key(key)
    }

    /// Make every subsequent write fail with [`StoreError::ReadOnly`].
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Call counters since creation.
    pub fn stats(&self) -> StoreStats {
        self.counters.snapshot()
    }

    /// Remove all records from the store.
    pub fn clear(&self) {
        self.records.write().clear();
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StoreError::ReadOnly);
        }
        Ok(())
    }
}

impl<T: Record> Default for InMemoryBackingStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> BackingStore<T> for InMemoryBackingStore<T> {
    fn create(&self, records: &[T], _options: &QueryOptions) -> StoreResult<()> {
        self.counters.create();
        self.check_writable()?;
        let mut map = self.records.write();
        if let Some(existing) = records.iter().find(|r| map.contains_key(&r.key())) {
            return Err(StoreError::Conflict(format!("{:?}", existing.key())));
        }
        for r in records {
            map.insert(r.key(), r.clone());
        }
        Ok(())
    }

    fn read_all(&self, _options: &QueryOptions) -> StoreResult<Vec<T>> {
        self.counters.read();
        Ok(self.records.read().values().cloned().collect())
    }

    fn update(&self, records: &[T], _options: &QueryOptions) -> StoreResult<()> {
        self.counters.update();
        self.check_writable()?;
        let mut map = self.records.write();
        if let Some(missing) = records.iter().find(|r| !map.contains_key(&r.key())) {
            return Err(StoreError::NotFound(format!("{:?}", missing.key())));
        }
        for r in records {
            map.insert(r.key(), r.clone());
        }
        Ok(())
    }

    fn delete(&self, records: &[T], _options: &QueryOptions) -> StoreResult<()> {
        self.counters.delete();
        self.check_writable()?;
        let mut map = self.records.write();
        for r in records {
            map.remove(&r.key());
        }
        Ok(())
    }
}

impl<T: Record> std::fmt::Debug for InMemoryBackingStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBackingStore")
            .field("record_count", &self.len())
            .field("read_only", &self.read_only.load(Ordering::SeqCst))
            .finish()
    }
}
