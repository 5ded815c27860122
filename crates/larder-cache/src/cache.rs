//! The write-through CRUD orchestrator.
//!
//! Every write is applied to the in-memory collection first and then
//! forwarded to the backing store. Reads are answered from memory, except
//! [`ReadOperation::all_direct`], which goes to the store.
//!
//! A store failure after the in-memory change is reported as
//! [`CacheError::BackingStore`] with `cache_applied` set. The in-memory
//! change is kept; callers may [`WriteThroughCache::evict`] to resync.

use std::sync::Arc;

use tracing::{debug, warn};

use larder_collection::IndexedCollection;
use larder_store::{BackingStore, StoreError};
use larder_types::{Predicate, QueryOptions, Record, RecordType};

use crate::config::CacheConfig;
use crate::descriptor::Cached;
use crate::error::{CacheError, CacheResult, Operation};
use crate::registry::CollectionRegistry;

/// Write-through cache over any number of record types.
pub struct WriteThroughCache {
    registry: CollectionRegistry,
}

impl WriteThroughCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            registry: CollectionRegistry::new(config),
        }
    }

    /// Bind the backing store for `T`.
    pub fn register<T: Record>(&self, store: Arc<dyn BackingStore<T>>) -> &Self {
        self.registry.bind::<T>(store);
        self
    }

    pub fn registry(&self) -> &CollectionRegistry {
        &self.registry
    }

    pub fn create<T: Cached>(&self) -> CacheResult<CreateOperation<T>> {
        Ok(CreateOperation {
            target: self.target::<T>()?,
        })
    }

    pub fn read<T: Cached>(&self) -> CacheResult<ReadOperation<T>> {
        Ok(ReadOperation {
            target: self.target::<T>()?,
        })
    }

    pub fn update<T: Cached>(&self) -> CacheResult<UpdateOperation<T>> {
        Ok(UpdateOperation {
            target: self.target::<T>()?,
        })
    }

    pub fn delete<T: Cached>(&self) -> CacheResult<DeleteOperation<T>> {
        Ok(DeleteOperation {
            target: self.target::<T>()?,
        })
    }

    /// Drop records from memory only. Returns how many were cached.
    pub fn evict<T: Cached>(&self, records: &[T]) -> CacheResult<usize> {
        let target = self.target::<T>()?;
        let removed = target.collection.remove_all(records);
        debug!(record_type = %target.record_type, removed, "evicted records");
        Ok(removed)
    }

    /// Empty every bootstrapped collection. The backing stores are untouched
    /// and nothing is reloaded.
    pub fn clear(&self) {
        self.registry.clear();
    }

    fn target<T: Cached>(&self) -> CacheResult<Target<T>> {
        Ok(Target {
            record_type: RecordType::of::<T>(),
            collection: self.registry.get::<T>()?,
            store: self.registry.store::<T>()?,
        })
    }
}

impl Default for WriteThroughCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl std::fmt::Debug for WriteThroughCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteThroughCache")
            .field("registry", &self.registry)
            .finish()
    }
}

/// The collection and store one operation handle works against.
struct Target<T: Record> {
    record_type: RecordType,
    collection: Arc<dyn IndexedCollection<T>>,
    store: Arc<dyn BackingStore<T>>,
}

impl<T: Record> Target<T> {
    fn rejected(&self, operation: Operation, source: larder_collection::CollectionError) -> CacheError {
        CacheError::Collection {
            record_type: self.record_type,
            operation,
            source,
        }
    }

    fn store_failed(&self, operation: Operation, cache_applied: bool, source: StoreError) -> CacheError {
        if cache_applied {
            warn!(
                record_type = %self.record_type,
                %operation,
                error = %source,
                "backing store failed after cache update; cache and store diverge"
            );
        }
        CacheError::BackingStore {
            record_type: self.record_type,
            operation,
            cache_applied,
            source,
        }
    }

    fn unsupported(&self, predicate: &Predicate<T>) -> CacheError {
        CacheError::UnsupportedQuery {
            record_type: self.record_type,
            representation: predicate.representation(),
        }
    }
}

impl<T: Record> std::fmt::Debug for Target<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Target")
            .field("record_type", &self.record_type)
            .field("cached", &self.collection.len())
            .finish()
    }
}

impl<T: Record> std::fmt::Debug for CreateOperation<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CreateOperation").field(&self.target).finish()
    }
}

impl<T: Record> std::fmt::Debug for ReadOperation<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ReadOperation").field(&self.target).finish()
    }
}

impl<T: Record> std::fmt::Debug for UpdateOperation<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("UpdateOperation").field(&self.target).finish()
    }
}

impl<T: Record> std::fmt::Debug for DeleteOperation<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DeleteOperation").field(&self.target).finish()
    }
}

// ---------------------------------------------------------------
// Create
// ---------------------------------------------------------------

pub struct CreateOperation<T: Record> {
    target: Target<T>,
}

impl<T: Record> CreateOperation<T> {
    pub fn from(&self, records: impl IntoIterator<Item = T>) -> CacheResult<&Self> {
        self.from_with(records, &QueryOptions::none())
    }

    /// Cache `records`, then create them in the store.
    ///
    /// A key that is already cached, or a batch the collection's indexes
    /// reject, fails with [`CacheError::Collection`] before the store is
    /// called; the cached records are left untouched.
    pub fn from_with(
        &self,
        records: impl IntoIterator<Item = T>,
        options: &QueryOptions,
    ) -> CacheResult<&Self> {
        let batch: Vec<T> = records.into_iter().collect();
        let target = &self.target;
        target
            .collection
            .insert_new(&batch)
            .map_err(|e| target.rejected(Operation::Create, e))?;
        target
            .store
            .create(&batch, options)
            .map_err(|e| target.store_failed(Operation::Create, !batch.is_empty(), e))?;
        debug!(record_type = %target.record_type, records = batch.len(), "created");
        Ok(self)
    }
}

// ---------------------------------------------------------------
// Read
// ---------------------------------------------------------------

pub struct ReadOperation<T: Record> {
    target: Target<T>,
}

impl<T: Record> ReadOperation<T> {
    /// Every cached record.
    pub fn all(&self) -> Vec<T> {
        self.target.collection.snapshot()
    }

    /// Every record in the backing store, bypassing the cache.
    pub fn all_direct(&self, options: &QueryOptions) -> CacheResult<Vec<T>> {
        self.target
            .store
            .read_all(options)
            .map_err(|e| self.target.store_failed(Operation::Read, false, e))
    }

    pub fn matching(&self, predicate: impl Into<Predicate<T>>) -> CacheResult<Vec<T>> {
        self.matching_with(predicate, &QueryOptions::none())
    }

    /// Cached records matching `predicate`, materialized.
    pub fn matching_with(
        &self,
        predicate: impl Into<Predicate<T>>,
        options: &QueryOptions,
    ) -> CacheResult<Vec<T>> {
        match predicate.into() {
            Predicate::Structured(query) => {
                let mut results = self.target.collection.retrieve(&query, options);
                let found: Vec<T> = results.by_ref().collect();
                results.close();
                Ok(found)
            }
            native => Err(self.target.unsupported(&native)),
        }
    }

    pub fn from_keys(&self, keys: &[T::Key]) -> CacheResult<Vec<T>> {
        self.from_keys_with(keys, &QueryOptions::none())
    }

    pub fn from_keys_with(&self, _keys: &[T::Key], _options: &QueryOptions) -> CacheResult<Vec<T>> {
        Err(CacheError::UnsupportedOperation("read by key"))
    }
}

// ---------------------------------------------------------------
// Update
// ---------------------------------------------------------------

pub struct UpdateOperation<T: Record> {
    target: Target<T>,
}

impl<T: Record> UpdateOperation<T> {
    pub fn from(&self, records: impl IntoIterator<Item = T>) -> CacheResult<&Self> {
        self.from_with(records, &QueryOptions::none())
    }

    /// Replace the cached versions of `records` (matched by key), then
    /// update them in the store.
    pub fn from_with(
        &self,
        records: impl IntoIterator<Item = T>,
        options: &QueryOptions,
    ) -> CacheResult<&Self> {
        let batch: Vec<T> = records.into_iter().collect();
        let target = &self.target;
        target
            .collection
            .replace(&batch, &batch, options)
            .map_err(|e| target.rejected(Operation::Update, e))?;
        target
            .store
            .update(&batch, options)
            .map_err(|e| target.store_failed(Operation::Update, !batch.is_empty(), e))?;
        debug!(record_type = %target.record_type, records = batch.len(), "updated");
        Ok(self)
    }
}

// ---------------------------------------------------------------
// Delete
// ---------------------------------------------------------------

pub struct DeleteOperation<T: Record> {
    target: Target<T>,
}

impl<T: Record> DeleteOperation<T> {
    pub fn from(&self, records: impl IntoIterator<Item = T>) -> CacheResult<&Self> {
        self.from_with(records, &QueryOptions::none())
    }

    /// Remove `records` from the cache, then delete them from the store.
    pub fn from_with(
        &self,
        records: impl IntoIterator<Item = T>,
        options: &QueryOptions,
    ) -> CacheResult<&Self> {
        let batch: Vec<T> = records.into_iter().collect();
        let target = &self.target;
        let removed = target.collection.remove_all(&batch);
        target
            .store
            .delete(&batch, options)
            .map_err(|e| target.store_failed(Operation::Delete, removed > 0, e))?;
        debug!(record_type = %target.record_type, records = batch.len(), removed, "deleted");
        Ok(self)
    }

    pub fn matching(&self, predicate: impl Into<Predicate<T>>) -> CacheResult<&Self> {
        self.matching_with(predicate, &QueryOptions::none())
    }

    /// Remove the cached records matching `predicate`, then delete exactly
    /// those records from the store.
    ///
    /// The store never evaluates the predicate itself, so records it holds
    /// that are not cached are left alone.
    pub fn matching_with(
        &self,
        predicate: impl Into<Predicate<T>>,
        options: &QueryOptions,
    ) -> CacheResult<&Self> {
        let target = &self.target;
        let query = match predicate.into() {
            Predicate::Structured(query) => query,
            native => return Err(target.unsupported(&native)),
        };
        let resolved = target.collection.extract(&query);
        target
            .store
            .delete(&resolved, options)
            .map_err(|e| target.store_failed(Operation::Delete, !resolved.is_empty(), e))?;
        debug!(record_type = %target.record_type, %query, records = resolved.len(), "deleted matching");
        Ok(self)
    }
}
