//! The collection registry: one indexed collection per record type,
//! bootstrapped lazily from the backing store on first use.
//!
//! A type is ABSENT until its first request, then BOOTSTRAPPING while one
//! thread holds the type's lock stripe, then READY forever. Readers of a
//! READY type never take a stripe lock. A failed bootstrap publishes
//! nothing, so the next request retries.

use std::any::{Any, TypeId};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, info, warn};

use larder_collection::{IndexBuildError, IndexedCollection};
use larder_store::BackingStore;
use larder_types::{Record, RecordType};

use crate::config::CacheConfig;
use crate::descriptor::Cached;
use crate::error::{CacheError, CacheResult, Operation};
use crate::lock::StripedLock;

/// An index declaration that could not be attached during bootstrap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedIndex {
    /// `kind(attribute)`.
    pub index: String,
    pub error: IndexBuildError,
}

/// What a completed bootstrap did.
#[derive(Clone, Debug)]
pub struct BootstrapReport {
    pub record_type: RecordType,
    pub provider: String,
    pub records_loaded: usize,
    /// Attached indexes, as `kind(attribute)`.
    pub indexes: Vec<String>,
    pub skipped: Vec<SkippedIndex>,
    pub elapsed: Duration,
}

/// A READY entry with its record type erased.
trait InstalledCollection: Send + Sync {
    fn record_type(&self) -> RecordType;
    fn len(&self) -> usize;
    fn clear(&self);
    fn report(&self) -> &BootstrapReport;
    fn as_any(&self) -> &dyn Any;
}

struct Installed<T: Record> {
    collection: Arc<dyn IndexedCollection<T>>,
    report: BootstrapReport,
}

impl<T: Record> InstalledCollection for Installed<T> {
    fn record_type(&self) -> RecordType {
        self.report.record_type
    }

    fn len(&self) -> usize {
        self.collection.len()
    }

    fn clear(&self) {
        self.collection.clear();
    }

    fn report(&self) -> &BootstrapReport {
        &self.report
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Maps record types to their collections and backing stores.
pub struct CollectionRegistry {
    config: CacheConfig,
    locks: StripedLock,
    ready: DashMap<TypeId, Arc<dyn InstalledCollection>>,
    /// Each value is an `Arc<dyn BackingStore<T>>` for the keyed type.
    stores: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl CollectionRegistry {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            locks: StripedLock::new(config.lock_stripes),
            config,
            ready: DashMap::new(),
            stores: DashMap::new(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn locks(&self) -> &StripedLock {
        &self.locks
    }

    /// Bind the backing store for `T`, replacing any earlier binding.
    ///
    /// Rebinding a READY type affects later writes only; the collection is
    /// not reloaded.
    pub fn bind<T: Record>(&self, store: Arc<dyn BackingStore<T>>) {
        let rt = RecordType::of::<T>();
        let replaced = self.stores.insert(rt.id(), Arc::new(store)).is_some();
        debug!(record_type = %rt, replaced, "backing store bound");
    }

    /// The backing store bound for `T`.
    pub fn store<T: Record>(&self) -> CacheResult<Arc<dyn BackingStore<T>>> {
        let rt = RecordType::of::<T>();
        let entry = self
            .stores
            .get(&rt.id())
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| CacheError::configuration(rt, "no backing store registered"))?;
        entry
            .downcast_ref::<Arc<dyn BackingStore<T>>>()
            .cloned()
            .ok_or_else(|| CacheError::Internal(format!("store binding for {rt} has another type")))
    }

    /// The collection for `T`, bootstrapping it on first use.
    ///
    /// At most one bootstrap of `T` runs at a time; callers that arrive
    /// during it wait and then share its result.
    ///
    /// The bootstrap calls the store's `read_all` while holding `T`'s
    /// stripe. That call must not use this registry (or a cache over it):
    /// reaching `T` again, or a type sharing the stripe, deadlocks.
    pub fn get<T: Cached>(&self) -> CacheResult<Arc<dyn IndexedCollection<T>>> {
        let rt = RecordType::of::<T>();
        if let Some(collection) = self.ready_collection::<T>(rt)? {
            return Ok(collection);
        }

        let _stripe = self.locks.lock(&rt);
        if let Some(collection) = self.ready_collection::<T>(rt)? {
            return Ok(collection);
        }

        let installed = self.bootstrap::<T>(rt)?;
        let collection = Arc::clone(&installed.collection);
        self.ready.insert(rt.id(), Arc::new(installed));
        Ok(collection)
    }

    /// `true` once `T` has completed bootstrap.
    pub fn is_ready<T: 'static>(&self) -> bool {
        self.ready.contains_key(&TypeId::of::<T>())
    }

    /// The bootstrap report of a READY type.
    pub fn report<T: 'static>(&self) -> Option<BootstrapReport> {
        self.ready
            .get(&TypeId::of::<T>())
            .map(|e| e.value().report().clone())
    }

    /// Record types that are READY.
    pub fn installed_types(&self) -> Vec<RecordType> {
        self.ready.iter().map(|e| e.value().record_type()).collect()
    }

    /// Total records held across all READY collections.
    pub fn cached_records(&self) -> usize {
        self.ready.iter().map(|e| e.value().len()).sum()
    }

    /// Empty every READY collection. Types stay READY and are not reloaded.
    pub fn clear(&self) {
        let installed: Vec<Arc<dyn InstalledCollection>> =
            self.ready.iter().map(|e| Arc::clone(e.value())).collect();
        for entry in &installed {
            entry.clear();
        }
        info!(types = installed.len(), "cleared all cached collections");
    }

    fn ready_collection<T: Record>(
        &self,
        rt: RecordType,
    ) -> CacheResult<Option<Arc<dyn IndexedCollection<T>>>> {
        let Some(entry) = self.ready.get(&rt.id()).map(|e| Arc::clone(e.value())) else {
            return Ok(None);
        };
        entry
            .as_any()
            .downcast_ref::<Installed<T>>()
            .map(|installed| Some(Arc::clone(&installed.collection)))
            .ok_or_else(|| CacheError::Internal(format!("registry entry for {rt} has another type")))
    }

    /// Build, load and index the collection for `T`. Runs under `T`'s stripe.
    fn bootstrap<T: Cached>(&self, rt: RecordType) -> CacheResult<Installed<T>> {
        let started = Instant::now();
        let store = self.store::<T>()?;
        let descriptor = T::descriptor();
        let declarations = descriptor
            .resolve()
            .map_err(|e| CacheError::configuration(rt, e))?;
        let provider = descriptor.provider();
        info!(record_type = %rt, provider = provider.name(), "bootstrapping collection");

        let collection = provider
            .build()
            .map_err(|e| CacheError::configuration(rt, e))?;

        let records = store
            .read_all(&self.config.bootstrap_options)
            .map_err(|source| CacheError::BackingStore {
                record_type: rt,
                operation: Operation::Read,
                cache_applied: false,
                source,
            })?;
        collection
            .insert(&records)
            .map_err(|source| CacheError::Collection {
                record_type: rt,
                operation: Operation::Read,
                source,
            })?;
        debug!(record_type = %rt, records = records.len(), "loaded records from backing store");

        let mut indexes = Vec::with_capacity(declarations.len());
        let mut skipped = Vec::new();
        for decl in &declarations {
            let attached = decl
                .factory()
                .build(decl.attribute())
                .and_then(|index| collection.add_index(index));
            match attached {
                Ok(()) => indexes.push(decl.label()),
                Err(error) => {
                    warn!(record_type = %rt, index = %decl.label(), %error, "index skipped");
                    skipped.push(SkippedIndex {
                        index: decl.label(),
                        error,
                    });
                }
            }
        }

        let elapsed = started.elapsed();
        if self
            .config
            .slow_bootstrap_threshold()
            .is_some_and(|threshold| elapsed > threshold)
        {
            warn!(record_type = %rt, elapsed_ms = elapsed.as_millis() as u64, "slow bootstrap");
        }
        info!(
            record_type = %rt,
            records = records.len(),
            indexes = indexes.len(),
            skipped = skipped.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "collection ready"
        );

        Ok(Installed {
            report: BootstrapReport {
                record_type: rt,
                provider: provider.name().to_string(),
                records_loaded: records.len(),
                indexes,
                skipped,
                elapsed,
            },
            collection,
        })
    }
}

impl Default for CollectionRegistry {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl std::fmt::Debug for CollectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionRegistry")
            .field("locks", &self.locks)
            .field("ready", &self.ready.len())
            .field("stores", &self.stores.len())
            .finish()
    }
}
