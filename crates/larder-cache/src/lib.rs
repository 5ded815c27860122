//! Write-through, in-memory indexed cache.
//!
//! Larder keeps one indexed collection per record type, loaded from the
//! type's backing store on first use. Reads are answered from memory;
//! writes go to memory first and then through to the store.
//!
//! # Key Types
//!
//! - [`WriteThroughCache`] -- The CRUD entry point
//! - [`CollectionRegistry`] -- Lazy, per-type bootstrap under striped locks
//! - [`Cached`] / [`CollectionDescriptor`] -- Declarative provider and index metadata
//! - [`CacheConfig`] -- Lock striping and bootstrap settings
//!
//! # Design Rules
//!
//! 1. Each record type is loaded from its store at most once per process.
//! 2. The in-memory change is applied before the store is called; a store
//!    failure is reported, never rolled back.
//! 3. Delete-by-predicate forwards exactly the records removed from memory.
//! 4. A failing index is skipped; the collection works without it.

pub mod cache;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod lock;
pub mod registry;

#[cfg(test)]
mod testing;

pub use cache::{
    CreateOperation, DeleteOperation, ReadOperation, UpdateOperation, WriteThroughCache,
};
pub use config::{CacheConfig, ConfigError};
pub use descriptor::{
    Cached, CollectionDescriptor, DescriptorBuilder, DescriptorError, IndexDeclaration,
};
pub use error::{CacheError, CacheResult, Operation};
pub use lock::StripedLock;
pub use registry::{BootstrapReport, CollectionRegistry, SkippedIndex};

// Re-export the types callers need to declare and query records.
pub use larder_collection::{
    CollectionProvider, ConcurrentCollectionProvider, HashIndexFactory, IndexFactory,
    OrderedIndexFactory, UniqueIndexFactory,
};
pub use larder_store::{BackingStore, FileBackingStore, InMemoryBackingStore, StoreError};
pub use larder_types::{Attribute, Predicate, Query, QueryOptions, Record, RecordType, Value};
