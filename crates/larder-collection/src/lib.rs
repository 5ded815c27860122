//! In-memory indexed collections for Larder.
//!
//! A collection holds the records of one type and answers structured
//! queries, using attached indexes where they apply and scanning otherwise.
//!
//! # Key Types
//!
//! - [`IndexedCollection`] -- The collection capability the cache populates and queries
//! - [`ConcurrentIndexedCollection`] -- Default implementation (one `RwLock`)
//! - [`ResultSet`] -- Closable query result
//! - [`Index`] / [`IndexFactory`] -- Open set of index kinds
//! - [`CollectionProvider`] -- Builds empty collections for a record type

pub mod collection;
pub mod concurrent;
pub mod error;
pub mod index;
pub mod provider;

#[cfg(test)]
mod testing;

pub use collection::{IndexedCollection, ResultSet};
pub use concurrent::ConcurrentIndexedCollection;
pub use error::{CollectionError, CollectionResult, IndexBuildError, ProviderError};
pub use index::{
    builtin_factory, HashIndex, HashIndexFactory, Index, IndexFactory, OrderedIndex, OrderedIndexFactory,
    UniqueIndex, UniqueIndexFactory,
};
pub use provider::{CollectionProvider, ConcurrentCollectionProvider};
