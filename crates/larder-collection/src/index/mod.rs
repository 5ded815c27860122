//! Index kinds that can be attached to a collection.
//!
//! An index maintains a view of one [`Attribute`] and answers the leaf
//! queries it supports with a set of record keys. The set of kinds is open:
//! implement [`Index`] and [`IndexFactory`] to add one.

mod hash;
mod ordered;
mod unique;

use std::collections::HashSet;
use std::sync::Arc;

use larder_types::{Attribute, Query, Record};

use crate::error::{CollectionResult, IndexBuildError};

pub use hash::{HashIndex, HashIndexFactory};
pub use ordered::{OrderedIndex, OrderedIndexFactory};
pub use unique::{UniqueIndex, UniqueIndexFactory};

/// An index over one attribute of a record type.
///
/// The owning collection calls `insert`/`remove` for every record change
/// while holding its write lock, and `lookup` while holding its read lock.
pub trait Index<T: Record>: Send + Sync {
    /// The indexed attribute.
    fn attribute(&self) -> &Attribute<T>;

    /// Kind label, e.g. `"hash"`.
    fn kind(&self) -> &str;

    /// Reject a record the index cannot accept.
    ///
    /// Called before `insert`; the collection applies nothing when any
    /// attached index rejects the record.
    fn check(&self, _key: &T::Key, _record: &T) -> CollectionResult<()> {
        Ok(())
    }

    fn insert(&mut self, key: &T::Key, record: &T);

    fn remove(&mut self, key: &T::Key, record: &T);

    fn clear(&mut self);

    /// Keys of the records matching a leaf query on this index's attribute.
    ///
    /// Returns `None` when the index cannot answer this query shape; the
    /// collection then falls back to a scan.
    fn lookup(&self, query: &Query<T>) -> Option<HashSet<T::Key>>;
}

/// Builds an [`Index`] of one kind for a given attribute.
pub trait IndexFactory<T: Record>: Send + Sync {
    fn kind(&self) -> &str;

    fn build(&self, attribute: &Attribute<T>) -> Result<Box<dyn Index<T>>, IndexBuildError>;
}

/// The built-in factory for `kind` (`"hash"`, `"ordered"` or `"unique"`).
pub fn builtin_factory<T: Record>(kind: &str) -> Option<Arc<dyn IndexFactory<T>>> {
    match kind {
        "hash" => Some(Arc::new(HashIndexFactory)),
        "ordered" => Some(Arc::new(OrderedIndexFactory)),
        "unique" => Some(Arc::new(UniqueIndexFactory)),
        _ => None,
    }
}

/// `true` if `query` is a leaf on the attribute named `name`.
pub(crate) fn targets<T>(query: &Query<T>, name: &str) -> bool {
    query.attribute().is_some_and(|a| a.name() == name)
}
