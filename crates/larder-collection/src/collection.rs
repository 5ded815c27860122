use std::fmt;

use larder_types::{Query, QueryOptions, Record};

use crate::error::{CollectionResult, IndexBuildError};
#[cfg(doc)]
use crate::error::CollectionError;
use crate::index::Index;

/// An in-memory, index-backed container for the records of one type.
///
/// Implementations must be safe for concurrent reads and writes without
/// external locking. Every mutation is keyed: the record stored under a key
/// is replaced or removed as a whole.
pub trait IndexedCollection<T: Record>: Send + Sync {
    /// Insert records, replacing any stored record with the same key.
    ///
    /// The batch is checked against every attached index first; on a
    /// violation nothing from the batch is applied.
    fn insert(&self, records: &[T]) -> CollectionResult<()>;

    /// Insert records whose keys are not stored yet.
    ///
    /// Fails with [`CollectionError::KeyExists`] if any key is already
    /// stored or repeats within the batch; nothing is applied then.
    fn insert_new(&self, records: &[T]) -> CollectionResult<()>;

    /// Remove the records whose keys match. Returns how many were present.
    fn remove_all(&self, records: &[T]) -> usize;

    /// Remove the records keyed like `old` and insert `new`, as one step.
    ///
    /// No reader observes the state between the removal and the insertion.
    /// On an index violation the collection is left as it was.
    fn replace(&self, old: &[T], new: &[T], options: &QueryOptions) -> CollectionResult<()>;

    /// Remove and return every record matching `query`, as one step.
    fn extract(&self, query: &Query<T>) -> Vec<T>;

    /// Remove every record. Attached indexes stay attached, emptied.
    fn clear(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The stored record for `key`.
    fn get(&self, key: &T::Key) -> Option<T>;

    /// A copy of every stored record.
    fn snapshot(&self) -> Vec<T>;

    /// Records matching `query`.
    ///
    /// The result set may hold resources (such as a read lock) until it is
    /// closed or dropped; callers should not mutate the collection while
    /// holding it.
    fn retrieve(&self, query: &Query<T>, options: &QueryOptions) -> ResultSet<'_, T>;

    /// Attach an index, populating it from the current contents.
    fn add_index(&self, index: Box<dyn Index<T>>) -> Result<(), IndexBuildError>;

    /// Labels of attached indexes, as `kind(attribute)`.
    fn index_names(&self) -> Vec<String>;
}

/// Closable result of [`IndexedCollection::retrieve`].
///
/// Yields owned records. Dropping it, or calling [`ResultSet::close`],
/// releases whatever the collection holds for the query.
pub struct ResultSet<'a, T> {
    records: Box<dyn Iterator<Item = T> + 'a>,
    len: usize,
}

impl<'a, T: 'a> ResultSet<'a, T> {
    pub fn new(records: Box<dyn Iterator<Item = T> + 'a>, len: usize) -> Self {
        Self { records, len }
    }

    /// An empty result set that holds nothing.
    pub fn empty() -> Self {
        Self {
            records: Box::new(std::iter::empty()),
            len: 0,
        }
    }

    /// Number of records not yet yielded.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Release the result set.
    pub fn close(self) {}
}

impl<T> Iterator for ResultSet<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let next = self.records.next();
        if next.is_some() {
            self.len = self.len.saturating_sub(1);
        }
        next
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<T: Record> fmt::Debug for dyn IndexedCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedCollection")
            .field("len", &self.len())
            .field("indexes", &self.index_names())
            .finish()
    }
}

impl<T> fmt::Debug for ResultSet<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSet").field("len", &self.len).finish()
    }
}
