use larder_types::{QueryOptions, Record};

use crate::error::StoreResult;

/// Durable CRUD capability for one record type.
///
/// All implementations must satisfy these invariants:
/// - Calls are synchronous: a call returns only once the backend has
///   acknowledged or failed it.
/// - A failed batch call leaves the backend unchanged.
/// - Options are passed by the caller unmodified and may be ignored.
/// - The store never retries on its own; faults go back to the caller.
/// - `read_all` must not call back into a cache built over this store. A
///   cache invokes it while holding a non-reentrant bootstrap lock.
pub trait BackingStore<T: Record>: Send + Sync {
    /// Persist new records.
    fn create(&self, records: &[T], options: &QueryOptions) -> StoreResult<()>;

    /// Read every stored record.
    fn read_all(&self, options: &QueryOptions) -> StoreResult<Vec<T>>;

    /// Overwrite existing records, matched by key.
    fn update(&self, records: &[T], options: &QueryOptions) -> StoreResult<()>;

    /// Remove records, matched by key.
    fn delete(&self, records: &[T], options: &QueryOptions) -> StoreResult<()>;
}
