use std::fmt;

use thiserror::Error;

use larder_collection::CollectionError;
use larder_store::StoreError;
use larder_types::RecordType;

/// The CRUD operation a fault occurred in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        })
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    /// The record type cannot be cached: no backing store is registered, or
    /// its descriptor or collection provider is invalid.
    #[error("configuration error for {record_type}: {reason}")]
    Configuration {
        record_type: RecordType,
        reason: String,
    },

    /// The predicate representation cannot be evaluated in memory.
    #[error("{record_type}: {representation} cannot be evaluated in memory")]
    UnsupportedQuery {
        record_type: RecordType,
        representation: &'static str,
    },

    /// The backing store failed a call. When `cache_applied` is set, the
    /// in-memory change was kept and the cache now diverges from the store.
    #[error("backing store {operation} failed for {record_type} (cache applied: {cache_applied}): {source}")]
    BackingStore {
        record_type: RecordType,
        operation: Operation,
        cache_applied: bool,
        #[source]
        source: StoreError,
    },

    /// The in-memory collection rejected a write; the store was not called.
    #[error("collection rejected {operation} for {record_type}: {source}")]
    Collection {
        record_type: RecordType,
        operation: Operation,
        #[source]
        source: CollectionError,
    },

    #[error("operation not supported: {0}")]
    UnsupportedOperation(&'static str),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CacheError {
    pub(crate) fn configuration(record_type: RecordType, reason: impl fmt::Display) -> Self {
        CacheError::Configuration {
            record_type,
            reason: reason.to_string(),
        }
    }

    /// `true` when the cache holds a change the backing store rejected.
    pub fn is_divergent(&self) -> bool {
        matches!(
            self,
            CacheError::BackingStore {
                cache_applied: true,
                ..
            }
        )
    }

    /// The record type the error concerns, when there is one.
    pub fn record_type(&self) -> Option<RecordType> {
        match self {
            CacheError::Configuration { record_type, .. }
            | CacheError::UnsupportedQuery { record_type, .. }
            | CacheError::BackingStore { record_type, .. }
            | CacheError::Collection { record_type, .. } => Some(*record_type),
            CacheError::UnsupportedOperation(_) | CacheError::Internal(_) => None,
        }
    }
}

pub type CacheResult<T> = Result<T, CacheError>;
