//! Error types for the collection crate.

/// Errors that can occur when mutating a collection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollectionError {
    /// A unique index already maps this value to a different record.
    #[error("unique index on `{attribute}` already holds value {value}")]
    UniqueViolation { attribute: String, value: String },

    /// An insert-only write met a key that is already stored.
    #[error("a record with key {key} is already stored")]
    KeyExists { key: String },
}

/// Errors raised while attaching an index to a collection.
///
/// These are never fatal for the collection: the index is discarded and the
/// collection keeps working without it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexBuildError {
    /// An index of the same kind is already attached to the attribute.
    #[error("{kind} index on `{attribute}` is already attached")]
    Duplicate { attribute: String, kind: String },

    /// Existing records violate a constraint of the index.
    #[error("cannot build {kind} index on `{attribute}`: {source}")]
    Rejected {
        attribute: String,
        kind: String,
        #[source]
        source: CollectionError,
    },

    /// The index factory could not construct the index.
    #[error("{kind} index on `{attribute}` failed: {reason}")]
    Failed {
        attribute: String,
        kind: String,
        reason: String,
    },
}

/// A collection provider could not build a collection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("collection provider `{provider}` failed: {reason}")]
pub struct ProviderError {
    pub provider: String,
    pub reason: String,
}

/// Convenience alias for collection results.
pub type CollectionResult<T> = Result<T, CollectionError>;
