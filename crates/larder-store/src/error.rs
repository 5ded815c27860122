/// Errors from backing-store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A record with the same key already exists.
    #[error("record already exists: {0}")]
    Conflict(String),

    /// The record to update does not exist.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Storage backend is read-only.
    #[error("store is read-only")]
    ReadOnly,

    /// Backend could not be reached or refused service.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Any other backend-specific failure.
    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
