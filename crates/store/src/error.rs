//! Error types for store operations.

/// Result type alias for store operations.
pub type StoreResult<T, E = StoreError> = Result<T, E>;

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An error occurred in the storage backend.
    #[error("backend error: {0}")]
    Backend(#[from] Box<dyn core::error::Error + Send + Sync + 'static>),

    /// The requested index does not exist.
    #[error("unknown index: {0}")]
    UnknownIndex(String),

    /// A document could not be encoded or decoded.
    #[error("malformed document: {0}")]
    Malformed(String),
}

impl StoreError {
    /// Create a new backend error from any error type.
    pub fn backend<E>(error: E) -> Self
    where
        E: core::error::Error + Send + Sync + 'static,
    {
        Self::Backend(Box::new(error))
    }
}
