//! Error types for the search-engine store backend.

/// Errors that can occur in search-engine store operations.
#[derive(Debug, thiserror::Error)]
pub enum EsStoreError {
    /// An HTTP transport error occurred.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The engine rejected a request.
    #[error("api error (status {status}): {reason}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error body, truncated.
        reason: String,
    },

    /// A response body did not have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<EsStoreError> for aergo_index_store::StoreError {
    fn from(error: EsStoreError) -> Self {
        Self::Backend(Box::new(error))
    }
}
