//! Error types for the relational store backend.

/// Errors that can occur in relational store operations.
#[derive(Debug, thiserror::Error)]
pub enum SqlStoreError {
    /// A sqlx database error occurred.
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// The connection URL resolved to a database this backend does not
    /// support.
    #[error("unsupported database backend: {0}")]
    UnsupportedBackend(String),

    /// A view definition could not be parsed back to its source table.
    #[error("could not extract source table from view definition: {0}")]
    ViewParse(String),
}

impl From<SqlStoreError> for aergo_index_store::StoreError {
    fn from(error: SqlStoreError) -> Self {
        Self::Backend(Box::new(error))
    }
}
