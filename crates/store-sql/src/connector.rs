//! Relational store connector.

use crate::{SqlStore, SqlStoreError};
use aergo_index_store::Connect;

/// Connector for the relational store backend.
///
/// The database type is detected from the URL:
/// - `postgres://` / `postgresql://` use PostgreSQL
/// - `sqlite:` uses SQLite
///
/// # Example
///
/// ```ignore
/// use aergo_index_store_sql::SqlConnector;
///
/// let store = SqlConnector::new("postgres://localhost/aergo").connect().await?;
/// ```
#[derive(Debug, Clone)]
pub struct SqlConnector {
    url: String,
}

impl SqlConnector {
    /// Create a new connector for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Get a reference to the connection URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Connect for SqlConnector {
    type Store = SqlStore;
    type Error = SqlStoreError;

    async fn connect(&self) -> Result<Self::Store, Self::Error> {
        SqlStore::connect(&self.url).await
    }
}
