//! Search-engine store connector.

use crate::{EsStore, EsStoreError};
use aergo_index_store::Connect;

/// Connector for the search-engine store backend.
#[derive(Debug, Clone)]
pub struct EsConnector {
    url: String,
}

impl EsConnector {
    /// Create a new connector for the engine at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Get a reference to the engine URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Connect for EsConnector {
    type Store = EsStore;
    type Error = EsStoreError;

    async fn connect(&self) -> Result<Self::Store, Self::Error> {
        EsStore::connect(&self.url).await
    }
}
