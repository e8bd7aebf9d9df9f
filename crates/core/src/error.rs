//! Error types for the synchronization engine.

use aergo_index_store::StoreError;
use aergo_index_types::NodeError;

/// Result type alias for synchronizer operations.
pub type SyncResult<T, E = SyncError> = Result<T, E>;

/// Error type for synchronizer operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A node RPC operation failed.
    #[error(transparent)]
    Node(#[from] NodeError),
}
