//! Node RPC client abstraction.
//!
//! The transport (gRPC, HTTP, in-process) is a deployment detail; the
//! synchronizer is written against [`NodeClient`] only. The contract is
//! narrow: an unbounded stream of newly produced blocks, random access by
//! [`BlockKey`], and the chain status.

use crate::{Block, BlockKey};
use std::future::Future;

/// Result type alias for node operations.
pub type NodeResult<T, E = NodeError> = Result<T, E>;

/// Error type for node RPC operations.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// Transport-level failure (connection refused, broken stream, ...).
    #[error("transport error: {0}")]
    Transport(#[from] Box<dyn core::error::Error + Send + Sync + 'static>),

    /// The node does not know the requested block.
    #[error("block not found at height {0}")]
    BlockNotFound(u64),

    /// The node returned a response the client could not interpret.
    #[error("malformed node response: {0}")]
    Malformed(String),
}

impl NodeError {
    /// Create a transport error from any error type.
    pub fn transport<E>(error: E) -> Self
    where
        E: core::error::Error + Send + Sync + 'static,
    {
        Self::Transport(Box::new(error))
    }
}

/// Chain status as reported by the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainStatus {
    /// Height of the node's current best block.
    pub best_height: u64,
}

/// A live stream of newly produced blocks.
///
/// `recv` resolves with `Ok(None)` when the node closes the stream cleanly;
/// any error means the stream is dead and must be reopened.
pub trait BlockStream: Send {
    /// Receive the next block from the stream.
    fn recv(&mut self) -> impl Future<Output = NodeResult<Option<Block>>> + Send;
}

/// Client for the node RPC surface the indexer depends on.
pub trait NodeClient: Send + Sync + 'static {
    /// The block stream type produced by [`NodeClient::stream_blocks`].
    type Stream: BlockStream + 'static;

    /// Open a stream of newly produced blocks.
    fn stream_blocks(&self) -> impl Future<Output = NodeResult<Self::Stream>> + Send;

    /// Fetch one block by its little-endian height key.
    fn get_block(&self, key: BlockKey) -> impl Future<Output = NodeResult<Block>> + Send;

    /// Query the chain status.
    fn status(&self) -> impl Future<Output = NodeResult<ChainStatus>> + Send;
}
