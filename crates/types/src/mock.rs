//! Scripted in-memory node for testing the synchronizer.
//!
//! [`MockNode`] holds a height-keyed block map for random access and fans
//! newly pushed blocks out to every open stream. Streams can be ended to
//! exercise the reconnect path, and individual heights can be poisoned to
//! exercise fetch-failure skipping during backfill.

use crate::{
    Block, BlockBody, BlockHeader, BlockKey, BlockStream, ChainStatus, NodeClient, NodeError,
    NodeResult, Tx, TxBody, TxType, NAME_CONTRACT,
};
use std::{
    collections::{BTreeMap, HashSet},
    sync::{Arc, Mutex},
};
use tokio::sync::mpsc;

enum StreamEvent {
    Block(Block),
    End,
}

#[derive(Default)]
struct Inner {
    blocks: BTreeMap<u64, Block>,
    streams: Vec<mpsc::UnboundedSender<StreamEvent>>,
    failing: HashSet<u64>,
}

/// Scripted node backed by an in-memory block map.
#[derive(Clone, Default)]
pub struct MockNode {
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for MockNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockNode").finish_non_exhaustive()
    }
}

impl MockNode {
    /// Create an empty mock node.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a block for random access without streaming it.
    pub fn put_block(&self, block: Block) {
        let mut inner = self.inner.lock().unwrap();
        inner.blocks.insert(block.height(), block);
    }

    /// Register a block and deliver it on every open stream.
    pub fn push_block(&self, block: Block) {
        let mut inner = self.inner.lock().unwrap();
        inner.blocks.insert(block.height(), block.clone());
        inner.streams.retain(|tx| tx.send(StreamEvent::Block(block.clone())).is_ok());
    }

    /// Close every open stream cleanly, as a node restart would.
    pub fn end_streams(&self) {
        let mut inner = self.inner.lock().unwrap();
        for tx in inner.streams.drain(..) {
            let _ = tx.send(StreamEvent::End);
        }
    }

    /// Make `get_block` fail for the given height.
    pub fn fail_height(&self, height: u64) {
        self.inner.lock().unwrap().failing.insert(height);
    }
}

impl NodeClient for MockNode {
    type Stream = MockStream;

    async fn stream_blocks(&self) -> NodeResult<Self::Stream> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().unwrap().streams.push(tx);
        Ok(MockStream { rx })
    }

    async fn get_block(&self, key: BlockKey) -> NodeResult<Block> {
        let height = key.height();
        let inner = self.inner.lock().unwrap();
        if inner.failing.contains(&height) {
            return Err(NodeError::Malformed(format!("scripted failure at height {height}")));
        }
        inner.blocks.get(&height).cloned().ok_or(NodeError::BlockNotFound(height))
    }

    async fn status(&self) -> NodeResult<ChainStatus> {
        let inner = self.inner.lock().unwrap();
        Ok(ChainStatus { best_height: inner.blocks.keys().next_back().copied().unwrap_or(0) })
    }
}

/// Stream handle vended by [`MockNode::stream_blocks`].
#[derive(Debug)]
pub struct MockStream {
    rx: mpsc::UnboundedReceiver<StreamEvent>,
}

impl BlockStream for MockStream {
    async fn recv(&mut self) -> NodeResult<Option<Block>> {
        match self.rx.recv().await {
            Some(StreamEvent::Block(block)) => Ok(Some(block)),
            Some(StreamEvent::End) | None => Ok(None),
        }
    }
}

/// Deterministic hash for test fixtures: tag byte plus the height.
pub fn test_hash(tag: u8, seed: u64) -> Vec<u8> {
    let mut hash = vec![tag; 24];
    hash.extend_from_slice(&seed.to_be_bytes());
    hash
}

/// Build a block at `height` carrying the given transactions.
pub fn test_block(height: u64, txs: Vec<Tx>) -> Block {
    Block {
        hash: test_hash(0xb0, height),
        header: BlockHeader {
            block_no: height,
            timestamp: 1_600_000_000_000_000_000 + height as i64 * 1_000_000_000,
            prev_hash: if height == 0 { vec![] } else { test_hash(0xb0, height - 1) },
        },
        body: BlockBody { txs },
    }
}

/// Build a block at `height` with a hash distinct from [`test_block`]'s,
/// for exercising same-height forks.
pub fn test_fork_block(height: u64, txs: Vec<Tx>) -> Block {
    let mut block = test_block(height, txs);
    block.hash = test_hash(0xf0, height);
    block
}

/// Build a plain transfer transaction.
pub fn test_tx(seed: u64) -> Tx {
    Tx {
        hash: test_hash(0x71, seed),
        body: TxBody {
            tx_type: TxType::Normal,
            account: test_hash(0xac, seed),
            recipient: test_hash(0xad, seed),
            amount: 1_000_000_000_000_000_000,
            payload: vec![],
            nonce: seed,
        },
    }
}

/// Build a governance transaction that registers `name`.
pub fn test_name_tx(seed: u64, name: &str) -> Tx {
    Tx {
        hash: test_hash(0x72, seed),
        body: TxBody {
            tx_type: TxType::Governance,
            account: test_hash(0xac, seed),
            recipient: NAME_CONTRACT.to_vec(),
            amount: 0,
            payload: format!(r#"{{"Name":"v1createName","Args":["{name}"]}}"#).into_bytes(),
            nonce: seed,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stream_delivers_pushed_blocks() {
        let node = MockNode::new();
        let mut stream = node.stream_blocks().await.unwrap();

        node.push_block(test_block(0, vec![]));
        let block = stream.recv().await.unwrap().unwrap();
        assert_eq!(block.height(), 0);

        node.end_streams();
        assert!(stream.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn random_access_and_status() {
        let node = MockNode::new();
        node.put_block(test_block(3, vec![]));
        node.put_block(test_block(7, vec![]));

        assert_eq!(node.status().await.unwrap().best_height, 7);
        let block = node.get_block(BlockKey::from_height(3)).await.unwrap();
        assert_eq!(block.height(), 3);
        assert!(matches!(
            node.get_block(BlockKey::from_height(4)).await,
            Err(NodeError::BlockNotFound(4))
        ));

        node.fail_height(7);
        assert!(node.get_block(BlockKey::from_height(7)).await.is_err());
    }
}
