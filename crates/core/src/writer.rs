//! Document emission for single blocks, ranges, and rewinds.
//!
//! [`IndexWriter`] is the cheap-to-clone bundle of everything a spawned
//! indexing task needs: the store, the node, the concrete index prefix
//! being written, and the shutdown token. The orchestrator hands copies to
//! backfill and per-block tasks so tip state stays with its single owner.

use crate::pipeline::BulkPipeline;
use aergo_index_store::{
    BlockDocument, Family, IntegerRange, NameDocument, Store, TxDocument,
};
use aergo_index_types::{Block, BlockKey, NodeClient};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub(crate) struct IndexWriter<S, C> {
    store: Arc<S>,
    node: Arc<C>,
    prefix: String,
    cancel: CancellationToken,
}

impl<S, C> Clone for IndexWriter<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            node: Arc::clone(&self.node),
            prefix: self.prefix.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<S: Store, C: NodeClient> IndexWriter<S, C> {
    pub(crate) const fn new(
        store: Arc<S>,
        node: Arc<C>,
        prefix: String,
        cancel: CancellationToken,
    ) -> Self {
        Self { store, node, prefix, cancel }
    }

    pub(crate) fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub(crate) fn node(&self) -> &Arc<C> {
        &self.node
    }

    pub(crate) fn prefix(&self) -> &str {
        &self.prefix
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn index(&self, family: Family) -> String {
        family.index_name(&self.prefix)
    }

    /// Index one block: a direct block-document insert plus tx and name
    /// pipelines when the block carries transactions.
    pub(crate) async fn index_block(&self, block: &Block) {
        let doc = BlockDocument::from_chain(block);
        if let Err(error) = self.store.insert(&doc, &self.index(Family::Block), false).await {
            warn!(%error, no = block.height(), "failed to index block");
            return;
        }

        if !block.body.txs.is_empty() {
            let txs = BulkPipeline::<TxDocument>::spawn(
                Arc::clone(&self.store),
                self.index(Family::Tx),
                self.cancel.clone(),
            );
            let names = BulkPipeline::<NameDocument>::spawn(
                Arc::clone(&self.store),
                self.index(Family::Name),
                self.cancel.clone(),
            );
            emit_txs(block, &txs, &names).await;
            // Dropping the name sender only after the tx walk guarantees
            // every name document for this block precedes the close.
            if let Err(error) = txs.finish().await {
                warn!(%error, no = block.height(), "tx pipeline aborted");
            }
            if let Err(error) = names.finish().await {
                warn!(%error, no = block.height(), "name pipeline aborted");
            }
        }

        info!(no = block.height(), txs = block.body.txs.len(), hash = %doc.id, "indexed block");
    }

    /// Index the inclusive height range `[from, to]`, fetching blocks from
    /// the node by key. Fetch failures are logged and skipped; the
    /// consistency sweeper picks them up later.
    pub(crate) async fn index_range(&self, from: u64, to: u64) {
        info!(from, to, count = 1 + to - from, "indexing missing blocks");

        let blocks = BulkPipeline::<BlockDocument>::spawn(
            Arc::clone(&self.store),
            self.index(Family::Block),
            self.cancel.clone(),
        );
        let txs = BulkPipeline::<TxDocument>::spawn(
            Arc::clone(&self.store),
            self.index(Family::Tx),
            self.cancel.clone(),
        );
        let names = BulkPipeline::<NameDocument>::spawn(
            Arc::clone(&self.store),
            self.index(Family::Name),
            self.cancel.clone(),
        );

        for height in from..=to {
            if self.cancel.is_cancelled() {
                break;
            }
            let block = match self.node.get_block(BlockKey::from_height(height)).await {
                Ok(block) => block,
                Err(error) => {
                    warn!(height, %error, "failed to get block");
                    continue;
                }
            };
            if !block.body.txs.is_empty() && !emit_txs(&block, &txs, &names).await {
                break;
            }
            if !blocks.send(BlockDocument::from_chain(&block)).await {
                break;
            }
        }

        // The block producer is done before any channel closes, so a late
        // tx or name document can never race a closed channel.
        for (family, result) in [
            (Family::Block, blocks.finish().await),
            (Family::Tx, txs.finish().await),
            (Family::Name, names.finish().await),
        ] {
            match result {
                Ok(written) => info!(%family, written, from, to, "bulk indexing complete"),
                Err(error) => warn!(%family, %error, from, to, "bulk indexing aborted"),
            }
        }
    }

    /// Delete all documents with block height in `[from, to]` across the
    /// three families.
    pub(crate) async fn delete_range(&self, from: u64, to: u64) {
        info!(from, to, count = 1 + to - from, "rolling back blocks");
        for family in Family::ALL {
            let range = IntegerRange::new(family.ordering_field(), from, to);
            match self.store.delete_range(&self.index(family), range).await {
                Ok(deleted) => info!(%family, deleted, "deleted documents"),
                Err(error) => warn!(%family, %error, "failed to delete documents"),
            }
        }
    }
}

/// Walk a block's transactions, emitting a tx document for every
/// transaction and a name document for every naming-governance call.
///
/// Returns `false` when a pipeline has gone away and emission should stop.
async fn emit_txs(
    block: &Block,
    txs: &BulkPipeline<TxDocument>,
    names: &BulkPipeline<NameDocument>,
) -> bool {
    for tx in &block.body.txs {
        if !txs.send(TxDocument::from_chain(tx, block)).await {
            return false;
        }
        if tx.is_name_tx() && !names.send(NameDocument::from_chain(tx, block.height())).await {
            return false;
        }
    }
    true
}
