//! Generic bulk-write pipeline.
//!
//! A pipeline is one writer task consuming a bounded channel of typed
//! documents, batching them to the family's flush size, and flushing each
//! batch through the store. The channel isolates producers from the
//! writer's rate; channel closure is the completion signal, so a producer
//! finishes a pipeline simply by dropping its sender.

use aergo_index_store::{Document, Store, StoreError, StoreResult};
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;

/// A running bulk-write pipeline for one document family.
///
/// Send documents with [`send`](Self::send); call [`finish`](Self::finish)
/// once the producer is done to close the channel, drain the writer, and
/// collect the cumulative affected count. A flush error aborts the writer;
/// cancellation flushes the current partial batch and exits.
#[derive(Debug)]
pub struct BulkPipeline<D: Document> {
    sender: mpsc::Sender<D>,
    writer: JoinHandle<StoreResult<u64>>,
}

impl<D: Document> BulkPipeline<D> {
    /// Spawn the writer task for `index` and return the pipeline handle.
    pub fn spawn<S: Store>(store: Arc<S>, index: String, cancel: CancellationToken) -> Self {
        let (sender, receiver) = mpsc::channel(D::FAMILY.channel_capacity());
        let writer = tokio::spawn(run_writer(store, receiver, index, cancel));
        Self { sender, writer }
    }

    /// Feed one document to the writer.
    ///
    /// Returns `false` when the writer has already aborted; producers should
    /// stop emitting in that case.
    pub async fn send(&self, doc: D) -> bool {
        self.sender.send(doc).await.is_ok()
    }

    /// Close the channel and wait for the writer to drain.
    pub async fn finish(self) -> StoreResult<u64> {
        drop(self.sender);
        self.writer.await.map_err(StoreError::backend)?
    }
}

async fn run_writer<S: Store, D: Document>(
    store: Arc<S>,
    mut receiver: mpsc::Receiver<D>,
    index: String,
    cancel: CancellationToken,
) -> StoreResult<u64> {
    let batch_size = D::FAMILY.batch_size();
    let upsert = D::FAMILY.upsert();
    let mut batch: Vec<D> = Vec::new();
    let mut total = 0u64;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = receiver.recv() => match received {
                Some(doc) => {
                    batch.push(doc);
                    if batch.len() >= batch_size {
                        total += store.insert_batch(&batch, &index, upsert).await?;
                        batch.clear();
                    }
                }
                None => break,
            }
        }
    }

    // Final partial batch, flushed on close and on cancellation alike.
    if !batch.is_empty() {
        total += store.insert_batch(&batch, &index, upsert).await?;
    }
    Ok(total)
}
