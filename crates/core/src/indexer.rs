//! The sync orchestrator.
//!
//! [`Indexer`] owns the tip state and the stream loop. Everything that
//! mutates the tip runs on the loop task (single-writer); backfills,
//! per-block indexing, and the sweeper run as tracked background tasks that
//! receive [`IndexWriter`](crate::writer::IndexWriter) copies, and report
//! catch-up completion back through a command channel so alias cutover also
//! happens on the loop task.

use crate::{
    config::{generate_index_prefix, SyncConfig, RECONNECT_DELAY},
    sweeper,
    tracker::{SyncAction, TipTracker},
    writer::IndexWriter,
    SyncResult,
};
use aergo_index_store::{Family, QueryParams, Store};
use aergo_index_types::{Block, BlockStream, NodeClient};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, error, info, instrument, warn};

/// Lifecycle state of the synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Startup: indices, aliases, and tip state are being prepared.
    Booting,
    /// The stream loop is live.
    Running,
    /// The stream dropped; waiting out the backoff before reopening.
    Restarting,
    /// The synchronizer has shut down.
    Stopped,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Booting => "booting",
            Self::Running => "running",
            Self::Restarting => "restarting",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Handle to a started [`Indexer`].
///
/// Cloneable; dropping it does not stop the synchronizer.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    cancel: CancellationToken,
    state: watch::Receiver<SyncState>,
    tasks: TaskTracker,
}

impl SyncHandle {
    /// Current lifecycle state.
    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// Request shutdown: the stream closes and the loop exits. In-flight
    /// pipelines drain naturally; every write is idempotent on restart.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Wait until the synchronizer reaches [`SyncState::Stopped`].
    pub async fn wait_stopped(&mut self) {
        while *self.state.borrow_and_update() != SyncState::Stopped {
            if self.state.changed().await.is_err() {
                return;
            }
        }
    }

    /// Wait for all tracked background tasks (backfills, per-block
    /// indexing, the sweeper) to finish. Only meaningful after
    /// [`wait_stopped`](Self::wait_stopped).
    pub async fn drain(&self) {
        self.tasks.wait().await;
    }
}

/// The synchronization engine.
///
/// Generic over the store backend and the node transport. Construct with
/// [`new`](Self::new), then call [`start`](Self::start) to run startup and
/// launch the stream loop.
pub struct Indexer<S, C> {
    store: Arc<S>,
    node: Arc<C>,
    cfg: SyncConfig,
    index_prefix: String,
    reindexing: bool,
    exit_on_complete: bool,
    tracker: TipTracker,
    state: watch::Sender<SyncState>,
    cancel: CancellationToken,
    tasks: TaskTracker,
    sync_done_tx: mpsc::Sender<()>,
    sync_done_rx: mpsc::Receiver<()>,
}

impl<S, C> std::fmt::Debug for Indexer<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Indexer")
            .field("index_prefix", &self.index_prefix)
            .field("reindexing", &self.reindexing)
            .finish_non_exhaustive()
    }
}

impl<S: Store, C: NodeClient> Indexer<S, C> {
    /// Create a new synchronizer over `store` and `node`.
    pub fn new(store: S, node: C, cfg: SyncConfig) -> Self {
        let (state, _) = watch::channel(SyncState::Booting);
        let (sync_done_tx, sync_done_rx) = mpsc::channel(4);
        let index_prefix = generate_index_prefix(&cfg.alias_prefix, Utc::now());
        Self {
            store: Arc::new(store),
            node: Arc::new(node),
            reindexing: cfg.reindex,
            exit_on_complete: cfg.exit_on_complete,
            cfg,
            index_prefix,
            tracker: TipTracker::new(),
            state,
            cancel: CancellationToken::new(),
            tasks: TaskTracker::new(),
            sync_done_tx,
            sync_done_rx,
        }
    }

    /// Run startup and launch the stream loop.
    ///
    /// Startup prepares one concrete index per family (adopting an existing
    /// alias target unless reindexing), seeds the tip from the store,
    /// launches the consistency sweeper, and opens the block stream. Only a
    /// failure to open the initial stream is returned as an error; index
    /// and alias trouble is logged and startup proceeds.
    pub async fn start(mut self) -> SyncResult<SyncHandle> {
        if self.reindexing {
            warn!("reindexing: syncing from scratch, swapping aliases when caught up");
        }

        for family in Family::ALL {
            self.prepare_index(family).await;
        }
        self.seed_tip().await;
        info!(height = self.tracker.tip().height, "started indexer");

        let writer = self.writer();
        self.tasks.spawn(sweeper::run(writer, self.sync_done_tx.clone()));

        if self.reindexing {
            // A chain booting from genesis has nothing to catch up on.
            match self.node.status().await {
                Ok(status) if status.best_height == 0 => self.on_sync_complete().await,
                Ok(_) => {}
                Err(error) => warn!(%error, "failed to query node block height"),
            }
        }

        let stream = self.node.stream_blocks().await?;
        self.state.send_replace(SyncState::Running);

        let handle = SyncHandle {
            cancel: self.cancel.clone(),
            state: self.state.subscribe(),
            tasks: self.tasks.clone(),
        };
        tokio::spawn(self.run(stream));
        Ok(handle)
    }

    /// Prepare the concrete index for one family.
    ///
    /// Alias discovery runs strictly before index creation so writes can
    /// never race into a fresh index while a live one exists.
    async fn prepare_index(&mut self, family: Family) {
        let alias = family.index_name(&self.cfg.alias_prefix);
        if !self.cfg.reindex {
            match self.store.existing_index_prefix(&alias, family).await {
                Ok(Some(prefix)) => {
                    info!(%alias, index_prefix = %prefix, "alias found");
                    self.index_prefix = prefix;
                    return;
                }
                Ok(None) => {}
                Err(error) => warn!(%error, %alias, "error when checking for alias"),
            }
        }

        let index = family.index_name(&self.index_prefix);
        match self.store.create_index(&index, family).await {
            Ok(()) => info!(%index, "created index"),
            Err(error) => warn!(%error, %index, "error when creating index"),
        }
        if !self.cfg.reindex {
            match self.store.update_alias(&alias, &index).await {
                Ok(()) => info!(%alias, %index, "updated alias"),
                Err(error) => warn!(%error, %alias, %index, "error when updating alias"),
            }
        }
    }

    /// Seed tip state from the best block behind the reader-facing alias.
    ///
    /// Failure leaves the tip at `(0, "")`; the next streamed block is then
    /// treated as initial sync.
    async fn seed_tip(&mut self) {
        let alias = Family::Block.index_name(&self.cfg.alias_prefix);
        let params = QueryParams::new(alias, Family::Block.ordering_field());
        match self.store.select_one(&params).await {
            Ok(Some(doc)) => {
                let height = doc.get("no").and_then(Value::as_u64);
                let hash = doc.get("id").and_then(Value::as_str);
                if let (Some(height), Some(hash)) = (height, hash) {
                    self.tracker.seed(height, hash);
                }
            }
            Ok(None) => {}
            Err(error) => debug!(%error, "best block not found in store"),
        }
    }

    fn writer(&self) -> IndexWriter<S, C> {
        IndexWriter::new(
            Arc::clone(&self.store),
            Arc::clone(&self.node),
            self.index_prefix.clone(),
            self.cancel.clone(),
        )
    }

    /// The stream loop. Exits only on shutdown.
    #[instrument(skip_all, name = "sync_loop")]
    async fn run(mut self, mut stream: C::Stream) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = self.sync_done_rx.recv() => self.on_sync_complete().await,
                received = stream.recv() => match received {
                    Ok(Some(block)) => self.sync_block(block).await,
                    Ok(None) => {
                        warn!("stream ended");
                        if !self.reconnect(&mut stream).await {
                            break;
                        }
                    }
                    Err(error) => {
                        warn!(%error, "failed to receive a block");
                        if !self.reconnect(&mut stream).await {
                            break;
                        }
                    }
                }
            }
        }
        self.state.send_replace(SyncState::Stopped);
        self.tasks.close();
        debug!("sync loop exited");
    }

    /// Classify one streamed block and dispatch the repair action.
    async fn sync_block(&mut self, block: Block) {
        let new_height = block.height();
        let new_hash = block.hash_b58();
        let action = self.tracker.observe(new_height, &new_hash);

        match action {
            SyncAction::Index => {}
            SyncAction::Backfill { from, to } => {
                let writer = self.writer();
                let done = self.sync_done_tx.clone();
                self.tasks.spawn(async move {
                    writer.index_range(from, to).await;
                    let _ = done.send(()).await;
                });
            }
            // Deletions must finish before the new block's insert is
            // dispatched, otherwise the insert could be erased.
            SyncAction::Rewind { from, to } => self.writer().delete_range(from, to).await,
        }

        let writer = self.writer();
        self.tasks.spawn(async move { writer.index_block(&block).await });
    }

    /// Catch-up completion: cut the aliases over when reindexing.
    ///
    /// Each alias rebind is atomic, so readers observe a monotonic
    /// progression of the three aliases and never a half-written index.
    async fn on_sync_complete(&mut self) {
        info!("initial sync complete");
        if !self.reindexing {
            return;
        }
        self.reindexing = false;
        for family in Family::ALL {
            let alias = family.index_name(&self.cfg.alias_prefix);
            let index = family.index_name(&self.index_prefix);
            match self.store.update_alias(&alias, &index).await {
                Ok(()) => info!(%alias, %index, "updated alias"),
                Err(error) => warn!(%error, %alias, %index, "error when updating alias"),
            }
        }
        if self.exit_on_complete {
            self.cancel.cancel();
        }
    }

    /// Reconnect the stream after a fixed backoff, forever.
    ///
    /// Tip state is untouched; the first block after reconnect is
    /// re-classified and any missed interval is repaired as a gap. Returns
    /// `false` when shutdown interrupts the wait.
    async fn reconnect(&mut self, stream: &mut C::Stream) -> bool {
        loop {
            self.state.send_replace(SyncState::Restarting);
            info!(delay = ?RECONNECT_DELAY, "restarting stream");
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                _ = tokio::time::sleep(RECONNECT_DELAY) => {}
            }
            match self.node.stream_blocks().await {
                Ok(reopened) => {
                    *stream = reopened;
                    self.state.send_replace(SyncState::Running);
                    return true;
                }
                Err(error) => error!(%error, "failed to restart stream"),
            }
        }
    }
}
