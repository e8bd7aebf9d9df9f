//! Synchronization engine for the aergo metadata indexer.
//!
//! Keeps a document store continuously synchronized with the live chain
//! tip, repairing gaps and reorganizations as the stream reveals them:
//!
//! - [`TipTracker`] classifies every streamed block against the last
//!   acknowledged tip and picks the repair action
//! - [`BulkPipeline`] turns a channel of typed documents into batched
//!   store writes with backpressure
//! - [`Indexer`] owns the lifecycle: startup and alias discovery, the
//!   stream loop, reconnection, reindex cutover, and shutdown
//! - the consistency sweeper re-examines the store against the node in the
//!   background and backfills anything the stream silently missed
//!
//! The engine is generic over the store backend and the node transport; see
//! `aergo-index-store` and `aergo-index-types` for those contracts.

#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    clippy::missing_const_for_fn,
    rustdoc::all
)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![deny(unused_must_use, rust_2018_idioms)]

mod error;
pub use error::{SyncError, SyncResult};

mod config;
pub use config::{generate_index_prefix, SyncConfig, RECONNECT_DELAY};

mod tracker;
pub use tracker::{SyncAction, Tip, TipTracker};

mod pipeline;
pub use pipeline::BulkPipeline;

mod writer;

mod sweeper;

mod indexer;
pub use indexer::{Indexer, SyncHandle, SyncState};
