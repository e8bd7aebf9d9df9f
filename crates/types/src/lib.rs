//! Chain data types shared by the aergo metadata indexer.
//!
//! This crate defines the subset of node types the synchronizer consumes
//! (blocks, transactions, the naming-governance classification), the
//! little-endian block key used for random access, and the [`NodeClient`]
//! trait that abstracts the node RPC transport.
//!
//! # Feature Flags
//!
//! - **`test-utils`**: Enables [`mock`], an in-memory scripted node used by
//!   the synchronizer's integration tests.

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

mod block;
pub use block::{Block, BlockBody, BlockHeader, Tx, TxBody, TxType, NAME_CONTRACT, account_ref};

mod key;
pub use key::BlockKey;

mod node;
pub use node::{BlockStream, ChainStatus, NodeClient, NodeError, NodeResult};

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
