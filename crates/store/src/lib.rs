//! Store adapter contract and document model for the aergo metadata indexer.
//!
//! The indexer mirrors chain metadata into an external document store that
//! supports named indices and atomically-rebindable aliases. This crate
//! defines everything the synchronizer needs from such a store:
//!
//! - [`Family`]: the three document families (block, tx, name) with their
//!   natural-key and ordering-field rules
//! - [`Document`] plus the concrete [`BlockDocument`], [`TxDocument`], and
//!   [`NameDocument`] types and their conversions from chain types
//! - [`Store`]: the abstract operation set every backend implements
//!
//! Concrete backends live in sibling crates (`aergo-index-store-sql`,
//! `aergo-index-store-es`); an in-memory backend for tests lives in [`mem`].
//!
//! # Feature Flags
//!
//! - **`in-memory`**: Enables [`mem`].
//! - **`test-utils`**: Enables `in-memory` and the [`conformance`] suite that
//!   every backend runs against the same contract.

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
pub use error::{StoreError, StoreResult};

mod family;
pub use family::Family;

mod document;
pub use document::{Document, SqlParam};

mod documents;
pub use documents::{BlockDocument, NameDocument, TxDocument};

mod traits;
pub use traits::{Connect, IntegerRange, QueryParams, Scroll, Store};

#[cfg(any(test, feature = "in-memory"))]
pub mod mem;

/// Conformance tests for store backends.
#[cfg(any(test, feature = "test-utils"))]
pub mod conformance;
