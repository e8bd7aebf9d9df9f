//! Search-engine backend for the aergo metadata indexer's document store.
//!
//! Talks the Elasticsearch-compatible HTTP surface: native indices created
//! from per-family mappings, atomic `_aliases` swaps, newline-delimited
//! `_bulk` writes, `_count`/`_search` reads, server-side scrolls, and
//! `_delete_by_query` for range deletes.

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
pub use error::EsStoreError;

mod mapping;

mod backend;
pub use backend::{EsScroll, EsStore};

mod connector;
pub use connector::EsConnector;
