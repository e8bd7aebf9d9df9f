//! Relational backend for the aergo metadata indexer's document store.
//!
//! Concrete indices are tables created from per-family DDL templates;
//! aliases are views rebuilt atomically on rebind; bulk writes are
//! multi-row inserts with `ON CONFLICT` handling the upsert/ignore split.
//!
//! # Supported Databases
//!
//! - **PostgreSQL** (feature `postgres`): production backend.
//! - **SQLite** (feature `sqlite`): lightweight backend for testing and
//!   single-binary deployments.
//!
//! # Feature Flags
//!
//! - **`postgres`**: Enables the PostgreSQL driver.
//! - **`sqlite`**: Enables the SQLite driver.
//! - **`test-utils`**: Enables the SQLite driver and propagates
//!   `aergo-index-store/test-utils` for conformance testing.

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
pub use error::SqlStoreError;

mod backend;
pub use backend::{SqlScroll, SqlStore};

mod connector;
pub use connector::SqlConnector;
