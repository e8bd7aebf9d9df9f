//! The store adapter contract.
//!
//! [`Store`] is the abstract operation set the synchronizer is written
//! against. Backends own data organization (tables vs. search indices,
//! views vs. native aliases); the trait is agnostic to those details.
//!
//! Guarantees the synchronizer relies on:
//!
//! - single-document upsert is atomic per document
//! - a flushed batch writes every accepted document at least once
//! - alias rebinding is atomic: readers never observe an alias bound to two
//!   indices, or unbound after a failed rebind
//! - document writes are idempotent by natural id

use crate::{Document, Family, StoreResult};
use serde_json::Value;
use std::future::Future;

/// Inclusive numeric range filter over one document field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegerRange {
    /// Field the range applies to.
    pub field: &'static str,
    /// Lower bound, inclusive.
    pub min: u64,
    /// Upper bound, inclusive.
    pub max: u64,
}

impl IntegerRange {
    /// Range over `field` covering `[min, max]`.
    pub const fn new(field: &'static str, min: u64, max: u64) -> Self {
        Self { field, min, max }
    }
}

/// Parameters for read operations.
///
/// `index` may name either a concrete index or an alias; backends resolve
/// aliases transparently.
#[derive(Debug, Clone)]
pub struct QueryParams {
    /// Index or alias to read from.
    pub index: String,
    /// Field to order results by.
    pub sort_field: &'static str,
    /// Ascending order when true; descending otherwise.
    pub sort_asc: bool,
    /// Fields to return; `None` returns whole documents.
    pub select_fields: Option<Vec<&'static str>>,
    /// Page size for scrolling scans.
    pub page_size: usize,
    /// Optional range filter.
    pub range: Option<IntegerRange>,
}

impl QueryParams {
    /// Descending query over `sort_field` with whole documents and a
    /// 100-document scroll page.
    pub fn new(index: impl Into<String>, sort_field: &'static str) -> Self {
        Self {
            index: index.into(),
            sort_field,
            sort_asc: false,
            select_fields: None,
            page_size: 100,
            range: None,
        }
    }

    /// Sort ascending.
    pub fn ascending(mut self) -> Self {
        self.sort_asc = true;
        self
    }

    /// Restrict returned fields.
    pub fn fields(mut self, fields: Vec<&'static str>) -> Self {
        self.select_fields = Some(fields);
        self
    }

    /// Set the scroll page size.
    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    /// Filter by an inclusive numeric range.
    pub fn range(mut self, range: IntegerRange) -> Self {
        self.range = Some(range);
        self
    }
}

/// A lazy, finite scan over matching documents.
pub trait Scroll: Send {
    /// Fetch the next document, or `None` when the scan is exhausted.
    fn next(&mut self) -> impl Future<Output = StoreResult<Option<Value>>> + Send;
}

/// Abstract document store with named indices and alias indirection.
pub trait Store: Send + Sync + 'static {
    /// The scan type produced by [`Store::scroll`].
    type Scroll: Scroll + 'static;

    /// Materialize the concrete index `index` with `family`'s schema.
    ///
    /// Idempotent with respect to an already-existing index.
    fn create_index(
        &self,
        index: &str,
        family: Family,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Atomically rebind `alias` to `index`, releasing any previous target.
    fn update_alias(
        &self,
        alias: &str,
        index: &str,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Find the concrete index currently behind `alias` and extract its
    /// timestamped prefix. `None` when no such alias exists.
    fn existing_index_prefix(
        &self,
        alias: &str,
        family: Family,
    ) -> impl Future<Output = StoreResult<Option<String>>> + Send;

    /// Upsert one document by natural id. Returns the affected count.
    fn insert<D: Document>(
        &self,
        doc: &D,
        index: &str,
        upsert: bool,
    ) -> impl Future<Output = StoreResult<u64>> + Send;

    /// Write one batch of documents. Returns the affected count.
    ///
    /// With `upsert` false, documents whose id already exists are dropped
    /// rather than replaced.
    fn insert_batch<D: Document>(
        &self,
        docs: &[D],
        index: &str,
        upsert: bool,
    ) -> impl Future<Output = StoreResult<u64>> + Send;

    /// Count documents, honoring `params.range` when present.
    fn count(&self, params: &QueryParams) -> impl Future<Output = StoreResult<u64>> + Send;

    /// Fetch the first document in `params`' sort order.
    fn select_one(
        &self,
        params: &QueryParams,
    ) -> impl Future<Output = StoreResult<Option<Value>>> + Send;

    /// Open a scrolling scan in `params`' sort order.
    fn scroll(&self, params: QueryParams) -> impl Future<Output = StoreResult<Self::Scroll>> + Send;

    /// Delete documents whose `range.field` lies within the range.
    /// Returns the deleted count.
    fn delete_range(
        &self,
        index: &str,
        range: IntegerRange,
    ) -> impl Future<Output = StoreResult<u64>> + Send;
}

/// Connector trait for store backends.
///
/// Abstracts the connection/opening process so callers can pick a backend
/// from configuration and connect through one interface.
pub trait Connect {
    /// The store type produced by this connector.
    type Store: Store;

    /// The error type returned by connection attempts.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Connect to the backend asynchronously.
    fn connect(&self) -> impl Future<Output = Result<Self::Store, Self::Error>> + Send;
}
