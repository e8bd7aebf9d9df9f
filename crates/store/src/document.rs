//! The polymorphic surface a document exposes to the store.
//!
//! Schemas are known at compile time: each family has a concrete struct, and
//! the store only needs the natural id, the ordering value, and a typed row
//! encoding for the relational profile. Search-engine backends serialize the
//! whole document through `serde`.

use crate::Family;
use serde::Serialize;

/// A single bound value in a relational row.
///
/// The relational profile decomposes documents into columns; this is the
/// closed set of column value types the three families need.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// A text column value.
    Text(String),
    /// A 64-bit integer column value.
    BigInt(i64),
}

/// A document belonging to one family.
///
/// Implementations are plain serializable structs; `sql_row` must yield one
/// value per entry of [`Family::columns`], in the same order, with the
/// natural id first.
pub trait Document: Serialize + Send + Sync + 'static {
    /// The family this document type belongs to.
    const FAMILY: Family;

    /// Natural id, stable under re-derivation from the same chain data.
    fn doc_id(&self) -> String;

    /// Value of the family's ordering field.
    fn ordering(&self) -> u64;

    /// Row encoding for the relational profile, matching
    /// [`Family::columns`].
    fn sql_row(&self) -> Vec<SqlParam>;
}
