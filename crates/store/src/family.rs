//! Document families and their indexing rules.

use std::fmt;

/// A document family: one kind of document with its own schema, natural-key
/// rule, and ordering field.
///
/// Every family lives in a concrete index named `<prefix><family>`, where the
/// prefix is either the stable alias prefix (reader-facing) or a timestamped
/// index prefix (writer-facing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// One document per block.
    Block,
    /// One document per transaction.
    Tx,
    /// One document per naming-registry mutation.
    Name,
}

impl Family {
    /// All families, in the order aliases are cut over.
    pub const ALL: [Self; 3] = [Self::Block, Self::Tx, Self::Name];

    /// Short family name, used as the index/alias name suffix.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Tx => "tx",
            Self::Name => "name",
        }
    }

    /// The numeric field documents of this family are ordered by.
    pub const fn ordering_field(self) -> &'static str {
        match self {
            Self::Block => "no",
            Self::Tx | Self::Name => "blockno",
        }
    }

    /// Bulk flush size used by the synchronizer's pipelines.
    pub const fn batch_size(self) -> usize {
        match self {
            Self::Block => 500,
            Self::Tx => 10_000,
            Self::Name => 2_500,
        }
    }

    /// Bounded channel capacity feeding this family's bulk writer.
    pub const fn channel_capacity(self) -> usize {
        match self {
            Self::Block => 1_000,
            Self::Tx => 20_000,
            Self::Name => 5_000,
        }
    }

    /// Whether bulk writes replace existing documents.
    ///
    /// Only names are mutable over their lifetime; blocks and transactions
    /// are immutable once derived, so re-inserts may be dropped.
    pub const fn upsert(self) -> bool {
        matches!(self, Self::Name)
    }

    /// Column list for the relational profile, natural key first.
    pub const fn columns(self) -> &'static [&'static str] {
        match self {
            Self::Block => &["id", "ts", "no", "size", "txs"],
            Self::Tx => &["id", "ts", "blockno", "from", "to", "amount", "type"],
            Self::Name => &["id", "name", "address", "blockno", "update_block"],
        }
    }

    /// Index (or alias) name for this family under `prefix`.
    pub fn index_name(self, prefix: &str) -> String {
        format!("{prefix}{}", self.name())
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn naming() {
        assert_eq!(Family::Block.index_name("chain_"), "chain_block");
        assert_eq!(Family::Tx.index_name("chain_2024-01-01_00-00-00_"), "chain_2024-01-01_00-00-00_tx");
    }

    #[test]
    fn ordering_fields() {
        assert_eq!(Family::Block.ordering_field(), "no");
        assert_eq!(Family::Tx.ordering_field(), "blockno");
        assert_eq!(Family::Name.ordering_field(), "blockno");
    }

    #[test]
    fn only_names_upsert() {
        assert!(!Family::Block.upsert());
        assert!(!Family::Tx.upsert());
        assert!(Family::Name.upsert());
    }

    #[test]
    fn columns_lead_with_id() {
        for family in Family::ALL {
            assert_eq!(family.columns()[0], "id");
            assert!(family.columns().contains(&family.ordering_field()));
        }
    }
}
