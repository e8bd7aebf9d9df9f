//! Block and transaction types as streamed by the node.
//!
//! These mirror the node's wire types closely enough for indexing: the
//! synchronizer only needs heights, hashes, timestamps, and the fields that
//! end up in documents. Hashes are raw bytes; base58 rendering happens at
//! the document boundary.

/// Recipient account of governance transactions that mutate the naming
/// registry.
pub const NAME_CONTRACT: &[u8] = b"aergo.name";

/// A block as received from the node, either streamed or fetched by key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Block hash (raw bytes).
    pub hash: Vec<u8>,
    /// Block header.
    pub header: BlockHeader,
    /// Block body.
    pub body: BlockBody,
}

impl Block {
    /// Height of this block.
    pub const fn height(&self) -> u64 {
        self.header.block_no
    }

    /// Block hash rendered as base58.
    pub fn hash_b58(&self) -> String {
        bs58::encode(&self.hash).into_string()
    }

    /// Approximate serialized size of the block in bytes.
    ///
    /// Header fields plus the payload-bearing parts of every transaction.
    pub fn size(&self) -> u64 {
        let tx_bytes: usize = self
            .body
            .txs
            .iter()
            .map(|tx| tx.hash.len() + tx.body.account.len() + tx.body.recipient.len() + tx.body.payload.len())
            .sum();
        (self.hash.len() + self.header.prev_hash.len() + 16 + tx_bytes) as u64
    }
}

/// Block header fields used by the indexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    /// Height of the block.
    pub block_no: u64,
    /// Block timestamp in nanoseconds since the Unix epoch.
    pub timestamp: i64,
    /// Hash of the parent block.
    pub prev_hash: Vec<u8>,
}

/// Block body: the transaction list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockBody {
    /// Transactions included in the block, in execution order.
    pub txs: Vec<Tx>,
}

/// A transaction as carried in a block body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tx {
    /// Transaction hash (raw bytes).
    pub hash: Vec<u8>,
    /// Transaction body.
    pub body: TxBody,
}

impl Tx {
    /// Transaction hash rendered as base58.
    pub fn hash_b58(&self) -> String {
        bs58::encode(&self.hash).into_string()
    }

    /// Whether this transaction is a governance call addressed to the naming
    /// contract.
    pub fn is_name_tx(&self) -> bool {
        self.body.tx_type == TxType::Governance && self.body.recipient == NAME_CONTRACT
    }
}

/// Transaction body fields used by the indexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxBody {
    /// Transaction category.
    pub tx_type: TxType,
    /// Sender account (raw bytes).
    pub account: Vec<u8>,
    /// Recipient account (raw bytes); governance recipients are ASCII
    /// contract names.
    pub recipient: Vec<u8>,
    /// Transferred amount in the chain's base unit.
    pub amount: u128,
    /// Call payload; JSON for governance calls.
    pub payload: Vec<u8>,
    /// Sender nonce.
    pub nonce: u64,
}

/// Transaction category, as tagged by the node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum TxType {
    /// Plain transfer or contract call.
    #[default]
    Normal = 0,
    /// Governance transaction (system contracts, naming registry).
    Governance = 1,
}

/// Render an account reference for display.
///
/// Governance recipients are ASCII contract names (`aergo.name` and friends)
/// and are shown verbatim; everything else is a raw address and is base58
/// encoded.
pub fn account_ref(bytes: &[u8]) -> String {
    if bytes.starts_with(b"aergo.") && bytes.iter().all(u8::is_ascii_graphic) {
        String::from_utf8_lossy(bytes).into_owned()
    } else {
        bs58::encode(bytes).into_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name_tx() -> Tx {
        Tx {
            hash: vec![1; 32],
            body: TxBody {
                tx_type: TxType::Governance,
                account: vec![2; 33],
                recipient: NAME_CONTRACT.to_vec(),
                amount: 0,
                payload: br#"{"Name":"v1createName","Args":["somename"]}"#.to_vec(),
                nonce: 1,
            },
        }
    }

    #[test]
    fn name_tx_classification() {
        let tx = name_tx();
        assert!(tx.is_name_tx());

        let mut normal = name_tx();
        normal.body.tx_type = TxType::Normal;
        assert!(!normal.is_name_tx());

        let mut other_contract = name_tx();
        other_contract.body.recipient = b"aergo.system".to_vec();
        assert!(!other_contract.is_name_tx());
    }

    #[test]
    fn account_ref_rendering() {
        assert_eq!(account_ref(b"aergo.name"), "aergo.name");
        // A raw address is base58 encoded, never echoed as bytes.
        let addr = vec![0x02, 0xaa, 0xbb];
        assert_eq!(account_ref(&addr), bs58::encode(&addr).into_string());
    }
}
