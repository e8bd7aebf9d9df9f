//! Concrete document types and their conversions from chain types.

use crate::{Document, Family, SqlParam};
use aergo_index_types::{account_ref, Block, Tx};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn block_ts(nanos: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_nanos(nanos)
}

/// Document derived from one block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDocument {
    /// Base58 block hash, the natural id.
    pub id: String,
    /// Block timestamp.
    pub ts: DateTime<Utc>,
    /// Block height; the family's ordering field.
    pub no: u64,
    /// Approximate serialized block size in bytes.
    pub size: u64,
    /// Number of transactions in the block.
    pub txs: u64,
}

impl BlockDocument {
    /// Derive the block document from a chain block.
    pub fn from_chain(block: &Block) -> Self {
        Self {
            id: block.hash_b58(),
            ts: block_ts(block.header.timestamp),
            no: block.height(),
            size: block.size(),
            txs: block.body.txs.len() as u64,
        }
    }
}

impl Document for BlockDocument {
    const FAMILY: Family = Family::Block;

    fn doc_id(&self) -> String {
        self.id.clone()
    }

    fn ordering(&self) -> u64 {
        self.no
    }

    fn sql_row(&self) -> Vec<SqlParam> {
        vec![
            SqlParam::Text(self.id.clone()),
            SqlParam::Text(self.ts.to_rfc3339()),
            SqlParam::BigInt(self.no as i64),
            SqlParam::BigInt(self.size as i64),
            SqlParam::BigInt(self.txs as i64),
        ]
    }
}

/// Document derived from one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxDocument {
    /// Base58 transaction hash, the natural id.
    pub id: String,
    /// Timestamp of the containing block.
    pub ts: DateTime<Utc>,
    /// Height of the containing block; the family's ordering field.
    pub blockno: u64,
    /// Sender account reference.
    pub from: String,
    /// Recipient account reference.
    pub to: String,
    /// Transferred amount in the chain's base unit, as a decimal string.
    pub amount: String,
    /// Transaction category.
    #[serde(rename = "type")]
    pub tx_type: i32,
}

impl TxDocument {
    /// Derive the tx document from a transaction and its containing block.
    pub fn from_chain(tx: &Tx, block: &Block) -> Self {
        Self {
            id: tx.hash_b58(),
            ts: block_ts(block.header.timestamp),
            blockno: block.height(),
            from: account_ref(&tx.body.account),
            to: account_ref(&tx.body.recipient),
            amount: tx.body.amount.to_string(),
            tx_type: tx.body.tx_type as i32,
        }
    }
}

impl Document for TxDocument {
    const FAMILY: Family = Family::Tx;

    fn doc_id(&self) -> String {
        self.id.clone()
    }

    fn ordering(&self) -> u64 {
        self.blockno
    }

    fn sql_row(&self) -> Vec<SqlParam> {
        vec![
            SqlParam::Text(self.id.clone()),
            SqlParam::Text(self.ts.to_rfc3339()),
            SqlParam::BigInt(self.blockno as i64),
            SqlParam::Text(self.from.clone()),
            SqlParam::Text(self.to.clone()),
            SqlParam::Text(self.amount.clone()),
            SqlParam::BigInt(self.tx_type as i64),
        ]
    }
}

/// Document derived from one naming-registry governance transaction.
///
/// Names are mutable over their lifetime, so this family is written with
/// upsert semantics; the composite id keeps one document per update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameDocument {
    /// Composite id: `<name>-<updateBlock>`.
    pub id: String,
    /// The registered name.
    pub name: String,
    /// Account the name resolves to.
    pub address: String,
    /// Height of the containing block; the family's ordering field.
    pub blockno: u64,
    /// Height at which this registration became effective.
    pub update_block: u64,
}

impl NameDocument {
    /// Derive the name document from a governance transaction.
    ///
    /// The call payload is `{"Name": <op>, "Args": [<name>, <address>?]}`;
    /// a payload that is not valid JSON falls back to the raw bytes as the
    /// name and the sender as the address.
    pub fn from_chain(tx: &Tx, block_no: u64) -> Self {
        let (name, address) = parse_name_payload(&tx.body.payload);
        let address = address.unwrap_or_else(|| account_ref(&tx.body.account));
        Self {
            id: format!("{name}-{block_no}"),
            name,
            address,
            blockno: block_no,
            update_block: block_no,
        }
    }
}

impl Document for NameDocument {
    const FAMILY: Family = Family::Name;

    fn doc_id(&self) -> String {
        self.id.clone()
    }

    fn ordering(&self) -> u64 {
        self.blockno
    }

    fn sql_row(&self) -> Vec<SqlParam> {
        vec![
            SqlParam::Text(self.id.clone()),
            SqlParam::Text(self.name.clone()),
            SqlParam::Text(self.address.clone()),
            SqlParam::BigInt(self.blockno as i64),
            SqlParam::BigInt(self.update_block as i64),
        ]
    }
}

/// Extract `(name, explicit target address)` from a naming call payload.
fn parse_name_payload(payload: &[u8]) -> (String, Option<String>) {
    #[derive(Deserialize)]
    struct Call {
        #[serde(rename = "Args", default)]
        args: Vec<serde_json::Value>,
    }

    if let Ok(call) = serde_json::from_slice::<Call>(payload) {
        let mut strings = call.args.into_iter().filter_map(|v| match v {
            serde_json::Value::String(s) => Some(s),
            _ => None,
        });
        if let Some(name) = strings.next() {
            return (name, strings.next());
        }
    }
    (String::from_utf8_lossy(payload).trim().to_owned(), None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aergo_index_types::mock::{test_block, test_name_tx, test_tx};

    #[test]
    fn block_document_id_is_base58_hash() {
        let block = test_block(42, vec![test_tx(1), test_tx(2)]);
        let doc = BlockDocument::from_chain(&block);
        assert_eq!(doc.id, block.hash_b58());
        assert_eq!(doc.no, 42);
        assert_eq!(doc.txs, 2);
        assert_eq!(doc.ordering(), 42);
    }

    #[test]
    fn tx_document_carries_block_context() {
        let tx = test_tx(7);
        let block = test_block(9, vec![tx.clone()]);
        let doc = TxDocument::from_chain(&tx, &block);
        assert_eq!(doc.blockno, 9);
        assert_eq!(doc.id, tx.hash_b58());
        assert_eq!(doc.amount, tx.body.amount.to_string());

        // The reserved-word column keeps its wire name.
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json.get("type").is_some());
        assert!(json.get("tx_type").is_none());
    }

    #[test]
    fn name_document_from_json_payload() {
        let tx = test_name_tx(1, "somename");
        let doc = NameDocument::from_chain(&tx, 15);
        assert_eq!(doc.name, "somename");
        assert_eq!(doc.id, "somename-15");
        assert_eq!(doc.update_block, 15);
        assert_eq!(doc.blockno, 15);
        assert_eq!(doc.address, account_ref(&tx.body.account));
    }

    #[test]
    fn name_document_with_explicit_target() {
        let mut tx = test_name_tx(1, "somename");
        tx.body.payload =
            br#"{"Name":"v1updateName","Args":["somename","AmgGqNbs"]}"#.to_vec();
        let doc = NameDocument::from_chain(&tx, 20);
        assert_eq!(doc.name, "somename");
        assert_eq!(doc.address, "AmgGqNbs");
    }

    #[test]
    fn name_document_raw_payload_fallback() {
        let mut tx = test_name_tx(1, "ignored");
        tx.body.payload = b"not json".to_vec();
        let doc = NameDocument::from_chain(&tx, 3);
        assert_eq!(doc.name, "not json");
    }

    #[test]
    fn sql_rows_match_columns() {
        let block = test_block(1, vec![test_tx(1)]);
        assert_eq!(
            BlockDocument::from_chain(&block).sql_row().len(),
            Family::Block.columns().len()
        );
        assert_eq!(
            TxDocument::from_chain(&block.body.txs[0], &block).sql_row().len(),
            Family::Tx.columns().len()
        );
        assert_eq!(
            NameDocument::from_chain(&test_name_tx(1, "n"), 1).sql_row().len(),
            Family::Name.columns().len()
        );
    }
}
