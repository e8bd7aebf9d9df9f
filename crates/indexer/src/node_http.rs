//! HTTP polling client for the node RPC surface.
//!
//! The synchronizer only needs three operations (a stream of new blocks,
//! random access by height key, and the chain status), so this client maps
//! them onto the node's REST gateway and drives the "stream" by polling the
//! advancing best height. Errors bubble up as stream errors and are handled
//! by the orchestrator's reconnect path.

use aergo_index_types::{
    Block, BlockBody, BlockHeader, BlockKey, BlockStream, ChainStatus, NodeClient, NodeError,
    NodeResult, Tx, TxBody, TxType,
};
use serde::Deserialize;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Node client over the HTTP gateway.
#[derive(Debug, Clone)]
pub struct HttpNodeClient {
    http: reqwest::Client,
    base: String,
}

impl HttpNodeClient {
    /// Create a client for the node at `addr` (`host:port` or a full URL).
    pub fn new(addr: &str) -> Self {
        let base = if addr.contains("://") {
            addr.trim_end_matches('/').to_owned()
        } else {
            format!("http://{addr}")
        };
        Self { http: reqwest::Client::new(), base }
    }

    /// GET a JSON resource; `None` on 404.
    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> NodeResult<Option<T>> {
        let url = format!("{}/{path}", self.base);
        let response = self.http.get(&url).send().await.map_err(NodeError::transport)?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(NodeError::Malformed(format!(
                "unexpected status {} for {path}",
                response.status()
            )));
        }
        response.json().await.map(Some).map_err(NodeError::transport)
    }
}

impl NodeClient for HttpNodeClient {
    type Stream = HttpBlockStream;

    async fn stream_blocks(&self) -> NodeResult<Self::Stream> {
        // Verify the node is reachable before handing out a stream, so a
        // dead endpoint surfaces as a failed open rather than a silent
        // stall.
        self.status().await?;
        Ok(HttpBlockStream { client: self.clone(), next: None })
    }

    async fn get_block(&self, key: BlockKey) -> NodeResult<Block> {
        let path = format!("v1/block/{}", hex_key(key.as_bytes()));
        match self.get_json::<BlockDto>(&path).await? {
            Some(dto) => dto.into_block(),
            None => Err(NodeError::BlockNotFound(key.height())),
        }
    }

    async fn status(&self) -> NodeResult<ChainStatus> {
        let dto: ChainInfoDto = self
            .get_json("v1/blockchain")
            .await?
            .ok_or_else(|| NodeError::Malformed("blockchain status unavailable".to_owned()))?;
        Ok(ChainStatus { best_height: dto.best_height })
    }
}

/// Poll-driven block stream following the node's best height.
#[derive(Debug)]
pub struct HttpBlockStream {
    client: HttpNodeClient,
    next: Option<u64>,
}

impl BlockStream for HttpBlockStream {
    async fn recv(&mut self) -> NodeResult<Option<Block>> {
        loop {
            let status = self.client.status().await?;
            let next = *self.next.get_or_insert(status.best_height);
            if status.best_height >= next {
                let block = self.client.get_block(BlockKey::from_height(next)).await?;
                self.next = Some(next + 1);
                return Ok(Some(block));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

fn hex_key(bytes: &[u8; 8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug, Deserialize)]
struct ChainInfoDto {
    best_height: u64,
}

#[derive(Debug, Deserialize)]
struct BlockDto {
    hash: String,
    header: HeaderDto,
    #[serde(default)]
    body: BodyDto,
}

#[derive(Debug, Deserialize)]
struct HeaderDto {
    block_no: u64,
    timestamp: i64,
    #[serde(default)]
    prev_hash: String,
}

#[derive(Debug, Default, Deserialize)]
struct BodyDto {
    #[serde(default)]
    txs: Vec<TxDto>,
}

#[derive(Debug, Deserialize)]
struct TxDto {
    hash: String,
    #[serde(default)]
    tx_type: i32,
    account: String,
    recipient: String,
    #[serde(default)]
    amount: String,
    #[serde(default)]
    payload: String,
    #[serde(default)]
    nonce: u64,
}

fn decode_hash(value: &str) -> NodeResult<Vec<u8>> {
    bs58::decode(value)
        .into_vec()
        .map_err(|e| NodeError::Malformed(format!("bad base58 hash {value}: {e}")))
}

/// Governance recipients are contract names, everything else is a base58
/// address.
fn decode_account(value: &str) -> NodeResult<Vec<u8>> {
    if value.is_empty() {
        return Ok(Vec::new());
    }
    if value.starts_with("aergo.") {
        return Ok(value.as_bytes().to_vec());
    }
    decode_hash(value)
}

impl BlockDto {
    fn into_block(self) -> NodeResult<Block> {
        let txs = self.body.txs.into_iter().map(TxDto::into_tx).collect::<NodeResult<_>>()?;
        Ok(Block {
            hash: decode_hash(&self.hash)?,
            header: BlockHeader {
                block_no: self.header.block_no,
                timestamp: self.header.timestamp,
                prev_hash: if self.header.prev_hash.is_empty() {
                    Vec::new()
                } else {
                    decode_hash(&self.header.prev_hash)?
                },
            },
            body: BlockBody { txs },
        })
    }
}

impl TxDto {
    fn into_tx(self) -> NodeResult<Tx> {
        let tx_type = match self.tx_type {
            1 => TxType::Governance,
            _ => TxType::Normal,
        };
        let amount = if self.amount.is_empty() {
            0
        } else {
            self.amount
                .parse()
                .map_err(|_| NodeError::Malformed(format!("bad amount {}", self.amount)))?
        };
        Ok(Tx {
            hash: decode_hash(&self.hash)?,
            body: TxBody {
                tx_type,
                account: decode_account(&self.account)?,
                recipient: decode_account(&self.recipient)?,
                amount,
                payload: self.payload.into_bytes(),
                nonce: self.nonce,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_key_is_little_endian_hex() {
        let key = BlockKey::from_height(258);
        assert_eq!(hex_key(key.as_bytes()), "0201000000000000");
    }

    #[test]
    fn block_dto_conversion() {
        let json = serde_json::json!({
            "hash": bs58::encode(vec![1u8; 32]).into_string(),
            "header": { "block_no": 12, "timestamp": 1_600_000_000_000_000_000i64 },
            "body": { "txs": [{
                "hash": bs58::encode(vec![2u8; 32]).into_string(),
                "tx_type": 1,
                "account": bs58::encode(vec![3u8; 33]).into_string(),
                "recipient": "aergo.name",
                "amount": "5000",
                "payload": "{\"Name\":\"v1createName\",\"Args\":[\"x\"]}"
            }]}
        });
        let dto: BlockDto = serde_json::from_value(json).unwrap();
        let block = dto.into_block().unwrap();
        assert_eq!(block.height(), 12);
        assert_eq!(block.body.txs.len(), 1);
        let tx = &block.body.txs[0];
        assert!(tx.is_name_tx());
        assert_eq!(tx.body.amount, 5000);
    }

    #[test]
    fn malformed_hash_is_rejected() {
        assert!(decode_hash("not-base58-0OIl").is_err());
    }
}
