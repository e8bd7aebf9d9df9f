//! Search-engine store backend over HTTP.

use crate::{mapping, EsStoreError};
use aergo_index_store::{
    Document, Family, IntegerRange, QueryParams, Scroll, Store, StoreError, StoreResult,
};
use reqwest::StatusCode;
use serde_json::{json, Map, Value};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const SCROLL_KEEPALIVE: &str = "1m";

/// Search-engine store backend.
///
/// One instance wraps one engine endpoint; it is cheap to clone and safe to
/// share across tasks.
#[derive(Debug, Clone)]
pub struct EsStore {
    http: reqwest::Client,
    base: String,
}

impl EsStore {
    /// Connect to the engine at `url` and verify it is reachable.
    ///
    /// An unreachable engine is a hard error: the indexer treats a refused
    /// store connection at boot as fatal.
    pub async fn connect(url: &str) -> Result<Self, EsStoreError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let store = Self { http, base: url.trim_end_matches('/').to_owned() };
        let response = store.http.get(&store.base).send().await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        Ok(store)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base)
    }

    /// The concrete index currently behind `alias`, if the alias exists.
    async fn alias_index(&self, alias: &str) -> Result<Option<String>, EsStoreError> {
        let response = self.http.get(self.url(&format!("_alias/{alias}"))).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        let body: Value = response.json().await?;
        let index = body
            .as_object()
            .and_then(|indices| indices.keys().next())
            .ok_or_else(|| EsStoreError::Malformed("empty alias response".into()))?;
        Ok(Some(index.clone()))
    }

    async fn search(&self, index: &str, body: Value) -> Result<Value, EsStoreError> {
        let response = self
            .http
            .post(self.url(&format!("{index}/_search?scroll={SCROLL_KEEPALIVE}")))
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        Ok(response.json().await?)
    }
}

async fn api_error(response: reqwest::Response) -> EsStoreError {
    let status = response.status().as_u16();
    let mut reason = response.text().await.unwrap_or_default();
    reason.truncate(512);
    EsStoreError::Api { status, reason }
}

/// Newline-delimited `_bulk` request body.
fn bulk_body<D: Document>(docs: &[D], index: &str, upsert: bool) -> StoreResult<String> {
    // `index` replaces an existing document, `create` drops the write on an
    // id conflict; that split is exactly the upsert flag.
    let action = if upsert { "index" } else { "create" };
    let mut body = String::new();
    for doc in docs {
        let header = json!({ action: { "_index": index, "_id": doc.doc_id() } });
        body.push_str(&header.to_string());
        body.push('\n');
        body.push_str(
            &serde_json::to_string(doc).map_err(|e| StoreError::Malformed(e.to_string()))?,
        );
        body.push('\n');
    }
    Ok(body)
}

/// Action list for an atomic alias move.
fn alias_actions(previous: Option<&str>, alias: &str, index: &str) -> Value {
    let mut actions = Vec::new();
    if let Some(previous) = previous {
        actions.push(json!({ "remove": { "index": previous, "alias": alias } }));
    }
    actions.push(json!({ "add": { "index": index, "alias": alias } }));
    json!({ "actions": actions })
}

fn range_query(range: IntegerRange) -> Value {
    json!({ "range": { range.field: { "gte": range.min, "lte": range.max } } })
}

fn sort_clause(params: &QueryParams) -> Value {
    let order = if params.sort_asc { "asc" } else { "desc" };
    json!([{ params.sort_field: { "order": order } }])
}

fn search_body(params: &QueryParams, size: usize) -> Value {
    let mut body = Map::new();
    body.insert("size".into(), size.into());
    body.insert("sort".into(), sort_clause(params));
    if let Some(fields) = &params.select_fields {
        body.insert("_source".into(), json!(fields));
    }
    if let Some(range) = params.range {
        body.insert("query".into(), range_query(range));
    }
    Value::Object(body)
}

/// Flatten one search hit into a document, injecting the engine id.
fn hit_to_doc(hit: &Value) -> Option<Value> {
    let mut doc = hit.get("_source")?.clone();
    if let (Value::Object(map), Some(id)) = (&mut doc, hit.get("_id")) {
        map.entry("id").or_insert_with(|| id.clone());
    }
    Some(doc)
}

impl Store for EsStore {
    type Scroll = EsScroll;

    async fn create_index(&self, index: &str, family: Family) -> StoreResult<()> {
        let response = self
            .http
            .put(self.url(index))
            .json(&mapping::index_body(family))
            .send()
            .await
            .map_err(EsStoreError::from)?;
        if response.status().is_success() {
            return Ok(());
        }
        let error = api_error(response).await;
        if let EsStoreError::Api { reason, .. } = &error {
            // Recreating an existing index is not fatal.
            if reason.contains("resource_already_exists_exception") {
                return Ok(());
            }
        }
        Err(error.into())
    }

    async fn update_alias(&self, alias: &str, index: &str) -> StoreResult<()> {
        let previous = self.alias_index(alias).await.map_err(StoreError::from)?;
        let body = alias_actions(previous.as_deref(), alias, index);
        let response = self
            .http
            .post(self.url("_aliases"))
            .json(&body)
            .send()
            .await
            .map_err(EsStoreError::from)?;
        if !response.status().is_success() {
            return Err(api_error(response).await.into());
        }
        Ok(())
    }

    async fn existing_index_prefix(
        &self,
        alias: &str,
        family: Family,
    ) -> StoreResult<Option<String>> {
        let index = self.alias_index(alias).await.map_err(StoreError::from)?;
        Ok(index.and_then(|index| index.strip_suffix(family.name()).map(str::to_owned)))
    }

    async fn insert<D: Document>(&self, doc: &D, index: &str, upsert: bool) -> StoreResult<u64> {
        let path = if upsert {
            format!("{index}/_doc/{}", doc.doc_id())
        } else {
            format!("{index}/_create/{}", doc.doc_id())
        };
        let response = self
            .http
            .put(self.url(&path))
            .json(doc)
            .send()
            .await
            .map_err(EsStoreError::from)?;
        if response.status() == StatusCode::CONFLICT {
            return Ok(0);
        }
        if !response.status().is_success() {
            return Err(api_error(response).await.into());
        }
        Ok(1)
    }

    async fn insert_batch<D: Document>(
        &self,
        docs: &[D],
        index: &str,
        upsert: bool,
    ) -> StoreResult<u64> {
        if docs.is_empty() {
            return Ok(0);
        }
        let body = bulk_body(docs, index, upsert)?;
        let response = self
            .http
            .post(self.url("_bulk"))
            .header("content-type", "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(EsStoreError::from)?;
        if !response.status().is_success() {
            return Err(api_error(response).await.into());
        }
        let result: Value = response.json().await.map_err(EsStoreError::from)?;

        let mut affected = 0;
        let items = result["items"].as_array().cloned().unwrap_or_default();
        for item in &items {
            let Some(outcome) = item.as_object().and_then(|m| m.values().next()) else {
                continue;
            };
            let status = outcome["status"].as_u64().unwrap_or(0);
            match status {
                200 | 201 => affected += 1,
                // Conflicts on `create` are re-indexed duplicates, dropped
                // by design of the idempotent id scheme.
                409 => {}
                _ => {
                    let reason = outcome["error"]["reason"].as_str().unwrap_or("bulk item failed");
                    return Err(EsStoreError::Api {
                        status: status as u16,
                        reason: reason.to_owned(),
                    }
                    .into());
                }
            }
        }
        Ok(affected)
    }

    async fn count(&self, params: &QueryParams) -> StoreResult<u64> {
        let mut body = Map::new();
        if let Some(range) = params.range {
            body.insert("query".into(), range_query(range));
        }
        let response = self
            .http
            .post(self.url(&format!("{}/_count", params.index)))
            .json(&Value::Object(body))
            .send()
            .await
            .map_err(EsStoreError::from)?;
        if !response.status().is_success() {
            return Err(api_error(response).await.into());
        }
        let result: Value = response.json().await.map_err(EsStoreError::from)?;
        result["count"]
            .as_u64()
            .ok_or_else(|| EsStoreError::Malformed("missing count".into()).into())
    }

    async fn select_one(&self, params: &QueryParams) -> StoreResult<Option<Value>> {
        let response = self
            .http
            .post(self.url(&format!("{}/_search", params.index)))
            .json(&search_body(params, 1))
            .send()
            .await
            .map_err(EsStoreError::from)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::UnknownIndex(params.index.clone()));
        }
        if !response.status().is_success() {
            return Err(api_error(response).await.into());
        }
        let result: Value = response.json().await.map_err(EsStoreError::from)?;
        Ok(result["hits"]["hits"].as_array().and_then(|hits| hits.first()).and_then(hit_to_doc))
    }

    async fn scroll(&self, params: QueryParams) -> StoreResult<Self::Scroll> {
        Ok(EsScroll {
            store: self.clone(),
            params: Some(params),
            scroll_id: None,
            buffer: Vec::new(),
            done: false,
        })
    }

    async fn delete_range(&self, index: &str, range: IntegerRange) -> StoreResult<u64> {
        let body = json!({ "query": range_query(range) });
        let response = self
            .http
            .post(self.url(&format!("{index}/_delete_by_query")))
            .json(&body)
            .send()
            .await
            .map_err(EsStoreError::from)?;
        if !response.status().is_success() {
            return Err(api_error(response).await.into());
        }
        let result: Value = response.json().await.map_err(EsStoreError::from)?;
        result["deleted"]
            .as_u64()
            .ok_or_else(|| EsStoreError::Malformed("missing deleted count".into()).into())
    }
}

/// Server-side scroll over one index.
#[derive(Debug)]
pub struct EsScroll {
    store: EsStore,
    params: Option<QueryParams>,
    scroll_id: Option<String>,
    buffer: Vec<Value>,
    done: bool,
}

impl EsScroll {
    async fn fetch_next_page(&mut self) -> StoreResult<()> {
        let result = if let Some(params) = self.params.take() {
            let body = search_body(&params, params.page_size);
            self.store.search(&params.index, body).await.map_err(StoreError::from)?
        } else if let Some(scroll_id) = &self.scroll_id {
            let body = json!({ "scroll": SCROLL_KEEPALIVE, "scroll_id": scroll_id });
            let response = self
                .store
                .http
                .post(self.store.url("_search/scroll"))
                .json(&body)
                .send()
                .await
                .map_err(EsStoreError::from)?;
            if !response.status().is_success() {
                return Err(api_error(response).await.into());
            }
            response.json().await.map_err(EsStoreError::from)?
        } else {
            self.done = true;
            return Ok(());
        };

        self.scroll_id = result["_scroll_id"].as_str().map(str::to_owned);
        let hits: Vec<Value> = result["hits"]["hits"]
            .as_array()
            .map(|hits| hits.iter().filter_map(hit_to_doc).collect())
            .unwrap_or_default();
        if hits.is_empty() {
            self.done = true;
        }
        self.buffer = hits;
        self.buffer.reverse();
        Ok(())
    }
}

impl Scroll for EsScroll {
    async fn next(&mut self) -> StoreResult<Option<Value>> {
        if self.buffer.is_empty() && !self.done {
            self.fetch_next_page().await?;
        }
        Ok(self.buffer.pop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aergo_index_store::conformance::{block_doc, name_doc};

    #[test]
    fn bulk_body_alternates_action_and_source() {
        let docs = [block_doc(1), block_doc(2)];
        let body = bulk_body(&docs, "chain_p_block", false).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 4);

        let header: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(header["create"]["_index"], "chain_p_block");
        assert_eq!(header["create"]["_id"], "blockhash1");
        let source: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(source["no"].as_u64(), Some(1));

        let upsert = bulk_body(&[name_doc("alice", 5, "Am1")], "chain_p_name", true).unwrap();
        let header: Value = serde_json::from_str(upsert.lines().next().unwrap()).unwrap();
        assert!(header.get("index").is_some());
    }

    #[test]
    fn alias_actions_are_atomic_swap() {
        let actions = alias_actions(Some("chain_p0_block"), "chain_block", "chain_p1_block");
        let list = actions["actions"].as_array().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["remove"]["index"], "chain_p0_block");
        assert_eq!(list[1]["add"]["index"], "chain_p1_block");

        let fresh = alias_actions(None, "chain_block", "chain_p0_block");
        assert_eq!(fresh["actions"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn search_body_shape() {
        let params = QueryParams::new("chain_block", "no");
        let body = search_body(&params, 1);
        assert_eq!(body["size"], 1);
        assert_eq!(body["sort"][0]["no"]["order"], "desc");
        assert!(body.get("query").is_none());

        let ranged = QueryParams::new("chain_tx", "blockno")
            .ascending()
            .range(IntegerRange::new("blockno", 3, 9));
        let body = search_body(&ranged, 50);
        assert_eq!(body["sort"][0]["blockno"]["order"], "asc");
        assert_eq!(body["query"]["range"]["blockno"]["gte"], 3);
        assert_eq!(body["query"]["range"]["blockno"]["lte"], 9);
    }

    #[test]
    fn hit_doc_gets_engine_id() {
        let hit = json!({ "_id": "abc", "_source": { "no": 4 } });
        let doc = hit_to_doc(&hit).unwrap();
        assert_eq!(doc["id"], "abc");
        assert_eq!(doc["no"], 4);
    }
}
