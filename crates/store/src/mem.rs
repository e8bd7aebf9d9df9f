//! In-memory store backend for testing.
//!
//! Documents are held as JSON values keyed by natural id; aliases are a
//! name-to-name map resolved transparently on every operation. Intended for
//! tests and development only.

use crate::{Document, Family, IntegerRange, QueryParams, Scroll, Store, StoreError, StoreResult};
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    sync::Arc,
};
use tokio::sync::RwLock;

type MemIndex = BTreeMap<String, Value>;

#[derive(Default)]
struct Inner {
    indices: HashMap<String, MemIndex>,
    aliases: HashMap<String, String>,
}

impl Inner {
    fn resolve(&self, name: &str) -> StoreResult<&MemIndex> {
        let target = self.aliases.get(name).map(String::as_str).unwrap_or(name);
        self.indices.get(target).ok_or_else(|| StoreError::UnknownIndex(name.to_owned()))
    }

    fn resolve_mut(&mut self, name: &str) -> StoreResult<&mut MemIndex> {
        let target = self.aliases.get(name).cloned().unwrap_or_else(|| name.to_owned());
        self.indices.get_mut(&target).ok_or(StoreError::UnknownIndex(target))
    }

    fn sorted(&self, params: &QueryParams) -> StoreResult<Vec<Value>> {
        let index = self.resolve(&params.index)?;
        let mut docs: Vec<Value> = index
            .values()
            .filter(|doc| match params.range {
                Some(range) => in_range(doc, range),
                None => true,
            })
            .cloned()
            .collect();
        docs.sort_by_key(|doc| field_u64(doc, params.sort_field));
        if !params.sort_asc {
            docs.reverse();
        }
        if let Some(fields) = &params.select_fields {
            for doc in &mut docs {
                if let Value::Object(map) = doc {
                    map.retain(|key, _| fields.iter().any(|field| *field == key.as_str()));
                }
            }
        }
        Ok(docs)
    }
}

fn field_u64(doc: &Value, field: &str) -> u64 {
    doc.get(field).and_then(Value::as_u64).unwrap_or(0)
}

fn in_range(doc: &Value, range: IntegerRange) -> bool {
    let value = field_u64(doc, range.field);
    value >= range.min && value <= range.max
}

/// In-memory store backend.
///
/// Thread-safe; all operations are protected by an async read-write lock.
#[derive(Clone, Default)]
pub struct MemStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of concrete indices currently materialized.
    pub async fn index_count(&self) -> usize {
        self.inner.read().await.indices.len()
    }

    /// The concrete index currently behind `alias`, if any.
    pub async fn alias_target(&self, alias: &str) -> Option<String> {
        self.inner.read().await.aliases.get(alias).cloned()
    }
}

impl std::fmt::Debug for MemStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemStore").finish_non_exhaustive()
    }
}

impl Store for MemStore {
    type Scroll = MemScroll;

    async fn create_index(&self, index: &str, _family: Family) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.indices.entry(index.to_owned()).or_default();
        Ok(())
    }

    async fn update_alias(&self, alias: &str, index: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.indices.contains_key(index) {
            return Err(StoreError::UnknownIndex(index.to_owned()));
        }
        inner.aliases.insert(alias.to_owned(), index.to_owned());
        Ok(())
    }

    async fn existing_index_prefix(
        &self,
        alias: &str,
        family: Family,
    ) -> StoreResult<Option<String>> {
        let inner = self.inner.read().await;
        Ok(inner
            .aliases
            .get(alias)
            .and_then(|index| index.strip_suffix(family.name()))
            .map(str::to_owned))
    }

    async fn insert<D: Document>(&self, doc: &D, index: &str, upsert: bool) -> StoreResult<u64> {
        self.insert_batch(std::slice::from_ref(doc), index, upsert).await
    }

    async fn insert_batch<D: Document>(
        &self,
        docs: &[D],
        index: &str,
        upsert: bool,
    ) -> StoreResult<u64> {
        let mut inner = self.inner.write().await;
        // Materialize on first write, as a document store would.
        let target = inner.aliases.get(index).cloned().unwrap_or_else(|| index.to_owned());
        inner.indices.entry(target.clone()).or_default();
        let mem = inner.resolve_mut(&target)?;

        let mut affected = 0;
        for doc in docs {
            let value =
                serde_json::to_value(doc).map_err(|e| StoreError::Malformed(e.to_string()))?;
            let id = doc.doc_id();
            if upsert || !mem.contains_key(&id) {
                mem.insert(id, value);
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn count(&self, params: &QueryParams) -> StoreResult<u64> {
        let inner = self.inner.read().await;
        let index = inner.resolve(&params.index)?;
        let count = match params.range {
            Some(range) => index.values().filter(|doc| in_range(doc, range)).count(),
            None => index.len(),
        };
        Ok(count as u64)
    }

    async fn select_one(&self, params: &QueryParams) -> StoreResult<Option<Value>> {
        let inner = self.inner.read().await;
        Ok(inner.sorted(params)?.into_iter().next())
    }

    async fn scroll(&self, params: QueryParams) -> StoreResult<Self::Scroll> {
        let inner = self.inner.read().await;
        Ok(MemScroll { docs: inner.sorted(&params)?.into() })
    }

    async fn delete_range(&self, index: &str, range: IntegerRange) -> StoreResult<u64> {
        let mut inner = self.inner.write().await;
        let mem = inner.resolve_mut(index)?;
        let before = mem.len();
        mem.retain(|_, doc| !in_range(doc, range));
        Ok((before - mem.len()) as u64)
    }
}

/// Snapshot scan over an in-memory index.
#[derive(Debug)]
pub struct MemScroll {
    docs: VecDeque<Value>,
}

impl Scroll for MemScroll {
    async fn next(&mut self) -> StoreResult<Option<Value>> {
        Ok(self.docs.pop_front())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::conformance::conformance;

    #[tokio::test]
    async fn mem_store_conformance() {
        let store = MemStore::new();
        conformance(&store).await.unwrap();
    }
}
