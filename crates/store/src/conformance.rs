//! Conformance tests for [`Store`] backends.
//!
//! These verify that a backend honors the store adapter contract the
//! synchronizer relies on. To test a custom backend, call [`conformance`]
//! with a fresh instance.

use crate::{
    BlockDocument, Family, IntegerRange, NameDocument, QueryParams, Scroll, Store, StoreResult,
};
use chrono::DateTime;

/// Run all conformance tests against a backend.
pub async fn conformance<S: Store>(store: &S) -> StoreResult<()> {
    test_alias_lifecycle(store).await?;
    test_insert_idempotent(store).await?;
    test_upsert_replaces(store).await?;
    test_batch_and_count(store).await?;
    test_select_one_ordering(store).await?;
    test_delete_range(store).await?;
    test_scroll(store).await?;
    Ok(())
}

/// Block fixture with a synthetic hash id.
pub fn block_doc(no: u64) -> BlockDocument {
    BlockDocument {
        id: format!("blockhash{no}"),
        ts: DateTime::from_timestamp_nanos(no as i64 * 1_000_000_000),
        no,
        size: 512,
        txs: 0,
    }
}

/// Name fixture registering `name` at `no`.
pub fn name_doc(name: &str, no: u64, address: &str) -> NameDocument {
    NameDocument {
        id: format!("{name}-{no}"),
        name: name.to_owned(),
        address: address.to_owned(),
        blockno: no,
        update_block: no,
    }
}

/// Aliases resolve to exactly one index, rebind atomically, and expose the
/// prefix of their current target.
pub async fn test_alias_lifecycle<S: Store>(store: &S) -> StoreResult<()> {
    let alias = "conf_alias_block";
    assert_eq!(store.existing_index_prefix(alias, Family::Block).await?, None);

    store.create_index("conf_alias_p0_block", Family::Block).await?;
    // Creating an existing index is not an error.
    store.create_index("conf_alias_p0_block", Family::Block).await?;

    store.update_alias(alias, "conf_alias_p0_block").await?;
    assert_eq!(
        store.existing_index_prefix(alias, Family::Block).await?.as_deref(),
        Some("conf_alias_p0_")
    );

    // Rebinding releases the previous target.
    store.create_index("conf_alias_p1_block", Family::Block).await?;
    store.update_alias(alias, "conf_alias_p1_block").await?;
    assert_eq!(
        store.existing_index_prefix(alias, Family::Block).await?.as_deref(),
        Some("conf_alias_p1_")
    );

    // Reads through the alias hit the new target only.
    store.insert(&block_doc(1), "conf_alias_p1_block", false).await?;
    let count = store.count(&QueryParams::new(alias, "no")).await?;
    assert_eq!(count, 1);
    Ok(())
}

/// Re-inserting the same document does not grow the index.
pub async fn test_insert_idempotent<S: Store>(store: &S) -> StoreResult<()> {
    let index = "conf_idem_block";
    store.create_index(index, Family::Block).await?;

    assert_eq!(store.insert(&block_doc(7), index, false).await?, 1);
    let second = store.insert(&block_doc(7), index, false).await?;
    assert_eq!(second, 0, "duplicate insert must be dropped");
    assert_eq!(store.count(&QueryParams::new(index, "no")).await?, 1);
    Ok(())
}

/// Upsert replaces the document under the same natural id.
pub async fn test_upsert_replaces<S: Store>(store: &S) -> StoreResult<()> {
    let index = "conf_upsert_name";
    store.create_index(index, Family::Name).await?;

    store.insert(&name_doc("alice", 10, "Am1"), index, true).await?;
    store.insert(&name_doc("alice", 10, "Am2"), index, true).await?;

    assert_eq!(store.count(&QueryParams::new(index, "blockno")).await?, 1);
    let doc = store.select_one(&QueryParams::new(index, "blockno")).await?.unwrap();
    assert_eq!(doc["address"], "Am2");
    Ok(())
}

/// Batches flush every document; counts honor range filters.
pub async fn test_batch_and_count<S: Store>(store: &S) -> StoreResult<()> {
    let index = "conf_batch_block";
    store.create_index(index, Family::Block).await?;

    let docs: Vec<_> = (0..25).map(block_doc).collect();
    assert_eq!(store.insert_batch(&docs, index, false).await?, 25);
    assert_eq!(store.count(&QueryParams::new(index, "no")).await?, 25);

    let ranged = QueryParams::new(index, "no").range(IntegerRange::new("no", 10, 14));
    assert_eq!(store.count(&ranged).await?, 5);

    let missing = QueryParams::new(index, "no").range(IntegerRange::new("no", 100, 200));
    assert_eq!(store.count(&missing).await?, 0);
    Ok(())
}

/// `select_one` returns the extremum of the sort field.
pub async fn test_select_one_ordering<S: Store>(store: &S) -> StoreResult<()> {
    let index = "conf_order_block";
    store.create_index(index, Family::Block).await?;
    assert!(store.select_one(&QueryParams::new(index, "no")).await?.is_none());

    for no in [3u64, 9, 1, 6] {
        store.insert(&block_doc(no), index, false).await?;
    }

    let best = store.select_one(&QueryParams::new(index, "no")).await?.unwrap();
    assert_eq!(best["no"].as_u64(), Some(9));
    assert_eq!(best["id"], "blockhash9");

    let first = store.select_one(&QueryParams::new(index, "no").ascending()).await?.unwrap();
    assert_eq!(first["no"].as_u64(), Some(1));
    Ok(())
}

/// Range deletes remove exactly the covered documents.
pub async fn test_delete_range<S: Store>(store: &S) -> StoreResult<()> {
    let index = "conf_delete_block";
    store.create_index(index, Family::Block).await?;
    let docs: Vec<_> = (1..=10).map(block_doc).collect();
    store.insert_batch(&docs, index, false).await?;

    let deleted = store.delete_range(index, IntegerRange::new("no", 4, 7)).await?;
    assert_eq!(deleted, 4);
    assert_eq!(store.count(&QueryParams::new(index, "no")).await?, 6);
    let gone = QueryParams::new(index, "no").range(IntegerRange::new("no", 4, 7));
    assert_eq!(store.count(&gone).await?, 0);

    // Deleting an empty range is a no-op.
    assert_eq!(store.delete_range(index, IntegerRange::new("no", 4, 7)).await?, 0);
    Ok(())
}

/// Scrolls visit every document in sort order across page boundaries.
pub async fn test_scroll<S: Store>(store: &S) -> StoreResult<()> {
    let index = "conf_scroll_block";
    store.create_index(index, Family::Block).await?;
    let docs: Vec<_> = (0..7).map(block_doc).collect();
    store.insert_batch(&docs, index, false).await?;

    let params = QueryParams::new(index, "no").ascending().page_size(3);
    let mut scroll = store.scroll(params).await?;
    let mut seen = Vec::new();
    while let Some(doc) = scroll.next().await? {
        seen.push(doc["no"].as_u64().unwrap());
    }
    assert_eq!(seen, (0..7).collect::<Vec<_>>());
    Ok(())
}
