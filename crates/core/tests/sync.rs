//! End-to-end synchronizer scenarios over the in-memory store and a
//! scripted node.

use aergo_index_core::{Indexer, SyncConfig, SyncState};
use aergo_index_store::{
    mem::MemStore, BlockDocument, Family, IntegerRange, QueryParams, Store, TxDocument,
};
use aergo_index_types::mock::{test_block, test_fork_block, test_name_tx, test_tx, MockNode};
use std::{future::Future, time::Duration};

async fn wait_until<F, Fut>(what: &str, mut cond: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let waited = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if cond().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}

async fn count(store: &MemStore, index: &str) -> u64 {
    store.count(&QueryParams::new(index, "no")).await.unwrap_or(0)
}

async fn count_range(store: &MemStore, index: &str, field: &'static str, min: u64, max: u64) -> u64 {
    let params = QueryParams::new(index, field).range(IntegerRange::new(field, min, max));
    store.count(&params).await.unwrap_or(0)
}

#[tokio::test]
async fn s1_cold_start() {
    let store = MemStore::new();
    let node = MockNode::new();
    let handle =
        Indexer::new(store.clone(), node.clone(), SyncConfig::default()).start().await.unwrap();

    node.push_block(test_block(0, vec![]));
    let expected = test_block(0, vec![]).hash_b58();
    wait_until("block 0 indexed", || {
        let store = store.clone();
        let expected = expected.clone();
        async move {
            match store.select_one(&QueryParams::new("chain_block", "no")).await {
                Ok(Some(best)) => {
                    best["no"].as_u64() == Some(0)
                        && best["id"].as_str() == Some(expected.as_str())
                }
                _ => false,
            }
        }
    })
    .await;

    handle.stop();
}

#[tokio::test]
async fn s2_gap_is_backfilled() {
    let store = MemStore::new();
    let node = MockNode::new();
    for no in 0..=9 {
        node.put_block(test_block(no, vec![]));
    }
    let handle =
        Indexer::new(store.clone(), node.clone(), SyncConfig::default()).start().await.unwrap();

    node.push_block(test_block(10, vec![test_tx(1), test_tx(2)]));
    wait_until("blocks 0..=10 indexed", || {
        let store = store.clone();
        async move { count(&store, "chain_block").await == 11 }
    })
    .await;
    wait_until("txs indexed", || {
        let store = store.clone();
        async move { count(&store, "chain_tx").await == 2 }
    })
    .await;

    for height in 0..=10 {
        assert_eq!(
            count_range(&store, "chain_block", "no", height, height).await,
            1,
            "height {height} missing"
        );
    }

    handle.stop();
}

#[tokio::test]
async fn s3_rewind_erases_reorged_range() {
    let store = MemStore::new();
    let node = MockNode::new();
    // A consistent live generation covering 0..=9, so startup finds an
    // up-to-date store and seeds the tip at 9.
    for family in Family::ALL {
        let index = family.index_name("chain_p0_");
        store.create_index(&index, family).await.unwrap();
        store.update_alias(&family.index_name("chain_"), &index).await.unwrap();
    }
    for no in 0..=9 {
        let txs = if no == 9 { vec![test_tx(9)] } else { vec![] };
        let block = test_block(no, txs);
        store
            .insert(&BlockDocument::from_chain(&block), "chain_p0_block", false)
            .await
            .unwrap();
        for tx in &block.body.txs {
            store
                .insert(&TxDocument::from_chain(tx, &block), "chain_p0_tx", false)
                .await
                .unwrap();
        }
        node.put_block(block);
    }
    let handle =
        Indexer::new(store.clone(), node.clone(), SyncConfig::default()).start().await.unwrap();

    node.push_block(test_block(10, vec![test_tx(10)]));
    wait_until("blocks 0..=10 indexed", || {
        let store = store.clone();
        async move {
            count(&store, "chain_block").await == 11 && count(&store, "chain_tx").await == 2
        }
    })
    .await;

    // The chain rewinds to a different block at height 8.
    let fork = test_fork_block(8, vec![]);
    let fork_hash = fork.hash_b58();
    node.push_block(fork);

    wait_until("rewound range erased", || {
        let store = store.clone();
        async move {
            count_range(&store, "chain_block", "no", 9, 10).await == 0
                && count_range(&store, "chain_tx", "blockno", 8, 10).await == 0
                && count_range(&store, "chain_block", "no", 8, 8).await == 1
        }
    })
    .await;

    let at_8 = store
        .select_one(&QueryParams::new("chain_block", "no").range(IntegerRange::new("no", 8, 8)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(at_8["id"].as_str(), Some(fork_hash.as_str()));
    assert_eq!(count(&store, "chain_block").await, 9);

    handle.stop();
}

#[tokio::test]
async fn s4_reindex_cutover_swaps_aliases() {
    let store = MemStore::new();
    // A live generation under the "old" prefix, populated with history.
    for family in Family::ALL {
        let index = family.index_name("chain_old_");
        store.create_index(&index, family).await.unwrap();
        store.update_alias(&family.index_name("chain_"), &index).await.unwrap();
    }
    let node = MockNode::new();
    for no in 0..=3 {
        let block = test_block(no, vec![]);
        let doc = BlockDocument::from_chain(&block);
        store.insert(&doc, "chain_old_block", false).await.unwrap();
        node.put_block(block);
    }

    let cfg = SyncConfig { reindex: true, ..Default::default() };
    let handle = Indexer::new(store.clone(), node.clone(), cfg).start().await.unwrap();

    wait_until("aliases cut over", || {
        let store = store.clone();
        async move {
            for family in Family::ALL {
                let old = family.index_name("chain_old_");
                let target = store.alias_target(&family.index_name("chain_")).await;
                if target.as_deref() == Some(old.as_str()) {
                    return false;
                }
            }
            true
        }
    })
    .await;

    let target = store.alias_target("chain_block").await.unwrap();
    let prefix = target.strip_suffix("block").unwrap().to_owned();
    assert_ne!(prefix, "chain_old_");
    for family in Family::ALL {
        assert_eq!(
            store.alias_target(&family.index_name("chain_")).await,
            Some(family.index_name(&prefix)),
            "{family} alias not cut over"
        );
    }

    // The fresh generation holds the full history; the old one is kept.
    wait_until("history rebuilt", || {
        let store = store.clone();
        async move { count(&store, "chain_block").await == 4 }
    })
    .await;
    assert_eq!(count(&store, "chain_old_block").await, 4);

    handle.stop();
}

#[tokio::test(start_paused = true)]
async fn s5_stream_drop_reconnects() {
    let store = MemStore::new();
    let node = MockNode::new();
    let handle =
        Indexer::new(store.clone(), node.clone(), SyncConfig::default()).start().await.unwrap();

    node.push_block(test_block(0, vec![]));
    wait_until("block 0 indexed", || {
        let store = store.clone();
        async move { count(&store, "chain_block").await == 1 }
    })
    .await;

    node.end_streams();
    wait_until("restarting", || {
        let handle = handle.clone();
        async move { handle.state() == SyncState::Restarting }
    })
    .await;
    wait_until("running again", || {
        let handle = handle.clone();
        async move { handle.state() == SyncState::Running }
    })
    .await;

    // Tip state survived the reconnect: the next block is a continuation.
    node.push_block(test_block(1, vec![]));
    wait_until("block 1 indexed", || {
        let store = store.clone();
        async move { count(&store, "chain_block").await == 2 }
    })
    .await;
    assert_eq!(count_range(&store, "chain_block", "no", 0, 0).await, 1);

    handle.stop();
}

#[tokio::test]
async fn s6_name_tx_routing() {
    let store = MemStore::new();
    let node = MockNode::new();
    let handle =
        Indexer::new(store.clone(), node.clone(), SyncConfig::default()).start().await.unwrap();

    node.push_block(test_block(0, vec![]));
    wait_until("genesis indexed", || {
        let store = store.clone();
        async move { count(&store, "chain_block").await == 1 }
    })
    .await;

    node.push_block(test_block(1, vec![test_tx(1), test_tx(2), test_name_tx(3, "somename")]));
    wait_until("txs and name indexed", || {
        let store = store.clone();
        async move {
            count(&store, "chain_tx").await == 3 && count(&store, "chain_name").await == 1
        }
    })
    .await;

    let name = store.select_one(&QueryParams::new("chain_name", "blockno")).await.unwrap().unwrap();
    assert_eq!(name["name"], "somename");
    assert_eq!(name["update_block"].as_u64(), Some(1));

    handle.stop();
}

#[tokio::test]
async fn indexing_the_same_block_twice_is_idempotent() {
    let store = MemStore::new();
    let node = MockNode::new();
    let handle =
        Indexer::new(store.clone(), node.clone(), SyncConfig::default()).start().await.unwrap();

    node.push_block(test_block(0, vec![]));
    let repeated = test_block(1, vec![test_tx(1)]);
    node.push_block(repeated.clone());
    wait_until("first pass indexed", || {
        let store = store.clone();
        async move {
            count(&store, "chain_block").await == 2 && count(&store, "chain_tx").await == 1
        }
    })
    .await;

    // Duplicate delivery of the tip block, then a sentinel continuation.
    // The stream loop is sequential, so once the sentinel is indexed the
    // duplicate's rewind has fully run.
    node.push_block(repeated);
    node.push_block(test_block(2, vec![]));
    wait_until("second pass settled", || {
        let store = store.clone();
        async move {
            count(&store, "chain_block").await == 3
                && count(&store, "chain_tx").await == 1
                && count_range(&store, "chain_block", "no", 1, 1).await == 1
        }
    })
    .await;

    // Counts did not grow on the second pass.
    assert_eq!(count(&store, "chain_block").await, 3);
    assert_eq!(count_range(&store, "chain_tx", "blockno", 1, 1).await, 1);

    handle.stop();
}

#[tokio::test]
async fn fetch_failures_are_skipped_during_backfill() {
    let store = MemStore::new();
    let node = MockNode::new();
    for no in 0..=4 {
        node.put_block(test_block(no, vec![]));
    }
    node.fail_height(3);
    let handle =
        Indexer::new(store.clone(), node.clone(), SyncConfig::default()).start().await.unwrap();

    node.push_block(test_block(5, vec![]));
    wait_until("reachable blocks indexed", || {
        let store = store.clone();
        async move { count(&store, "chain_block").await == 5 }
    })
    .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The failing height is skipped, everything else lands.
    assert_eq!(count_range(&store, "chain_block", "no", 3, 3).await, 0);
    for height in [0, 1, 2, 4, 5] {
        assert_eq!(count_range(&store, "chain_block", "no", height, height).await, 1);
    }

    handle.stop();
}

#[tokio::test]
async fn reindex_of_empty_chain_completes_immediately() {
    let store = MemStore::new();
    let node = MockNode::new();
    let cfg = SyncConfig { reindex: true, exit_on_complete: true, ..Default::default() };
    let mut handle = Indexer::new(store.clone(), node, cfg).start().await.unwrap();

    tokio::time::timeout(Duration::from_secs(10), handle.wait_stopped())
        .await
        .expect("indexer did not stop");
    assert_eq!(handle.state(), SyncState::Stopped);
    // Cutover ran: the aliases point at the fresh generation.
    assert!(store.alias_target("chain_block").await.is_some());
}

#[tokio::test]
async fn restart_adopts_existing_alias_and_tip() {
    let store = MemStore::new();
    let node = MockNode::new();
    for no in 0..=1 {
        node.put_block(test_block(no, vec![]));
    }

    let mut handle =
        Indexer::new(store.clone(), node.clone(), SyncConfig::default()).start().await.unwrap();
    node.push_block(test_block(2, vec![]));
    wait_until("first run indexed 0..=2", || {
        let store = store.clone();
        async move { count(&store, "chain_block").await == 3 }
    })
    .await;
    handle.stop();
    tokio::time::timeout(Duration::from_secs(10), handle.wait_stopped())
        .await
        .expect("first run did not stop");
    handle.drain().await;
    let indices_before = store.index_count().await;

    // Second run discovers the live alias and writes into the same
    // concrete indices instead of starting a new generation.
    let handle =
        Indexer::new(store.clone(), node.clone(), SyncConfig::default()).start().await.unwrap();
    node.push_block(test_block(3, vec![]));
    wait_until("second run continued the chain", || {
        let store = store.clone();
        async move { count(&store, "chain_block").await == 4 }
    })
    .await;
    assert_eq!(store.index_count().await, indices_before);

    handle.stop();
}
