//! Integration tests for the persistence layer

use std::{collections::BTreeSet, time::Duration};

use alloy::primitives::U256;
use blockassist::{
    models::{BlockCursor, Transaction},
    persistence::{
        SqliteStore,
        traits::{CacheStore, DocumentStore},
    },
};
use tempfile::tempdir;

async fn open(url: &str) -> SqliteStore {
    let store = SqliteStore::new(url).await.expect("Failed to open database");
    store.run_migrations().await.expect("Failed to run migrations");
    store
}

fn transaction(hash: &str) -> Transaction {
    Transaction {
        hash: hash.to_string(),
        from: "0x1".into(),
        to: "0x2".into(),
        value: U256::from(1u64),
        block_number: 9,
        addresses: BTreeSet::from(["0x1".to_string(), "0x2".to_string()]),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let dir = tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("blockassist.db").display());

    let store = open(&url).await;
    store.set_cursor("development", &BlockCursor::now(77)).await.unwrap();
    store.upsert_transactions("development", &[transaction("0xa")]).await.unwrap();
    store.add_subscribed_address("development", "0x2").await.unwrap();
    store.set("last-block-num", "77", None).await.unwrap();
    store.close().await;

    let reopened = open(&url).await;
    let cursor = reopened.get_cursor("development").await.unwrap().unwrap();
    assert_eq!(cursor.last_block_number, 77);
    assert_eq!(reopened.get_transaction("development", "0xa").await.unwrap(), Some(transaction("0xa")));
    assert_eq!(reopened.subscribed_addresses("development").await.unwrap(), vec!["0x2"]);
    assert_eq!(reopened.get("last-block-num").await.unwrap().as_deref(), Some("77"));
}

#[tokio::test]
async fn test_expired_entries_are_invisible_and_purged() {
    let store = open("sqlite::memory:").await;
    store.set("internal-1", "[]", Some(Duration::from_millis(1))).await.unwrap();
    store.set("internal-2", "[]", None).await.unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(store.get("internal-1").await.unwrap(), None);
    assert_eq!(store.keys_with_prefix("internal-").await.unwrap(), vec!["internal-2"]);
    assert_eq!(store.purge_expired().await.unwrap(), 1);
}

#[tokio::test]
async fn test_environments_are_isolated() {
    let store = open("sqlite::memory:").await;
    store.upsert_transactions("development", &[transaction("0xa")]).await.unwrap();
    store.set_cursor("production", &BlockCursor::now(5)).await.unwrap();

    assert!(store.get_transaction("production", "0xa").await.unwrap().is_none());
    assert!(store.get_cursor("development").await.unwrap().is_none());
}
