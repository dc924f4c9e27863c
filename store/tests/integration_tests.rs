//! Integration tests for the DocumentStore implementations

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::json;
use store::{
    load_typed, save_typed, Collection, DocumentStore, FileStore, MemoryStore, NoopStore,
    SqliteStore, StoreConfig, StoreError, StoreLocation,
};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Vault {
    name: String,
    credits: u64,
}

fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("store-test-{}", Uuid::new_v4()))
}

/// Shared contract every store must honor
async fn exercise_store(store: &dyn DocumentStore) {
    assert!(store.list_ids(Collection::Heist).await.unwrap().is_empty());
    assert!(store.load(Collection::Heist, "1").await.unwrap().is_none());

    store
        .save(Collection::Heist, "2", &json!({"crew": [1, 2]}))
        .await
        .unwrap();
    store
        .save(Collection::Heist, "1", &json!({"crew": []}))
        .await
        .unwrap();
    store
        .save(Collection::Race, "1", &json!({"last_race_ended": null}))
        .await
        .unwrap();

    assert_eq!(store.list_ids(Collection::Heist).await.unwrap(), vec!["1", "2"]);
    assert_eq!(store.list_ids(Collection::Race).await.unwrap(), vec!["1"]);

    // upsert replaces the document
    store
        .save(Collection::Heist, "2", &json!({"crew": [3]}))
        .await
        .unwrap();
    assert_eq!(
        store.load(Collection::Heist, "2").await.unwrap(),
        Some(json!({"crew": [3]}))
    );

    let vault = Vault {
        name: "Bank".to_string(),
        credits: 9000,
    };
    save_typed(store, Collection::Economy, "42", &vault).await.unwrap();
    let loaded: Option<Vault> = load_typed(store, Collection::Economy, "42").await.unwrap();
    assert_eq!(loaded, Some(vault));

    let err = store
        .save(Collection::Heist, "../escape", &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidId(_)));
}

#[tokio::test]
async fn test_memory_store_contract() {
    let store = MemoryStore::new();
    exercise_store(&store).await;
    assert_eq!(store.save_count(), 5);
}

#[tokio::test]
async fn test_memory_store_can_fail_on_demand() {
    let store = MemoryStore::new();
    store.set_failing(true);
    let err = store
        .save(Collection::Economy, "1", &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));
    store.set_failing(false);
    store.save(Collection::Economy, "1", &json!({})).await.unwrap();
}

#[tokio::test]
async fn test_file_store_contract() {
    let dir = scratch_dir();
    let store = FileStore::new(&dir);
    exercise_store(&store).await;

    assert!(dir.join("heist").join("2.json").exists());
    // a fresh store over the same directory sees the same documents
    let reopened = FileStore::new(&dir);
    assert_eq!(
        reopened.load(Collection::Heist, "2").await.unwrap(),
        Some(json!({"crew": [3]}))
    );

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

#[tokio::test]
async fn test_file_store_ignores_stray_files() {
    let dir = scratch_dir();
    tokio::fs::create_dir_all(dir.join("theme")).await.unwrap();
    tokio::fs::write(dir.join("theme").join("notes.txt"), "hello")
        .await
        .unwrap();
    let store = FileStore::new(&dir);
    assert!(store.list_ids(Collection::Theme).await.unwrap().is_empty());
    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

#[tokio::test]
async fn test_file_store_rejects_corrupt_documents() {
    let dir = scratch_dir();
    tokio::fs::create_dir_all(dir.join("mode")).await.unwrap();
    tokio::fs::write(dir.join("mode").join("clash.json"), "{not json")
        .await
        .unwrap();
    let store = FileStore::new(&dir);
    let err = store.load(Collection::Mode, "clash").await.unwrap_err();
    assert!(matches!(err, StoreError::Serialization(_)));
    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

#[tokio::test]
async fn test_sqlite_store_contract() {
    let store = SqliteStore::connect("sqlite::memory:", 5)
        .await
        .expect("Failed to connect");
    exercise_store(&store).await;
}

#[tokio::test]
async fn test_noop_store_forgets_everything() {
    let store = NoopStore;
    store.save(Collection::Heist, "1", &json!({})).await.unwrap();
    assert!(store.load(Collection::Heist, "1").await.unwrap().is_none());
    assert!(store.list_ids(Collection::Heist).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_config_opens_requested_store() {
    let config = StoreConfig {
        location: StoreLocation::Memory,
        pool_size: 1,
    };
    let store = config.open().await.unwrap();
    store.save(Collection::Race, "7", &json!({"x": 1})).await.unwrap();
    assert_eq!(store.list_ids(Collection::Race).await.unwrap(), vec!["7"]);

    let sqlite = StoreConfig {
        location: StoreLocation::Sqlite("sqlite::memory:".to_string()),
        pool_size: 4,
    };
    let store = sqlite.open().await.unwrap();
    assert!(store.load(Collection::Race, "7").await.unwrap().is_none());
}
