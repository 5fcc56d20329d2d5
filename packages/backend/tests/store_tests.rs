use serde_json::json;

use savant_backend::store::{keys, SqliteStore, Store};

#[tokio::test]
async fn test_sqlite_memory_round_trip() {
    let store = SqliteStore::connect("sqlite::memory:").await.unwrap();

    assert_eq!(store.load("graph:x").await.unwrap(), None);

    store.save("graph:x", &json!({"id": "x"})).await.unwrap();
    assert_eq!(store.load("graph:x").await.unwrap(), Some(json!({"id": "x"})));

    store.save("graph:x", &json!({"id": "x", "title": "updated"})).await.unwrap();
    assert_eq!(
        store.load("graph:x").await.unwrap(),
        Some(json!({"id": "x", "title": "updated"}))
    );
    assert!(store.ping().await);
}

#[tokio::test]
async fn test_sqlite_invalid_json_is_absent() {
    let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
    store.save_raw("graph:x:items", "[{broken").await.unwrap();
    assert_eq!(store.load("graph:x:items").await.unwrap(), None);
}

#[tokio::test]
async fn test_sqlite_batch_upserts_in_one_transaction() {
    let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
    store.save(&keys::items("bio"), &json!([])).await.unwrap();

    store
        .save_batch(&[
            (keys::items("bio"), json!([{"id": "c1"}])),
            (keys::progress("bio"), json!({"level": 2})),
        ])
        .await
        .unwrap();

    assert_eq!(store.load(&keys::items("bio")).await.unwrap(), Some(json!([{"id": "c1"}])));
    assert_eq!(store.load(&keys::progress("bio")).await.unwrap(), Some(json!({"level": 2})));
}

#[tokio::test]
async fn test_sqlite_file_survives_reconnect() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("savant.db").display());

    {
        let store = SqliteStore::connect(&url).await.unwrap();
        store.save(&keys::progress("bio"), &json!({"level": 3})).await.unwrap();
    }

    let store = SqliteStore::connect(&url).await.unwrap();
    assert_eq!(
        store.load(&keys::progress("bio")).await.unwrap(),
        Some(json!({"level": 3}))
    );
}

#[tokio::test]
async fn test_store_connect_selects_backend() {
    let memory = Store::connect(None).await.unwrap();
    assert_eq!(memory.backend_name(), "memory");

    let sqlite = Store::connect(Some("sqlite::memory:")).await.unwrap();
    assert_eq!(sqlite.backend_name(), "sqlite");

    for store in [memory, sqlite] {
        store.save("k", &json!([1, 2])).await.unwrap();
        assert_eq!(store.load("k").await.unwrap(), Some(json!([1, 2])));
    }
}
