//! Conformance tests every storage backend has to pass.

use fieldbook::backend::{KeyRange, TransactionMode, database::InMemory};

use super::helpers::*;

fn tables(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[tokio::test]
async fn test_committed_writes_are_visible() {
    for (name, backend) in all_backends().await {
        let mut txn = backend
            .begin(&tables(&["a", "b"]), TransactionMode::ReadWrite)
            .await
            .unwrap();
        txn.put("a", "k1", "\"one\"".to_string()).await.unwrap();
        txn.put("b", "k1", "\"other\"".to_string()).await.unwrap();
        txn.commit().await.unwrap();

        let mut read = backend
            .begin(&tables(&["a", "b"]), TransactionMode::ReadOnly)
            .await
            .unwrap();
        assert_eq!(
            read.get("a", "k1").await.unwrap().as_deref(),
            Some("\"one\""),
            "{name}"
        );
        assert_eq!(
            read.get("b", "k1").await.unwrap().as_deref(),
            Some("\"other\""),
            "{name}"
        );
        assert_eq!(read.get("a", "missing").await.unwrap(), None, "{name}");
        read.commit().await.unwrap();
    }
}

#[tokio::test]
async fn test_rollback_discards_writes() {
    for (name, backend) in all_backends().await {
        let mut txn = backend
            .begin(&tables(&["a"]), TransactionMode::ReadWrite)
            .await
            .unwrap();
        txn.put("a", "kept", "1".to_string()).await.unwrap();
        txn.commit().await.unwrap();

        let mut txn = backend
            .begin(&tables(&["a"]), TransactionMode::ReadWrite)
            .await
            .unwrap();
        txn.put("a", "dropped", "2".to_string()).await.unwrap();
        txn.delete("a", "kept").await.unwrap();
        // Reads inside the transaction see its own writes.
        assert_eq!(txn.get("a", "dropped").await.unwrap().as_deref(), Some("2"));
        assert_eq!(txn.get("a", "kept").await.unwrap(), None);
        txn.rollback().await.unwrap();

        let mut read = backend
            .begin(&tables(&["a"]), TransactionMode::ReadOnly)
            .await
            .unwrap();
        assert_eq!(read.get("a", "dropped").await.unwrap(), None, "{name}");
        assert_eq!(read.get("a", "kept").await.unwrap().as_deref(), Some("1"), "{name}");
        read.rollback().await.unwrap();
    }
}

#[tokio::test]
async fn test_rollback_restores_range_deletes() {
    for (name, backend) in all_backends().await {
        let mut txn = backend
            .begin(&tables(&["a"]), TransactionMode::ReadWrite)
            .await
            .unwrap();
        for key in ["k1", "k2", "k3", "k4"] {
            txn.put("a", key, key.to_string()).await.unwrap();
        }
        txn.commit().await.unwrap();

        let mut txn = backend
            .begin(&tables(&["a"]), TransactionMode::ReadWrite)
            .await
            .unwrap();
        txn.delete_range("a", &KeyRange::half_open("k2", "k4")).await.unwrap();
        txn.put("a", "k2", "again".to_string()).await.unwrap();
        txn.delete_range("a", &KeyRange::all()).await.unwrap();
        assert!(txn.keys("a", &KeyRange::all()).await.unwrap().is_empty(), "{name}");
        txn.rollback().await.unwrap();

        let mut read = backend
            .begin(&tables(&["a"]), TransactionMode::ReadOnly)
            .await
            .unwrap();
        let rows = read.range("a", &KeyRange::all()).await.unwrap();
        let expected: Vec<(String, String)> = ["k1", "k2", "k3", "k4"]
            .iter()
            .map(|k| (k.to_string(), k.to_string()))
            .collect();
        assert_eq!(rows, expected, "{name}");
        read.rollback().await.unwrap();
    }
}

#[tokio::test]
async fn test_ranges_are_sorted_and_bounded() {
    for (name, backend) in all_backends().await {
        let mut txn = backend
            .begin(&tables(&["t"]), TransactionMode::ReadWrite)
            .await
            .unwrap();
        for key in ["s:3", "s:1", "s2:1", "s:2", "r:9"] {
            txn.put("t", key, format!("\"{key}\"")).await.unwrap();
        }

        let range = KeyRange::half_open("s:", "s;");
        let keys = txn.keys("t", &range).await.unwrap();
        assert_eq!(keys, vec!["s:1", "s:2", "s:3"], "{name}");

        let rows = txn.range("t", &KeyRange::bound("s:1", "s:3", true, false)).await.unwrap();
        let keys: Vec<&str> = rows.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["s:2", "s:3"], "{name}");
        assert_eq!(rows[0].1, "\"s:2\"", "{name}");

        let everything = txn.keys("t", &KeyRange::all()).await.unwrap();
        assert_eq!(everything.len(), 5, "{name}");

        txn.delete_range("t", &range).await.unwrap();
        let left = txn.keys("t", &KeyRange::all()).await.unwrap();
        assert_eq!(left, vec!["r:9", "s2:1"], "{name}");
        txn.commit().await.unwrap();
    }
}

#[tokio::test]
async fn test_empty_range_matches_nothing() {
    for (name, backend) in all_backends().await {
        let mut txn = backend
            .begin(&tables(&["t"]), TransactionMode::ReadWrite)
            .await
            .unwrap();
        txn.put("t", "m", "1".to_string()).await.unwrap();
        let rows = txn.range("t", &KeyRange::half_open("z", "a")).await.unwrap();
        assert!(rows.is_empty(), "{name}");
        txn.delete_range("t", &KeyRange::half_open("z", "a")).await.unwrap();
        assert_eq!(txn.keys("t", &KeyRange::all()).await.unwrap(), vec!["m"], "{name}");
        txn.commit().await.unwrap();
    }
}

#[tokio::test]
async fn test_tables_outside_scope_are_rejected() {
    for (name, backend) in all_backends().await {
        let mut txn = backend
            .begin(&tables(&["a"]), TransactionMode::ReadWrite)
            .await
            .unwrap();
        let err = txn.get("b", "k").await.unwrap_err();
        assert!(err.is_backend_error(), "{name}");
        assert!(err.is_validation_error(), "{name}");
        txn.rollback().await.unwrap();
    }
}

#[tokio::test]
async fn test_read_only_transactions_refuse_writes() {
    for (name, backend) in all_backends().await {
        let mut txn = backend
            .begin(&tables(&["a"]), TransactionMode::ReadOnly)
            .await
            .unwrap();
        let err = txn.put("a", "k", "1".to_string()).await.unwrap_err();
        assert!(err.is_validation_error(), "{name}");
        let err = txn.delete_range("a", &KeyRange::all()).await.unwrap_err();
        assert!(err.is_validation_error(), "{name}");
        txn.rollback().await.unwrap();
    }
}

#[tokio::test]
async fn test_in_memory_survives_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fieldbook.json");

    let backend = InMemory::new();
    let queue = fieldbook::Queue::with_backend(backend.clone());
    queue.save("rec_entries", "survey:1", &"first").await.unwrap();
    queue.save("rec_data", "survey:1", &"blob").await.unwrap();
    backend.save_to_file(&path).await.unwrap();

    let loaded = InMemory::load_from_file(&path).await.unwrap();
    assert_eq!(loaded.table_names().await, vec!["rec_data", "rec_entries"]);
    let queue = fieldbook::Queue::with_backend(loaded);
    let value: Option<String> = queue.load("rec_entries", "survey:1").await.unwrap();
    assert_eq!(value.as_deref(), Some("first"));
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_sqlite_file_survives_reopen() {
    use fieldbook::backend::database::Sqlite;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fieldbook.db");

    {
        let queue = fieldbook::Queue::with_backend(Sqlite::open(&path).await.unwrap());
        queue.save("rec_entries", "survey:1", &42).await.unwrap();
    }

    let queue = fieldbook::Queue::with_backend(Sqlite::open(&path).await.unwrap());
    assert_eq!(queue.load::<i32>("rec_entries", "survey:1").await.unwrap(), Some(42));
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn test_sqlite_refuses_newer_schema() {
    use fieldbook::backend::database::Sqlite;
    use fieldbook::backend::database::sql::schema::SCHEMA_VERSION;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fieldbook.db");

    {
        let backend = Sqlite::open(&path).await.unwrap();
        sqlx::query("UPDATE schema_version SET version = $1")
            .bind(SCHEMA_VERSION + 1)
            .execute(backend.pool())
            .await
            .unwrap();
    }

    let err = Sqlite::open(&path).await.unwrap_err();
    assert!(err.is_backend_error());

    // The stored version is left alone.
    let url = format!("sqlite:{}", path.display());
    sqlx::any::install_default_drivers();
    let pool = sqlx::AnyPool::connect(&url).await.unwrap();
    let (version,): (i64,) = sqlx::query_as("SELECT version FROM schema_version")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(version, SCHEMA_VERSION + 1);
}
