use fieldbook::{
    Clock, RecordId,
    constants::{RECORD_DATA, RECORD_ENTRIES},
    repository::VariableInfo,
};
use serde_json::{Map, Value, json};

use super::helpers::*;

fn values(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

fn variables(keys: &[&str]) -> Vec<VariableInfo> {
    keys.iter().map(|k| VariableInfo::new(*k)).collect()
}

#[tokio::test]
async fn test_save_and_load_record() {
    let (repository, clock) = test_repository().await;

    let mut record = repository.create("survey").unwrap();
    assert!(record.is_new());
    record.values = values(json!({"name": "Ana", "age": 34}));
    record.summary = Some("Ana, 34".into());

    let saved = repository
        .save(&record, &variables(&["name", "age"]))
        .await
        .unwrap();
    assert_eq!(saved.version, 1);
    assert_eq!(saved.ctime.as_deref(), Some(clock.now_rfc3339().as_str()));
    assert_eq!(saved.ctime, saved.mtime);

    let loaded = repository.load("survey", &record.id).await.unwrap().unwrap();
    assert_eq!(loaded, saved);
    assert_eq!(loaded.values["name"], "Ana");
}

#[tokio::test]
async fn test_resave_bumps_version_and_keeps_ctime() {
    let (repository, clock) = test_repository().await;

    let mut record = repository.create("survey").unwrap();
    record.values = values(json!({"name": "Ana"}));
    let first = repository.save(&record, &variables(&["name"])).await.unwrap();

    clock.advance(60_000);
    let second = repository.save(&first, &variables(&["name"])).await.unwrap();
    assert_eq!(second.version, 2);
    assert_eq!(second.ctime, first.ctime);
    assert_ne!(second.mtime, first.mtime);
    assert_eq!(second.mtime.as_deref(), Some(clock.now_rfc3339().as_str()));
}

#[tokio::test]
async fn test_save_merges_with_stored_values() {
    let (repository, _clock) = test_repository().await;

    let mut record = repository.create("survey").unwrap();
    record.values = values(json!({"a": 1, "b": 2}));
    let saved = repository.save(&record, &variables(&["a", "b"])).await.unwrap();

    // A partial save only overwrites what it carries.
    let mut partial = saved.clone();
    partial.values = values(json!({"b": 3}));
    let merged = repository.save(&partial, &variables(&["a", "b"])).await.unwrap();
    assert_eq!(merged.values, values(json!({"a": 1, "b": 3})));
}

#[tokio::test]
async fn test_missing_variables_are_dropped() {
    let (repository, _clock) = test_repository().await;

    let mut record = repository.create("survey").unwrap();
    record.values = values(json!({"a": 1, "b": 2, "c": 3}));
    let saved = repository
        .save(&record, &variables(&["a", "b", "c"]))
        .await
        .unwrap();

    let form = vec![
        VariableInfo::new("a"),
        VariableInfo::new("b").missing(),
        VariableInfo::new("c"),
    ];
    let resaved = repository.save(&saved, &form).await.unwrap();
    assert_eq!(resaved.values, values(json!({"a": 1, "c": 3})));

    let loaded = repository.load("survey", &saved.id).await.unwrap().unwrap();
    assert!(!loaded.values.contains_key("b"));
}

#[tokio::test]
async fn test_load_all_returns_records_oldest_first() {
    let (repository, clock) = test_repository().await;

    let mut ids = Vec::new();
    for i in 0..60 {
        let mut record = repository.create("survey").unwrap();
        record.values = values(json!({ "n": i }));
        repository.save(&record, &variables(&["n"])).await.unwrap();
        ids.push(record.id);
        if i % 7 == 0 {
            clock.advance(1);
        }
    }

    let records = repository.load_all("survey").await.unwrap();
    assert_eq!(records.len(), 60);
    let listed: Vec<RecordId> = records.iter().map(|r| r.id.clone()).collect();
    assert_eq!(listed, ids);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.values["n"], json!(i));
    }
}

#[tokio::test]
async fn test_load_missing_record() {
    let (repository, _clock) = test_repository().await;
    let id = RecordId::from("01J0000000000000000000000");
    assert!(repository.load("survey", &id).await.unwrap().is_none());
    assert!(repository.load_all("survey").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_record_without_blob() {
    let (repository, _clock) = test_repository().await;
    repository
        .queue()
        .save(
            RECORD_ENTRIES,
            "survey:orphan",
            &json!({"id": "orphan", "table": "survey", "version": 1}),
        )
        .await
        .unwrap();

    // A half-written record cannot be opened, but it is still listed.
    let id = RecordId::from("orphan");
    assert!(repository.load("survey", &id).await.unwrap().is_none());
    let records = repository.load_all("survey").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "orphan");
    assert!(records[0].values.is_empty());
}

#[tokio::test]
async fn test_orphan_blobs_are_skipped() {
    let (repository, _clock) = test_repository().await;
    let mut record = repository.create("survey").unwrap();
    record.values = values(json!({"a": 1}));
    repository.save(&record, &variables(&["a"])).await.unwrap();
    repository
        .queue()
        .save(RECORD_DATA, "survey:0", &json!({"values": {"stray": true}}))
        .await
        .unwrap();

    let records = repository.load_all("survey").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, record.id);
    assert_eq!(records[0].values, values(json!({"a": 1})));
}

#[tokio::test]
async fn test_delete_removes_both_facets() {
    let (repository, _clock) = test_repository().await;
    let mut record = repository.create("survey").unwrap();
    record.values = values(json!({"a": 1}));
    repository.save(&record, &variables(&["a"])).await.unwrap();

    repository.delete("survey", &record.id).await.unwrap();
    assert!(repository.load("survey", &record.id).await.unwrap().is_none());
    let key = format!("survey:{}", record.id);
    let blob: Option<Value> = repository.queue().load(RECORD_DATA, &key).await.unwrap();
    assert!(blob.is_none());
}

#[tokio::test]
async fn test_clear_only_touches_its_table() {
    let (repository, _clock) = test_repository().await;

    for table in ["survey", "survey2", "surve"] {
        let mut record = repository.create(table).unwrap();
        record.values = values(json!({"q": table}));
        repository.save(&record, &variables(&["q"])).await.unwrap();
    }

    repository.clear("survey").await.unwrap();
    assert!(repository.load_all("survey").await.unwrap().is_empty());
    assert!(repository.list_variables("survey").await.unwrap().is_empty());

    for table in ["survey2", "surve"] {
        let records = repository.load_all(table).await.unwrap();
        assert_eq!(records.len(), 1, "{table}");
        assert_eq!(records[0].values["q"], table);
        assert_eq!(repository.list_variables(table).await.unwrap().len(), 1);
    }
}

#[tokio::test]
async fn test_invalid_tables_are_rejected() {
    let (repository, _clock) = test_repository().await;
    assert!(repository.create("").unwrap_err().is_validation_error());
    assert!(repository.create("a:b").unwrap_err().is_validation_error());
    assert!(
        repository
            .load_all("a:b")
            .await
            .unwrap_err()
            .is_validation_error()
    );
}

#[tokio::test]
async fn test_variable_descriptors_follow_latest_save() {
    let (repository, _clock) = test_repository().await;

    let mut record = repository.create("survey").unwrap();
    record.values = values(json!({"a": 1, "b": 2}));
    let form = vec![
        VariableInfo::new("a").group("intro").kind("integer"),
        VariableInfo::new("b").kind("select_multiple").multi(),
    ];
    let saved = repository.save(&record, &form).await.unwrap();

    let descriptors = repository.list_variables("survey").await.unwrap();
    assert_eq!(descriptors.len(), 2);
    assert_eq!(descriptors[0].key, "a");
    assert_eq!(descriptors[0].group.as_deref(), Some("intro"));
    assert_eq!(descriptors[0].after.as_deref(), Some("b"));
    assert_eq!(descriptors[1].before.as_deref(), Some("a"));
    assert!(descriptors[1].multi);

    // A question inserted between a and b.
    let revised = variables(&["a", "c", "b"]);
    repository.save(&saved, &revised).await.unwrap();
    assert_eq!(
        repository.ordered_variables("survey").await.unwrap(),
        vec!["a", "c", "b"]
    );
}

#[tokio::test]
async fn test_dropped_question_keeps_its_column() {
    let (repository, _clock) = test_repository().await;

    let mut record = repository.create("survey").unwrap();
    record.values = values(json!({"x": 1, "y": 2, "z": 3}));
    repository
        .save(&record, &variables(&["x", "y", "z"]))
        .await
        .unwrap();

    // A later form version no longer asks "y".
    let mut next = repository.create("survey").unwrap();
    next.values = values(json!({"x": 4, "z": 6}));
    repository.save(&next, &variables(&["x", "z"])).await.unwrap();

    assert_eq!(
        repository.ordered_variables("survey").await.unwrap(),
        vec!["x", "y", "z"]
    );
}
