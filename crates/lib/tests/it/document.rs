use fieldbook::document::{Document, Field, FormState};
use fieldbook::repository::VariableInfo;
use serde_json::{Value, json};

use super::helpers::*;

fn household() -> Value {
    json!({
        "site": {"name": "North", "gps": [51.5, -0.12]},
        "members": [
            {"name": "Ana", "age": 34},
            {"name": "Ben", "age": 8}
        ],
        "notes": "two storeys"
    })
}

#[test]
fn test_nested_edit_and_revert() {
    let mut doc = Document::wrap(household()).unwrap();
    let root = doc.root();
    let member = doc.node_at(&["members", "1"]).unwrap().unwrap();

    doc.set(member, "age", json!(9)).unwrap();
    assert!(doc.is_dirty(member, "age").unwrap());
    assert!(doc.has_changed(root).unwrap());
    let members = doc.child(root, "members").unwrap().unwrap();
    assert!(doc.has_changed(members).unwrap());
    // Only the scalar is dirty; containers above it are merely changed.
    assert!(doc.dirty_keys(root).unwrap().is_empty());

    doc.set(member, "age", json!(8)).unwrap();
    assert!(!doc.has_changed(members).unwrap());
    assert!(!doc.has_changed(root).unwrap());
    assert_eq!(doc.raw(), household());
}

#[test]
fn test_two_edits_need_two_reverts() {
    let mut doc = Document::wrap(household()).unwrap();
    let root = doc.root();
    let site = doc.child(root, "site").unwrap().unwrap();

    doc.set(site, "name", json!("South")).unwrap();
    doc.set(root, "notes", json!("one storey")).unwrap();
    doc.set(site, "name", json!("North")).unwrap();
    assert!(doc.has_changed(root).unwrap());
    assert_eq!(doc.dirty_keys(root).unwrap(), vec!["notes"]);

    doc.set(root, "notes", json!("two storeys")).unwrap();
    assert!(!doc.has_changed(root).unwrap());
}

#[test]
fn test_equal_container_is_not_a_change() {
    let mut doc = Document::wrap(household()).unwrap();
    let root = doc.root();

    doc.set(root, "site", json!({"name": "North", "gps": [51.5, -0.12]}))
        .unwrap();
    assert!(!doc.has_changed(root).unwrap());

    doc.set(root, "site", json!({"name": "North"})).unwrap();
    let site = doc.child(root, "site").unwrap().unwrap();
    assert!(doc.is_dirty(site, "gps").unwrap());
    assert!(doc.has_changed(root).unwrap());

    // Edits on the fresh node are tracked against the old baseline.
    doc.set(site, "gps", json!([51.5, -0.12])).unwrap();
    assert!(!doc.has_changed(root).unwrap());
}

#[test]
fn test_container_kind_change_is_dirty() {
    let mut doc = Document::wrap(household()).unwrap();
    let root = doc.root();

    doc.set(root, "site", json!([])).unwrap();
    assert!(doc.is_dirty(root, "site").unwrap());

    doc.set(root, "site", json!({"name": "North", "gps": [51.5, -0.12]}))
        .unwrap();
    assert!(!doc.has_changed(root).unwrap());
}

#[test]
fn test_remove_and_restore() {
    let mut doc = Document::wrap(household()).unwrap();
    let root = doc.root();

    let removed = doc.remove(root, "notes").unwrap();
    assert_eq!(removed, Some(json!("two storeys")));
    assert!(doc.is_dirty(root, "notes").unwrap());
    assert_eq!(doc.remove(root, "notes").unwrap(), None);

    doc.set(root, "notes", json!("two storeys")).unwrap();
    assert!(!doc.has_changed(root).unwrap());

    // Removing a key the baseline never had leaves nothing behind.
    doc.set(root, "extra", json!(1)).unwrap();
    assert!(doc.has_changed(root).unwrap());
    doc.remove(root, "extra").unwrap();
    assert!(!doc.has_changed(root).unwrap());
}

#[test]
fn test_removed_container_is_detached() {
    let mut doc = Document::wrap(household()).unwrap();
    let root = doc.root();
    let site = doc.child(root, "site").unwrap().unwrap();

    let removed = doc.remove(root, "site").unwrap().unwrap();
    assert_eq!(removed["name"], "North");
    assert!(!doc.is_attached(site).unwrap());
    assert_eq!(doc.get(root, "site").unwrap(), None);
    assert!(doc.get(site, "name").unwrap_err().is_unmanaged_node());
    assert_eq!(doc.node_count(), 4);
}

#[test]
fn test_arrays_grow_at_the_end_only() {
    let mut doc = Document::wrap(household()).unwrap();
    let members = doc.node_at(&["members"]).unwrap().unwrap();

    let index = doc.push(members, json!({"name": "Cai"})).unwrap();
    assert_eq!(index, 2);
    assert!(doc.is_dirty(members, "2").unwrap());
    assert_eq!(doc.len(members).unwrap(), 3);

    let err = doc.set(members, "5", json!({})).unwrap_err();
    assert!(err.is_validation_error());
    let err = doc.set(members, "name", json!("x")).unwrap_err();
    assert!(err.is_validation_error());
    let err = doc.remove(members, "0").unwrap_err();
    assert!(err.is_validation_error());

    let root = doc.root();
    assert!(doc.push(root, json!(1)).unwrap_err().is_validation_error());
    assert_eq!(doc.keys(members).unwrap(), vec!["0", "1", "2"]);
}

#[test]
fn test_fields_are_nodes_or_values() {
    let doc = Document::wrap(household()).unwrap();
    let root = doc.root();

    let notes = doc.get(root, "notes").unwrap().unwrap();
    assert_eq!(notes.as_value(), Some(&json!("two storeys")));
    assert!(notes.as_node().is_none());

    match doc.get(root, "site").unwrap() {
        Some(Field::Node(site)) => {
            assert_eq!(doc.value(site).unwrap()["name"], "North");
        }
        other => panic!("expected a node, got {other:?}"),
    }
    assert!(doc.get(root, "absent").unwrap().is_none());
    assert!(doc.node_at(&["members", "9"]).unwrap().is_none());
}

#[test]
fn test_foreign_nodes_are_rejected() {
    let first = Document::wrap(json!({})).unwrap();
    let mut second = Document::wrap(json!({})).unwrap();

    let err = second.set(first.root(), "a", json!(1)).unwrap_err();
    assert!(err.is_unmanaged_node());
    assert!(second.has_changed(first.root()).unwrap_err().is_unmanaged_node());
}

#[test]
fn test_scalars_are_not_documents() {
    for value in [json!(null), json!("text"), json!(1.5), json!(true)] {
        assert!(Document::wrap(value).unwrap_err().is_validation_error());
    }
}

#[test]
fn test_notes_export_follows_the_tree() {
    let mut doc = Document::wrap(household()).unwrap();
    let member = doc.node_at(&["members", "0"]).unwrap().unwrap();
    let site = doc.node_at(&["site"]).unwrap().unwrap();

    if let Some(errors) = doc
        .open_note(member, "error", json!([]))
        .unwrap()
        .as_array_mut()
    {
        errors.push(json!("age: must be at least 18"));
    }
    *doc.open_note(site, "source", json!(null)).unwrap() = json!("gps device");

    let export = doc.export_notes().unwrap();
    assert_eq!(
        export.at(&["members", "0"]).unwrap().note("error"),
        Some(&json!(["age: must be at least 18"]))
    );
    assert_eq!(
        export.child("site").unwrap().note("source"),
        Some(&json!("gps device"))
    );
    assert!(export.at(&["members", "1"]).is_none());

    doc.clear_notes("error");
    let export = doc.export_notes().unwrap();
    assert!(export.child("members").is_none());
    assert!(export.child("site").is_some());

    doc.clear_notes("source");
    assert!(doc.export_notes().is_none());
}

#[test]
fn test_detached_nodes_drop_out_of_exports() {
    let mut doc = Document::wrap(household()).unwrap();
    let root = doc.root();
    let site = doc.child(root, "site").unwrap().unwrap();
    *doc.open_note(site, "error", json!(null)).unwrap() = json!("unreadable");
    assert!(doc.export_notes().is_some());

    doc.set(root, "site", json!({"name": "North"})).unwrap();
    assert!(doc.export_notes().is_none());
}

#[tokio::test]
async fn test_form_session_round_trip() {
    let (repository, _clock) = test_repository().await;
    let form = vec![
        VariableInfo::new("site").group("location"),
        VariableInfo::new("members").kind("repeat").multi(),
        VariableInfo::new("notes"),
    ];

    let mut record = repository.create("household").unwrap();
    let Value::Object(values) = household() else {
        unreachable!()
    };
    record.values = values;
    let saved = repository.save(&record, &form).await.unwrap();

    // Reopen the record for editing.
    let mut state = FormState::wrap(Value::Object(saved.values.clone())).unwrap();
    assert!(!state.has_changed());

    let member = state
        .document()
        .node_at(&["members", "1"])
        .unwrap()
        .unwrap();
    state.mark_interaction();
    state.document_mut().set(member, "age", json!(18)).unwrap();
    *state
        .document_mut()
        .open_note(member, "warning", json!(null))
        .unwrap() = json!("age changed after review");
    assert!(state.has_changed());

    let mut edited = saved.clone();
    let Value::Object(values) = state.document().raw() else {
        unreachable!()
    };
    edited.values = values;
    edited.notes = state.document().export_notes();
    let resaved = repository.save(&edited, &form).await.unwrap();
    state.reset(Value::Object(resaved.values.clone())).unwrap();
    assert!(!state.has_changed());

    let loaded = repository
        .load("household", &record.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.version, 2);
    assert_eq!(loaded.values["members"][1]["age"], 18);
    let notes = loaded.notes.unwrap();
    assert_eq!(
        notes.at(&["members", "1"]).unwrap().note("warning"),
        Some(&json!("age changed after review"))
    );
}
