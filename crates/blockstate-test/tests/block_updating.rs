//! Patching instances: merge policy per field kind and settlement listeners

use blockstate_engine::{create_field_reducer, value, Block, InstanceOptions, Schema, ValueCell};
use blockstate_test::{init_tracing, CallRecorder};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

#[test]
fn test_cell_replaces_arrays() {
    init_tracing();
    let instance = Block::new(Schema::new().field("a", ValueCell::empty())).instance();

    instance.update(json!({ "a": [1, 2, 3, 4] })).unwrap();
    let result = instance.update(json!({ "a": [77] })).unwrap();

    assert_eq!(result, json!({ "a": [77] }));
}

#[test]
fn test_cell_replaces_objects() {
    init_tracing();
    let instance = Block::new(Schema::new().field("a", ValueCell::empty())).instance();

    instance.update(json!({ "a": { "x": 1, "y": 2 } })).unwrap();
    let result = instance.update(json!({ "a": { "z": 3 } })).unwrap();

    assert_eq!(result, json!({ "a": { "z": 3 } }));
}

#[test]
fn test_cell_replaces_inside_groups() {
    init_tracing();
    let instance = Block::new(
        Schema::new().field("a", Schema::new().field("b", ValueCell::empty()).field("c", value("keep"))),
    )
    .instance();

    instance.update(json!({ "a": { "b": [1, 2, 3, 4] } })).unwrap();
    let result = instance.update(json!({ "a": { "b": [77] } })).unwrap();

    assert_eq!(result, json!({ "a": { "b": [77], "c": "keep" } }));
}

#[test]
fn test_cell_replaces_inside_nested_blocks() {
    init_tracing();
    let instance = Block::new(
        Schema::new().field("a", Block::new(Schema::new().field("b", ValueCell::empty()))),
    )
    .instance();

    instance.update(json!({ "a": { "b": [1, 2, 3] } })).unwrap();
    let result = instance.update(json!({ "a": { "b": [44] } })).unwrap();

    assert_eq!(result, json!({ "a": { "b": [44] } }));
}

#[test]
fn test_field_reducer_sees_whole_trees() {
    init_tracing();
    let calls = Arc::new(Mutex::new(Vec::new()));
    let log = calls.clone();
    let block = Block::new(Schema::new().field(
        "a",
        create_field_reducer(move |new, old, path| {
            log.lock().push((new.clone(), old.cloned(), path.to_string()));
            path.lookup(new).cloned().unwrap_or(Value::Null)
        }),
    ));
    let instance = block.instance();

    assert_eq!(instance.refresh().unwrap(), json!({ "a": null }));
    assert_eq!(instance.update(json!({ "a": 16 })).unwrap(), json!({ "a": 16 }));

    let calls = calls.lock();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].0, json!({ "a": 16 }));
    assert_eq!(calls[1].1, Some(json!({ "a": null })));
    assert_eq!(calls[1].2, "a");
}

#[test]
fn test_field_reducer_runs_without_patch() {
    init_tracing();
    let block = Block::new(
        Schema::new()
            .field("items", value(json!([])))
            .field(
                "count",
                create_field_reducer(|new, _, _| {
                    json!(new["items"].as_array().map(Vec::len).unwrap_or(0))
                }),
            ),
    );
    let instance = block.instance();

    assert_eq!(instance.refresh().unwrap()["count"], json!(0));
    assert_eq!(instance.update(json!({ "items": [1, 2] })).unwrap()["count"], json!(2));
    assert_eq!(instance.refresh().unwrap()["count"], json!(2));
}

#[test]
fn test_nested_block_updates() {
    init_tracing();
    let instance = Block::new(Schema::new().field("a", Block::new(Schema::new().field("b", value(1))))).instance();

    let initial = instance.refresh().unwrap();
    let result = instance.update(json!({ "a": { "b": 2 } })).unwrap();

    assert_eq!(initial, json!({ "a": { "b": 1 } }));
    assert_eq!(result, json!({ "a": { "b": 2 } }));
}

#[test]
fn test_handle_update_fires_for_patched_calls_only() {
    init_tracing();
    let recorder = CallRecorder::new();
    let instance = Block::new(Schema::new().field("a", value(1)).field("b", value(2)))
        .instantiate(None, InstanceOptions::new().on_update(recorder.listener()))
        .unwrap();

    instance.refresh().unwrap();
    assert_eq!(recorder.len(), 0);

    instance.update(json!({ "a": 2 })).unwrap();
    assert_eq!(recorder.len(), 1);
    assert_eq!(recorder.snapshots()[0], json!({ "a": 2, "b": 2 }));

    // Same value again still counts as an explicit patch.
    instance.update(json!({ "a": 2 })).unwrap();
    assert_eq!(recorder.len(), 2);
}

#[test]
fn test_unknown_patch_keys_are_dropped() {
    init_tracing();
    let instance = Block::new(Schema::new().field("a", value(1))).instance();

    let result = instance.update(json!({ "a": 5, "ghost": true })).unwrap();
    assert_eq!(result, json!({ "a": 5 }));
}
