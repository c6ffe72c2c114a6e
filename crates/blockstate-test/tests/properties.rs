//! Property tests for resolution invariants

use blockstate_engine::{create_field_reducer, value, Block, Schema, ValueCell};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

fn json_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z]{0,8}".prop_map(Value::from),
    ]
}

fn json_value() -> impl Strategy<Value = Value> {
    json_leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn json_object() -> impl Strategy<Value = Value> {
    prop::collection::btree_map("[a-z]{1,6}", json_value(), 0..6)
        .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>()))
}

fn mixed_schema() -> Schema {
    Schema::new()
        .field("id", json!("fixed"))
        .field("cell", ValueCell::empty())
        .field("group", Schema::new().field("x", value(0)).field("y", json!([1])))
        .derived("echo", |root| root["cell"].clone())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    /// A cell takes the patched value verbatim, whatever its shape was before
    #[test]
    fn cell_replaces_instead_of_merging(before in json_value(), after in json_value()) {
        let instance = Block::new(Schema::new().field("a", value(before.clone()))).instance();

        prop_assert_eq!(instance.refresh().unwrap(), json!({ "a": before }));
        prop_assert_eq!(instance.update(json!({ "a": after.clone() })).unwrap(), json!({ "a": after }));
    }

    /// Output keys are exactly the schema keys, in declaration order
    #[test]
    fn output_keys_follow_schema(patches in prop::collection::vec(json_object(), 1..5)) {
        let instance = Block::new(mixed_schema()).instance();

        for patch in patches {
            let snapshot = instance.update(patch).unwrap();
            let keys: Vec<&str> = snapshot.as_object().unwrap().keys().map(String::as_str).collect();
            prop_assert_eq!(keys, vec!["id", "cell", "group", "echo"]);

            let group: Vec<&str> = snapshot["group"].as_object().unwrap().keys().map(String::as_str).collect();
            prop_assert_eq!(group, vec!["x", "y"]);
            prop_assert_eq!(&snapshot["id"], &json!("fixed"));
            prop_assert_eq!(&snapshot["group"]["y"], &json!([1]));
            prop_assert_eq!(&snapshot["echo"], &snapshot["cell"]);
        }
    }

    /// The last patched value of a cell is the one that sticks
    #[test]
    fn sequential_updates_keep_last_value(values in prop::collection::vec(json_value(), 1..8)) {
        let instance = Block::new(Schema::new().field("a", value(0)).field("b", value("b"))).instance();

        for v in &values {
            instance.update(json!({ "a": v })).unwrap();
        }
        let last = values.last().cloned().unwrap_or(Value::Null);
        prop_assert_eq!(instance.refresh().unwrap(), json!({ "a": last, "b": "b" }));
    }

    /// A reducer folding patches into a running total sees every pass
    #[test]
    fn reducer_accumulates_every_pass(steps in prop::collection::vec(-1000i64..1000, 0..16)) {
        let schema = Schema::new()
            .field("step", value(0))
            .field("total", create_field_reducer(|new, old, _| {
                let before = old.and_then(|o| o["total"].as_i64()).unwrap_or(0);
                json!(before + new["step"].as_i64().unwrap_or(0))
            }));
        let instance = Block::new(schema).instance();
        instance.update(json!({ "step": 0 })).unwrap();

        for step in &steps {
            instance.update(json!({ "step": step })).unwrap();
        }
        let total: i64 = steps.iter().sum();
        prop_assert_eq!(&instance.current().unwrap()["total"], &json!(total));
    }
}
