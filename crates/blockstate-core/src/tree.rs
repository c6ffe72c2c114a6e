//! JSON tree helpers shared by the resolver and the instance runtime

use serde_json::{Map, Value};

use crate::{BlockError, BlockResult, FieldPath};

/// Short name of a value's JSON kind, used in error messages
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Require a patch to be an object and hand back its map
pub fn into_patch(value: Value) -> BlockResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(BlockError::PatchNotObject {
            found: kind_name(&other),
        }),
    }
}

/// Deep-merge `patch` into `target`.
///
/// Objects merge key by key. Every other value, arrays included, replaces
/// the target wholesale.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => merge_object(target, patch),
        (target, patch) => *target = patch.clone(),
    }
}

/// Deep-merge the entries of `patch` into an object map
pub fn merge_object(target: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, value) in patch {
        match target.get_mut(key) {
            Some(existing) => merge_patch(existing, value),
            None => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Write `value` at `path`, creating intermediate objects as needed.
///
/// Intermediate values that are not objects are replaced by empty objects.
pub fn assign_at(root: &mut Value, path: &FieldPath, value: Value) {
    let Some((last, parents)) = path.segments().split_last() else {
        *root = value;
        return;
    };

    let mut current = root;
    for key in parents {
        current = object_slot(current)
            .entry(key.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    object_slot(current).insert(last.clone(), value);
}

fn object_slot(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced by an object"),
    }
}
