//! Tree and field resolution
//!
//! A pass walks the schema in declaration order. It keeps a working tree that
//! starts as the previous snapshot deep-merged with the patch; each resolved
//! field is written back into it so that later fields observe earlier ones.
//! The returned snapshot is built separately and carries only schema keys.

use blockstate_core::{assign_at, kind_name, merge_object, BlockError, BlockResult, FieldPath};
use serde_json::{Map, Value};
use tracing::{trace, warn};

use crate::instance::ChildInstances;
use crate::{Schema, SchemaNode};

/// Resolve `schema` against `patch` and the previous snapshot.
///
/// Nested blocks get throwaway instances. Use an [`Instance`](crate::Instance)
/// to keep nested state across passes.
pub fn resolve(
    schema: &Schema,
    patch: &Map<String, Value>,
    previous: Option<&Value>,
) -> BlockResult<Value> {
    resolve_with(schema, patch, previous, &ChildInstances::default())
}

pub(crate) fn resolve_with(
    schema: &Schema,
    patch: &Map<String, Value>,
    previous: Option<&Value>,
    children: &ChildInstances,
) -> BlockResult<Value> {
    let mut base = match previous {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    merge_object(&mut base, patch);

    let mut resolver = Resolver {
        working: Value::Object(base),
        previous,
        children,
    };
    let tree = resolver.resolve_group(schema, Some(patch), &FieldPath::root())?;
    Ok(Value::Object(tree))
}

struct Resolver<'a> {
    working: Value,
    previous: Option<&'a Value>,
    children: &'a ChildInstances,
}

impl Resolver<'_> {
    fn resolve_group(
        &mut self,
        schema: &Schema,
        patch: Option<&Map<String, Value>>,
        path: &FieldPath,
    ) -> BlockResult<Map<String, Value>> {
        let mut tree = Map::with_capacity(schema.len());

        for (key, node) in schema.iter() {
            let field = path.child(key);
            let patched = patch.and_then(|p| p.get(key));
            let value = self.resolve_field(node, patched, &field)?;

            assign_at(&mut self.working, &field, value.clone());
            tree.insert(key.to_owned(), value);
        }

        Ok(tree)
    }

    fn resolve_field(
        &mut self,
        node: &SchemaNode,
        patched: Option<&Value>,
        field: &FieldPath,
    ) -> BlockResult<Value> {
        let value = match node {
            SchemaNode::Constant(value) => value.clone(),
            SchemaNode::Derived(derive) => derive(&self.working),
            SchemaNode::Cell(cell) => {
                let previous = self.previous.and_then(|p| field.lookup(p));
                cell.resolve(patched, previous, &self.working)
            }
            SchemaNode::Reducer(reducer) => reducer.reduce(&self.working, self.previous, field),
            SchemaNode::Group(schema) => {
                let patch = object_patch(patched, field);
                Value::Object(self.resolve_group(schema, patch, field)?)
            }
            SchemaNode::Nested(block) => {
                let seed = self.previous.and_then(|p| field.lookup(p));
                let child = self.children.get_or_create(field, block, seed);
                let patch = object_patch(patched, field).cloned().map(Value::Object);

                trace!(path = %field, patched = patch.is_some(), "resolving nested block");
                child
                    .call(patch)
                    .map_err(|e| BlockError::nested(field.clone(), e))?
            }
        };
        Ok(value)
    }
}

/// Sub-patch for an object-shaped field; anything but an object counts as no patch
fn object_patch<'p>(patched: Option<&'p Value>, field: &FieldPath) -> Option<&'p Map<String, Value>> {
    match patched? {
        Value::Object(map) => Some(map),
        other => {
            warn!(
                path = %field,
                found = kind_name(other),
                "ignoring non-object patch for object-shaped field"
            );
            None
        }
    }
}
