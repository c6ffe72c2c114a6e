//! Block schemas
//!
//! A schema maps field keys, in declaration order, to one of a closed set of
//! node kinds. Declaration order is part of the contract: a field resolved
//! later can observe every field resolved before it in the same pass.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::{Block, FieldReducer, ValueCell};

/// Function computing a field from the working snapshot
pub type DeriveFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// One schema entry
#[derive(Clone)]
pub enum SchemaNode {
    /// Literal value, included verbatim in every snapshot
    Constant(Value),
    /// Recomputed on every pass; no memory of its previous output
    Derived(DeriveFn),
    /// Stateful leaf
    Cell(ValueCell),
    /// Stateless leaf computed from the whole new/old snapshots
    Reducer(FieldReducer),
    /// Object-shaped sub-schema
    Group(Schema),
    /// Sub-tree owned by a child instance of another block
    Nested(Block),
}

impl SchemaNode {
    /// Build a derived node from a closure
    pub fn derived<F>(derive: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        SchemaNode::Derived(Arc::new(derive))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SchemaNode::Constant(_) => "constant",
            SchemaNode::Derived(_) => "derived",
            SchemaNode::Cell(_) => "cell",
            SchemaNode::Reducer(_) => "reducer",
            SchemaNode::Group(_) => "group",
            SchemaNode::Nested(_) => "nested",
        }
    }
}

impl fmt::Debug for SchemaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaNode::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            SchemaNode::Derived(_) => f.write_str("Derived(..)"),
            SchemaNode::Cell(cell) => f.debug_tuple("Cell").field(cell).finish(),
            SchemaNode::Reducer(_) => f.write_str("Reducer(..)"),
            SchemaNode::Group(schema) => f.debug_tuple("Group").field(schema).finish(),
            SchemaNode::Nested(block) => f.debug_tuple("Nested").field(block).finish(),
        }
    }
}

/// Literal JSON: objects become groups, anything else a constant.
impl From<Value> for SchemaNode {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => SchemaNode::Group(Schema::from(map)),
            other => SchemaNode::Constant(other),
        }
    }
}

impl From<ValueCell> for SchemaNode {
    fn from(cell: ValueCell) -> Self {
        SchemaNode::Cell(cell)
    }
}

impl From<FieldReducer> for SchemaNode {
    fn from(reducer: FieldReducer) -> Self {
        SchemaNode::Reducer(reducer)
    }
}

impl From<Schema> for SchemaNode {
    fn from(schema: Schema) -> Self {
        SchemaNode::Group(schema)
    }
}

impl From<Block> for SchemaNode {
    fn from(block: Block) -> Self {
        SchemaNode::Nested(block)
    }
}

/// Ordered set of fields
#[derive(Clone, Debug, Default)]
pub struct Schema {
    fields: Vec<(String, SchemaNode)>,
}

impl Schema {
    pub fn new() -> Self {
        Schema::default()
    }

    /// Add a field (builder style)
    pub fn field(mut self, key: impl Into<String>, node: impl Into<SchemaNode>) -> Self {
        self.insert(key, node);
        self
    }

    /// Add a derived field (builder style)
    pub fn derived<F>(self, key: impl Into<String>, derive: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.field(key, SchemaNode::derived(derive))
    }

    /// Insert a field.
    ///
    /// Re-declaring an existing key replaces its node but keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, node: impl Into<SchemaNode>) {
        let key = key.into();
        let node = node.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = node,
            None => self.fields.push((key, node)),
        }
    }

    /// Insert every field of `other`, in its order
    pub fn extend(&mut self, other: Schema) {
        for (key, node) in other.fields {
            self.insert(key, node);
        }
    }

    pub fn get(&self, key: &str) -> Option<&SchemaNode> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, node)| node)
    }

    /// Fields in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SchemaNode)> {
        self.fields.iter().map(|(key, node)| (key.as_str(), node))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Map<String, Value>> for Schema {
    fn from(map: Map<String, Value>) -> Self {
        Schema {
            fields: map
                .into_iter()
                .map(|(key, value)| (key, SchemaNode::from(value)))
                .collect(),
        }
    }
}
