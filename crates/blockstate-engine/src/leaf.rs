//! Leaf kinds: value cells and field reducers

use std::fmt;
use std::sync::Arc;

use blockstate_core::FieldPath;
use serde_json::Value;

/// Lazy initializer; receives the working snapshot
pub type InitFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Reducer function: `(new snapshot, old snapshot, field path) -> value`
pub type ReduceFn = Arc<dyn Fn(&Value, Option<&Value>, &FieldPath) -> Value + Send + Sync>;

#[derive(Clone)]
enum Initial {
    Unset,
    Literal(Value),
    Lazy(InitFn),
}

/// Stateful leaf.
///
/// A patched value replaces the cell's value by reference, with no merging,
/// even for arrays and objects. Without a patch the cell keeps its previous
/// value; on the very first resolution it runs its initializer.
#[derive(Clone)]
pub struct ValueCell {
    initial: Initial,
}

impl ValueCell {
    /// Cell starting out as `null`
    pub fn empty() -> Self {
        ValueCell {
            initial: Initial::Unset,
        }
    }

    pub fn new(initial: impl Into<Value>) -> Self {
        ValueCell {
            initial: Initial::Literal(initial.into()),
        }
    }

    /// Cell whose initial value is computed from the working snapshot on first resolution
    pub fn lazy<F>(init: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        ValueCell {
            initial: Initial::Lazy(Arc::new(init)),
        }
    }

    /// Compute the initial value
    pub fn initialize(&self, working: &Value) -> Value {
        match &self.initial {
            Initial::Unset => Value::Null,
            Initial::Literal(value) => value.clone(),
            Initial::Lazy(init) => init(working),
        }
    }

    /// Resolve the cell: patch first, then previous value, then initializer
    pub fn resolve(&self, patched: Option<&Value>, previous: Option<&Value>, working: &Value) -> Value {
        match patched.or(previous) {
            Some(value) => value.clone(),
            None => self.initialize(working),
        }
    }
}

impl Default for ValueCell {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for ValueCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.initial {
            Initial::Unset => f.write_str("ValueCell"),
            Initial::Literal(value) => f.debug_tuple("ValueCell").field(value).finish(),
            Initial::Lazy(_) => f.write_str("ValueCell(lazy)"),
        }
    }
}

/// Shorthand for [`ValueCell::new`]
pub fn value(initial: impl Into<Value>) -> ValueCell {
    ValueCell::new(initial)
}

/// Stateless leaf recomputed on every resolution, patched or not.
///
/// The reducer sees the whole working snapshot, the previous snapshot and its
/// own path, so it can derive its value from unrelated parts of either tree.
#[derive(Clone)]
pub struct FieldReducer {
    reduce: ReduceFn,
}

impl FieldReducer {
    pub fn new<F>(reduce: F) -> Self
    where
        F: Fn(&Value, Option<&Value>, &FieldPath) -> Value + Send + Sync + 'static,
    {
        FieldReducer {
            reduce: Arc::new(reduce),
        }
    }

    pub fn reduce(&self, new: &Value, old: Option<&Value>, path: &FieldPath) -> Value {
        (self.reduce)(new, old, path)
    }
}

impl fmt::Debug for FieldReducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FieldReducer(..)")
    }
}

/// Shorthand for [`FieldReducer::new`]
pub fn create_field_reducer<F>(reduce: F) -> FieldReducer
where
    F: Fn(&Value, Option<&Value>, &FieldPath) -> Value + Send + Sync + 'static,
{
    FieldReducer::new(reduce)
}
