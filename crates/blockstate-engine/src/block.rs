//! Block factory

use std::fmt;
use std::sync::Arc;

use blockstate_core::{kind_name, BlockError, BlockResult};
use serde_json::Value;

use crate::{compose_handlers, Instance, InstanceOptions, Schema, SharedHandler};

/// A schema bound to an optional handler.
///
/// A block is a constructor: every call to [`Block::instance`] or
/// [`Block::instantiate`] yields an independent [`Instance`] with its own
/// snapshot state. Cloning a block is cheap and shares the definition.
#[derive(Clone)]
pub struct Block {
    def: Arc<BlockDef>,
}

struct BlockDef {
    schema: Schema,
    handler: Option<SharedHandler>,
}

impl Block {
    pub fn new(schema: Schema) -> Self {
        Block {
            def: Arc::new(BlockDef {
                schema,
                handler: None,
            }),
        }
    }

    /// Block whose instances run `handler` after every resolution
    pub fn with_handler(schema: Schema, handler: SharedHandler) -> Self {
        Block {
            def: Arc::new(BlockDef {
                schema,
                handler: Some(handler),
            }),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.def.schema
    }

    pub fn handler(&self) -> Option<&SharedHandler> {
        self.def.handler.as_ref()
    }

    /// New instance with no seed and default options
    pub fn instance(&self) -> Instance {
        Instance::new(self.clone(), None, InstanceOptions::default())
    }

    /// New instance starting from `seed` as its current snapshot.
    ///
    /// Nothing is resolved until the instance is first called.
    pub fn instantiate(&self, seed: Option<Value>, options: InstanceOptions) -> BlockResult<Instance> {
        if let Some(seed) = &seed {
            if !seed.is_object() {
                return Err(BlockError::SeedNotObject {
                    found: kind_name(seed),
                });
            }
        }
        Ok(Instance::new(self.clone(), seed, options))
    }

    /// New block with `additions` appended to this block's schema.
    ///
    /// Fields already declared are replaced in place. The handler is inherited.
    pub fn extend(&self, additions: Schema) -> Block {
        let mut schema = self.def.schema.clone();
        schema.extend(additions);
        Block {
            def: Arc::new(BlockDef {
                schema,
                handler: self.def.handler.clone(),
            }),
        }
    }

    /// Like [`Block::extend`], also running `handler` after the inherited one
    pub fn extend_with_handler(&self, additions: Schema, handler: SharedHandler) -> Block {
        let handler = match &self.def.handler {
            Some(parent) => compose_handlers([parent.clone(), handler]),
            None => handler,
        };
        let mut schema = self.def.schema.clone();
        schema.extend(additions);
        Block::with_handler(schema, handler)
    }

    /// True when both handles share one definition
    pub fn ptr_eq(&self, other: &Block) -> bool {
        Arc::ptr_eq(&self.def, &other.def)
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("fields", &self.def.schema.keys().collect::<Vec<_>>())
            .field("handler", &self.def.handler.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_handler, value};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_instances_are_independent() {
        let block = Block::new(Schema::new().field("a", value(1)));
        let first = block.instance();
        let second = block.instance();

        first.update(json!({ "a": 2 })).unwrap();
        assert_eq!(first.refresh().unwrap(), json!({ "a": 2 }));
        assert_eq!(second.refresh().unwrap(), json!({ "a": 1 }));
    }

    #[test]
    fn test_seed_must_be_object() {
        let block = Block::new(Schema::new());
        let err = block
            .instantiate(Some(json!([1])), InstanceOptions::default())
            .unwrap_err();
        assert!(matches!(err, BlockError::SeedNotObject { found: "array" }));
    }

    #[test]
    fn test_seed_becomes_current_snapshot() {
        let block = Block::new(Schema::new().field("a", value(1)));
        let instance = block
            .instantiate(Some(json!({ "a": 2 })), InstanceOptions::default())
            .unwrap();

        assert_eq!(instance.current(), Some(json!({ "a": 2 })));
        assert_eq!(instance.refresh().unwrap(), json!({ "a": 2 }));
    }

    #[test]
    fn test_extend_keeps_parent_untouched() {
        let parent = Block::new(Schema::new().field("a", value(1)));
        let child = parent.extend(Schema::new().field("b", json!("x")).field("a", json!(0)));

        assert_eq!(parent.instance().refresh().unwrap(), json!({ "a": 1 }));
        assert_eq!(child.instance().refresh().unwrap(), json!({ "a": 0, "b": "x" }));
        assert!(!parent.ptr_eq(&child));
    }

    #[test]
    fn test_extend_with_handler_runs_parent_first() {
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let (o1, o2) = (order.clone(), order.clone());
        let parent = Block::with_handler(
            Schema::new().field("a", value(1)),
            create_handler(move |_, _, _| {
                o1.lock().push("parent");
                Ok(())
            }),
        );
        let child = parent.extend_with_handler(
            Schema::new(),
            create_handler(move |_, _, _| {
                o2.lock().push("child");
                Ok(())
            }),
        );

        child.instance().refresh().unwrap();
        assert_eq!(*order.lock(), vec!["parent", "child"]);
    }

    #[test]
    fn test_extend_inherits_handler() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let parent = Block::with_handler(
            Schema::new(),
            create_handler(move |_, _, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        parent.extend(Schema::new().field("b", value(2))).instance().refresh().unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
