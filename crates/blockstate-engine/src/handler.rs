//! Handlers and the update channel
//!
//! A handler runs after every resolution of its instance with
//! `(snapshot, updater, previous snapshot)`. Calling [`Updater::update`]
//! from inside the handler cascades synchronously and depth-first: the update
//! is resolved, the handler runs for it (and for anything it updates in
//! turn), and only then does `update` return. A clone of the updater moved
//! into a timer or task updates the instance later, as a separate settlement.

use std::fmt;
use std::sync::Arc;

use blockstate_core::{BlockResult, FieldPath, HandlerError};
use serde_json::Value;

use crate::Instance;

/// Side-effecting reaction bound to a block
pub trait Handler: Send + Sync {
    fn handle(
        &self,
        snapshot: &Value,
        update: &Updater,
        previous: Option<&Value>,
    ) -> Result<(), HandlerError>;
}

impl<F> Handler for F
where
    F: Fn(&Value, &Updater, Option<&Value>) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(
        &self,
        snapshot: &Value,
        update: &Updater,
        previous: Option<&Value>,
    ) -> Result<(), HandlerError> {
        self(snapshot, update, previous)
    }
}

pub type SharedHandler = Arc<dyn Handler>;

/// Wrap a closure as a shareable handler
pub fn create_handler<F>(handler: F) -> SharedHandler
where
    F: Fn(&Value, &Updater, Option<&Value>) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    Arc::new(handler)
}

/// Update channel of one instance.
///
/// Cheap to clone and `Send`, so it can be moved into deferred work.
#[derive(Clone)]
pub struct Updater {
    instance: Instance,
}

impl Updater {
    pub(crate) fn new(instance: Instance) -> Self {
        Updater { instance }
    }

    /// Apply `patch` to the instance's current state.
    ///
    /// Returns the snapshot after the handler has reacted to this update.
    /// Outside a cascade this runs a full cycle of its own.
    pub fn update(&self, patch: Value) -> BlockResult<Value> {
        self.instance.call(Some(patch))
    }

    /// Current snapshot of the instance
    pub fn snapshot(&self) -> Option<Value> {
        self.instance.current()
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }
}

impl fmt::Debug for Updater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Updater").field("instance", &self.instance).finish()
    }
}

/// Handlers run one after another against the same arguments
pub struct ComposedHandler {
    handlers: Vec<SharedHandler>,
}

impl Handler for ComposedHandler {
    fn handle(
        &self,
        snapshot: &Value,
        update: &Updater,
        previous: Option<&Value>,
    ) -> Result<(), HandlerError> {
        for handler in &self.handlers {
            handler.handle(snapshot, update, previous)?;
        }
        Ok(())
    }
}

/// Combine handlers into one, invoked in order with a shared updater.
///
/// The first failing handler stops the chain.
pub fn compose_handlers<I>(handlers: I) -> SharedHandler
where
    I: IntoIterator<Item = SharedHandler>,
{
    Arc::new(ComposedHandler {
        handlers: handlers.into_iter().collect(),
    })
}

/// Handler that only runs when the value at a path changed
pub struct Watch {
    path: FieldPath,
    handler: SharedHandler,
}

impl Handler for Watch {
    fn handle(
        &self,
        snapshot: &Value,
        update: &Updater,
        previous: Option<&Value>,
    ) -> Result<(), HandlerError> {
        let changed = match previous {
            None => true,
            Some(previous) => self.path.lookup(snapshot) != self.path.lookup(previous),
        };
        if changed {
            self.handler.handle(snapshot, update, previous)
        } else {
            Ok(())
        }
    }
}

/// Run `handler` only when the value at `path` differs from the previous
/// snapshot, and on the first resolution.
pub fn watch(path: impl Into<FieldPath>, handler: SharedHandler) -> SharedHandler {
    Arc::new(Watch {
        path: path.into(),
        handler,
    })
}
