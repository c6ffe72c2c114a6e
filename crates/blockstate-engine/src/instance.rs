//! Block instances and the update cycle
//!
//! An instance holds the current/previous snapshot pair of one block. Each
//! external call runs inside a *cycle* owned by the calling thread. A call
//! made on that thread while the cycle is active (an `update` made
//! synchronously from a handler) joins it: it resolves, runs the handler for
//! its own snapshot, and returns once that nested cascade has finished, so
//! cascades resolve depth-first. Calls from other threads wait until the
//! cycle settles and then run a cycle of their own.
//!
//! Every resolution is committed to `current` before its handler runs. A
//! failing handler therefore leaves `current` advanced while `previous` keeps
//! the value from the last settled cycle.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use blockstate_core::{into_patch, BlockError, BlockResult, FieldPath};
use parking_lot::{Condvar, Mutex, ReentrantMutex};
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use crate::resolve::resolve_with;
use crate::{Block, Updater};

/// Listener notified with each settled snapshot
pub type UpdateListener = Arc<dyn Fn(&Value) + Send + Sync>;

/// Default bound on handler runs per cycle.
///
/// Synchronous cascades nest one stack level per `update`, so this also
/// bounds their depth.
pub const DEFAULT_CASCADE_LIMIT: usize = 128;

/// Instance configuration
#[derive(Clone)]
pub struct InstanceOptions {
    /// Called once per settled cycle in which a patch was applied
    pub handle_update: Option<UpdateListener>,
    /// Maximum handler runs in one cycle before it is aborted
    pub cascade_limit: usize,
}

impl Default for InstanceOptions {
    fn default() -> Self {
        InstanceOptions {
            handle_update: None,
            cascade_limit: DEFAULT_CASCADE_LIMIT,
        }
    }
}

impl InstanceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the settlement listener
    pub fn on_update<F>(mut self, listener: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.handle_update = Some(Arc::new(listener));
        self
    }

    pub fn with_cascade_limit(mut self, limit: usize) -> Self {
        self.cascade_limit = limit;
        self
    }
}

impl fmt::Debug for InstanceOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceOptions")
            .field("handle_update", &self.handle_update.is_some())
            .field("cascade_limit", &self.cascade_limit)
            .finish()
    }
}

/// Running state of one block.
///
/// Cloning yields another handle to the same state.
#[derive(Clone)]
pub struct Instance {
    inner: Arc<InstanceInner>,
}

struct InstanceInner {
    block: Block,
    options: InstanceOptions,
    state: Mutex<InstanceState>,
    /// Signalled whenever a cycle ends
    idle: Condvar,
    /// Held while a settled cycle is reported, so listeners see settlements in order
    notifying: ReentrantMutex<()>,
    children: ChildInstances,
}

#[derive(Default)]
struct InstanceState {
    current: Option<Value>,
    previous: Option<Value>,
    cycle: Option<Cycle>,
}

/// Bookkeeping for the cycle in progress
struct Cycle {
    owner: ThreadId,
    /// Snapshot held before the cycle started
    started_from: Option<Value>,
    /// Whether any resolution in this cycle carried a patch
    patched: bool,
    resolutions: usize,
    runs: usize,
}

impl Cycle {
    fn new(owner: ThreadId, started_from: Option<Value>) -> Self {
        Cycle {
            owner,
            started_from,
            patched: false,
            resolutions: 0,
            runs: 0,
        }
    }
}

impl Instance {
    pub(crate) fn new(block: Block, seed: Option<Value>, options: InstanceOptions) -> Self {
        Instance {
            inner: Arc::new(InstanceInner {
                block,
                options,
                state: Mutex::new(InstanceState {
                    current: seed,
                    ..InstanceState::default()
                }),
                idle: Condvar::new(),
                notifying: ReentrantMutex::new(()),
                children: ChildInstances::default(),
            }),
        }
    }

    /// Resolve `patch` (or refresh when `None`), run the handler cascade and
    /// return the settled snapshot.
    ///
    /// Called from a handler of this instance, the call joins the running
    /// cycle and returns once its own handler run, and every update nested
    /// in it, has finished. Called from another thread while a cycle is
    /// running, it blocks until that cycle settles. A handler must therefore
    /// not wait on another thread that updates the same instance.
    pub fn call(&self, patch: Option<Value>) -> BlockResult<Value> {
        let patch = patch.map(into_patch).transpose()?;

        if !self.enter() {
            trace!(patched = patch.is_some(), "update joined active cycle");
            return self.cascade(patch.as_ref());
        }

        debug!(patched = patch.is_some(), "cycle started");
        let unwind = UnwindGuard { instance: self };
        let result = self.cascade(patch.as_ref());
        std::mem::forget(unwind);
        self.settle(result)
    }

    /// Run a pass with no patch
    pub fn refresh(&self) -> BlockResult<Value> {
        self.call(None)
    }

    /// Run a pass with `patch`
    pub fn update(&self, patch: Value) -> BlockResult<Value> {
        self.call(Some(patch))
    }

    /// Latest resolved snapshot (or the seed before the first call)
    pub fn current(&self) -> Option<Value> {
        self.inner.state.lock().current.clone()
    }

    /// Snapshot held before the last settled cycle
    pub fn previous(&self) -> Option<Value> {
        self.inner.state.lock().previous.clone()
    }

    pub fn block(&self) -> &Block {
        &self.inner.block
    }

    pub fn options(&self) -> &InstanceOptions {
        &self.inner.options
    }

    /// Update channel for this instance
    pub fn updater(&self) -> Updater {
        Updater::new(self.clone())
    }

    /// True when both handles share one state
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Start a cycle owned by this thread, or report that this thread already
    /// owns one. Waits while another thread's cycle is running.
    fn enter(&self) -> bool {
        let me = thread::current().id();
        let mut state = self.inner.state.lock();
        loop {
            match state.cycle.as_ref().map(|cycle| cycle.owner) {
                None => {
                    let started_from = state.current.clone();
                    state.cycle = Some(Cycle::new(me, started_from));
                    return true;
                }
                Some(owner) if owner == me => return false,
                Some(_) => {
                    trace!("waiting for cycle owned by another thread");
                    self.inner.idle.wait(&mut state);
                }
            }
        }
    }

    /// Resolve, then run the handler for the new snapshot.
    ///
    /// Returns the current snapshot once the handler, including any update it
    /// made, has returned.
    fn cascade(&self, patch: Option<&Map<String, Value>>) -> BlockResult<Value> {
        let (snapshot, before) = self.inner_resolve(patch)?;
        let Some(handler) = self.inner.block.handler() else {
            return Ok(snapshot);
        };

        self.count_run()?;
        handler
            .handle(&snapshot, &self.updater(), before.as_ref())
            .map_err(BlockError::from_handler)?;

        Ok(self.inner.state.lock().current.clone().unwrap_or_default())
    }

    /// Resolve against the current state and commit the result.
    ///
    /// Returns the new snapshot and the one it replaced. No lock is held while
    /// the schema's functions or nested instances run; the cycle keeps other
    /// threads out in the meantime.
    fn inner_resolve(&self, patch: Option<&Map<String, Value>>) -> BlockResult<(Value, Option<Value>)> {
        let base = self.inner.state.lock().current.clone();
        let empty = Map::new();
        let snapshot = resolve_with(
            self.inner.block.schema(),
            patch.unwrap_or(&empty),
            base.as_ref(),
            &self.inner.children,
        )?;

        let mut state = self.inner.state.lock();
        if let Some(cycle) = state.cycle.as_mut() {
            cycle.resolutions += 1;
            cycle.patched |= patch.is_some();
        }
        let before = state.current.replace(snapshot.clone());
        Ok((snapshot, before))
    }

    fn count_run(&self) -> BlockResult<()> {
        let limit = self.inner.options.cascade_limit;
        let mut state = self.inner.state.lock();
        if let Some(cycle) = state.cycle.as_mut() {
            cycle.runs += 1;
            if cycle.runs > limit {
                warn!(limit, "cascade limit exceeded, aborting cycle");
                return Err(BlockError::CascadeLimitExceeded { limit });
            }
        }
        Ok(())
    }

    /// End the cycle owned by this call and wake waiting threads.
    ///
    /// On success `previous` moves to the pre-cycle snapshot and the listener
    /// is notified if anything was patched. On error neither happens.
    fn settle(&self, result: BlockResult<Value>) -> BlockResult<Value> {
        let _order = self.inner.notifying.lock();
        let notify = {
            let mut state = self.inner.state.lock();
            let cycle = state.cycle.take();
            match (&result, cycle) {
                (Ok(_), Some(cycle)) => {
                    debug!(resolutions = cycle.resolutions, runs = cycle.runs, "cycle settled");
                    state.previous = cycle.started_from;
                    cycle.patched
                }
                _ => false,
            }
        };
        self.inner.idle.notify_all();

        if notify {
            if let (Ok(settled), Some(listener)) = (&result, &self.inner.options.handle_update) {
                listener(settled);
            }
        }
        result
    }
}

/// Ends the cycle if user code panics inside it
struct UnwindGuard<'a> {
    instance: &'a Instance,
}

impl Drop for UnwindGuard<'_> {
    fn drop(&mut self) {
        self.instance.inner.state.lock().cycle = None;
        self.instance.inner.idle.notify_all();
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Instance")
            .field("block", &self.inner.block)
            .field("current", &state.current)
            .field("cycle_active", &state.cycle.is_some())
            .finish()
    }
}

/// Child instances owned by nested-block fields, keyed by field path
#[derive(Default)]
pub(crate) struct ChildInstances {
    slots: Mutex<HashMap<FieldPath, Instance>>,
}

impl ChildInstances {
    /// Child at `path`, created on first use and seeded from the previous sub-tree
    pub(crate) fn get_or_create(&self, path: &FieldPath, block: &Block, seed: Option<&Value>) -> Instance {
        self.slots
            .lock()
            .entry(path.clone())
            .or_insert_with(|| {
                trace!(path = %path, "creating nested instance");
                let seed = seed.filter(|s| s.is_object()).cloned();
                Instance::new(block.clone(), seed, InstanceOptions::default())
            })
            .clone()
    }
}
