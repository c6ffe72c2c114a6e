//! Call recorders for handlers and settlement listeners

use std::sync::Arc;

use blockstate_engine::{create_handler, Handler, SharedHandler};
use parking_lot::Mutex;
use serde_json::Value;

/// Arguments of one recorded invocation
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedCall {
    pub snapshot: Value,
    pub previous: Option<Value>,
}

/// Shared log of invocations.
///
/// Hand out [`CallRecorder::handler`] as a block handler or
/// [`CallRecorder::listener`] as a settlement listener, then inspect the calls.
#[derive(Clone, Default)]
pub struct CallRecorder {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl CallRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handler that only records
    pub fn handler(&self) -> SharedHandler {
        self.wrap(create_handler(|_, _, _| Ok(())))
    }

    /// Record each call, then delegate to `inner`
    pub fn wrap(&self, inner: SharedHandler) -> SharedHandler {
        let calls = self.calls.clone();
        create_handler(move |snapshot, update, previous| {
            calls.lock().push(RecordedCall {
                snapshot: snapshot.clone(),
                previous: previous.cloned(),
            });
            inner.handle(snapshot, update, previous)
        })
    }

    /// Settlement listener recording each snapshot
    pub fn listener(&self) -> impl Fn(&Value) + Send + Sync + 'static {
        let calls = self.calls.clone();
        move |snapshot| {
            calls.lock().push(RecordedCall {
                snapshot: snapshot.clone(),
                previous: None,
            })
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call(&self, index: usize) -> Option<RecordedCall> {
        self.calls.lock().get(index).cloned()
    }

    /// Snapshots of every call, in order
    pub fn snapshots(&self) -> Vec<Value> {
        self.calls.lock().iter().map(|c| c.snapshot.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}
