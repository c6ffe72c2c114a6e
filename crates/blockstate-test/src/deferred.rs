//! Deferred-callback host simulator
//!
//! Stands in for timers and pending computations that a handler uses to call
//! `update` later. Time is virtual and only moves when the test advances it,
//! so asynchronous cascades can be asserted step by step.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;

use blockstate_engine::Updater;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::warn;

type Task = Box<dyn FnOnce() + Send>;

/// Task waiting for its due time
struct Scheduled {
    due: Duration,
    seq: u64,
    task: Task,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Earliest due first, then scheduling order (reversed for the max-heap)
impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct QueueState {
    now: Duration,
    next_seq: u64,
    tasks: BinaryHeap<Scheduled>,
    executed: u64,
}

/// Virtual-time task queue.
///
/// Cloning yields another handle to the same queue, so a handler can capture
/// one and schedule work on it.
#[derive(Clone, Default)]
pub struct DeferredQueue {
    state: Arc<Mutex<QueueState>>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` once virtual time has advanced by `delay`
    pub fn schedule<F>(&self, delay: Duration, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        let due = state.now + delay;
        state.tasks.push(Scheduled {
            due,
            seq,
            task: Box::new(task),
        });
    }

    /// Schedule `updater.update(patch)`.
    ///
    /// Errors surface as warnings, the way an unobserved timer callback would.
    pub fn schedule_update(&self, delay: Duration, updater: &Updater, patch: Value) {
        let updater = updater.clone();
        self.schedule(delay, move || {
            if let Err(e) = updater.update(patch) {
                warn!("deferred update failed: {}", e);
            }
        });
    }

    /// Advance virtual time and run every task due by then.
    ///
    /// Tasks scheduled while running are executed too if already due.
    /// Returns the number of tasks run.
    pub fn advance(&self, dt: Duration) -> usize {
        let target = self.state.lock().now + dt;
        let mut ran = 0;

        loop {
            let task = {
                let mut state = self.state.lock();
                match state.tasks.peek() {
                    Some(next) if next.due <= target => {
                        let Some(next) = state.tasks.pop() else {
                            break;
                        };
                        state.now = state.now.max(next.due);
                        state.executed += 1;
                        next.task
                    }
                    _ => {
                        state.now = target;
                        break;
                    }
                }
            };
            task();
            ran += 1;
        }

        ran
    }

    /// Keep advancing to the next due task until none are left.
    ///
    /// Stops after `max_tasks` executions so a self-rescheduling task cannot
    /// spin forever. Returns the number of tasks run.
    pub fn run_until_idle(&self, max_tasks: usize) -> usize {
        let mut ran = 0;
        while ran < max_tasks {
            let next_due = {
                let state = self.state.lock();
                match state.tasks.peek() {
                    Some(next) => next.due.saturating_sub(state.now),
                    None => break,
                }
            };
            ran += self.advance(next_due);
        }
        ran
    }

    /// Current virtual time
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Tasks still waiting
    pub fn pending(&self) -> usize {
        self.state.lock().tasks.len()
    }

    /// Tasks run so far
    pub fn executed(&self) -> u64 {
        self.state.lock().executed
    }
}
