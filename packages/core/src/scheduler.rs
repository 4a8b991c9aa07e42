//! Deferred-execution abstraction.
//!
//! Pledges never run continuations on the caller's stack. Instead they hand a
//! [`Task`] to a [`Scheduler`], which must run it after the current call
//! returns. Implementations exist per host: [`ManualScheduler`] here for tests
//! and single-threaded embedders, and a tokio-backed one in `pledge-tokio`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Trait for deferring work until the current synchronous call stack unwinds.
///
/// Implementations must run tasks:
/// - never from inside `defer` itself
/// - in the order `defer` was called
/// - one at a time
pub trait Scheduler: Send + Sync + 'static {
    /// Queue `task` to run later.
    fn defer(&self, task: Task);
}

impl<S: Scheduler + ?Sized> Scheduler for Arc<S> {
    fn defer(&self, task: Task) {
        (**self).defer(task)
    }
}

/// A deterministic scheduler driven explicitly by its owner.
///
/// Tasks pile up in a FIFO queue until [`run_next`](Self::run_next) or
/// [`run_until_idle`](Self::run_until_idle) is called. Clones share the queue.
///
/// # Example
///
/// ```rust
/// use pledge_core::{ManualScheduler, Pledge, Runtime};
///
/// let scheduler = ManualScheduler::new();
/// let runtime = Runtime::new(scheduler.clone());
///
/// let pledge: Pledge<i32, String> = runtime.resolve(5);
/// let doubled = pledge.map(|v| v * 2);
/// assert!(scheduler.pending() > 0);
///
/// scheduler.run_until_idle();
/// # drop(doubled);
/// ```
#[derive(Clone, Default)]
pub struct ManualScheduler {
    queue: Arc<Mutex<VecDeque<Task>>>,
}

impl ManualScheduler {
    /// Create a scheduler with an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    /// Run the oldest queued task. Returns `false` if the queue was empty.
    pub fn run_next(&self) -> bool {
        // Pop under the lock, run outside it: tasks defer more tasks.
        let task = self.lock().pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run tasks until the queue is empty, including tasks deferred by the
    /// tasks being run. Returns the number of tasks executed.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Task>> {
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Scheduler for ManualScheduler {
    fn defer(&self, task: Task) {
        self.lock().push_back(task);
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}
