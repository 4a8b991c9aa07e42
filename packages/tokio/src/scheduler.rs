//! A [`Scheduler`] that runs pledge tasks on a tokio runtime.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use pledge_core::{Scheduler, Task};
use tokio::runtime::{Handle, TryCurrentError};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Scheduler backed by a single driver task on a tokio runtime.
///
/// Deferred tasks go through an unbounded channel and are run one at a time,
/// in the order they were deferred, by a task spawned when the scheduler is
/// created. Clones share the driver.
///
/// # Example
///
/// ```rust
/// use pledge_core::{Pledge, Runtime};
/// use pledge_tokio::TokioScheduler;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let runtime = Runtime::new(TokioScheduler::try_current().unwrap());
///
/// let pledge: Pledge<i32, String> = runtime.resolve(20);
/// assert_eq!(pledge.map(|v| v + 22).await, Ok(42));
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<Task>,
}

impl TokioScheduler {
    /// Spawn the driver task on `handle`.
    pub fn new(handle: &Handle) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Task>();

        handle.spawn(async move {
            debug!("pledge driver started");
            while let Some(task) = rx.recv().await {
                // Keep draining if a task panics.
                if let Err(payload) = catch_unwind(AssertUnwindSafe(task)) {
                    let message = panic_message(payload.as_ref());
                    warn!(%message, "scheduled task panicked");
                }
            }
            debug!("pledge driver stopped");
        });

        Self { tx }
    }

    /// Spawn the driver on the runtime this call is made from.
    pub fn try_current() -> Result<Self, TryCurrentError> {
        Handle::try_current().map(|handle| Self::new(&handle))
    }
}

/// Render a caught panic payload as a message.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&'static str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

impl Scheduler for TokioScheduler {
    fn defer(&self, task: Task) {
        if self.tx.send(task).is_err() {
            warn!("pledge driver is gone; dropping task");
        }
    }
}
