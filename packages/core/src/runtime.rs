//! Runtime handle: the injected scheduler plus configuration.
//!
//! Every pledge remembers the runtime it was created on and defers its
//! continuations through that runtime's scheduler. Pledges derived with
//! `then` and friends inherit it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::aggregate::AggregateError;
use crate::combinator;
use crate::error::{Payload, Reason};
use crate::pledge::{Pledge, Resolver};
use crate::resolution::Resolution;
use crate::scheduler::{Scheduler, Task};
use crate::settlement::Settlement;

/// Configuration for a pledge runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Label attached to tracing events.
    pub name: String,

    /// Maximum number of nested thenable layers a single resolution may
    /// unwrap before the target is rejected.
    pub max_adoption_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            name: "pledge".to_string(),
            max_adoption_depth: 512,
        }
    }
}

struct RuntimeInner {
    scheduler: Arc<dyn Scheduler>,
    config: RuntimeConfig,
}

/// A cheaply cloneable handle to a scheduler and its configuration.
///
/// # Example
///
/// ```rust
/// use pledge_core::{ManualScheduler, Pledge, Resolution, Runtime};
///
/// let scheduler = ManualScheduler::new();
/// let runtime = Runtime::new(scheduler.clone());
///
/// let two: Pledge<i32, String> = runtime.resolve(2);
/// let inputs: Vec<Resolution<i32, String>> = vec![Resolution::Value(1), two.into()];
/// let values: Pledge<Vec<i32>, String> = runtime.all(inputs);
/// let sum = values.map(|values| values.iter().sum::<i32>());
///
/// scheduler.run_until_idle();
/// # drop(sum);
/// ```
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    /// Create a runtime with the default configuration.
    pub fn new(scheduler: impl Scheduler) -> Self {
        Self::with_config(scheduler, RuntimeConfig::default())
    }

    /// Create a runtime with the given configuration.
    pub fn with_config(scheduler: impl Scheduler, config: RuntimeConfig) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                scheduler: Arc::new(scheduler),
                config,
            }),
        }
    }

    /// The runtime configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Hand `task` to the scheduler.
    pub(crate) fn defer(&self, task: Task) {
        self.inner.scheduler.defer(task);
    }

    /// Create a pledge driven by `initializer`. See [`Pledge::new`].
    pub fn pledge<T, E, F>(&self, initializer: F) -> Pledge<T, E>
    where
        T: Payload,
        E: Reason,
        F: FnOnce(Resolver<T, E>) -> Result<(), E>,
    {
        Pledge::new(self, initializer)
    }

    /// A pending pledge together with the resolver that settles it.
    pub fn deferred<T: Payload, E: Reason>(&self) -> (Pledge<T, E>, Resolver<T, E>) {
        let pledge = Pledge::pending(self);
        let resolver = Resolver::new(pledge.clone());
        (pledge, resolver)
    }

    /// A pledge adopting `value`. See [`Pledge::resolved`].
    pub fn resolve<T: Payload, E: Reason>(&self, value: impl Into<Resolution<T, E>>) -> Pledge<T, E> {
        Pledge::resolved(self, value)
    }

    /// A pledge rejected with `reason`.
    pub fn reject<T: Payload, E: Reason>(&self, reason: E) -> Pledge<T, E> {
        Pledge::rejected(self, reason)
    }

    /// See [`combinator::all`].
    pub fn all<T, E, I>(&self, inputs: I) -> Pledge<Vec<T>, E>
    where
        T: Payload,
        E: Reason,
        I: IntoIterator,
        I::Item: Into<Resolution<T, E>>,
    {
        combinator::all(self, inputs)
    }

    /// See [`combinator::all_settled`].
    pub fn all_settled<T, E, I>(&self, inputs: I) -> Pledge<Vec<Settlement<T, E>>, E>
    where
        T: Payload,
        E: Reason,
        I: IntoIterator,
        I::Item: Into<Resolution<T, E>>,
    {
        combinator::all_settled(self, inputs)
    }

    /// See [`combinator::race`].
    pub fn race<T, E, I>(&self, inputs: I) -> Pledge<T, E>
    where
        T: Payload,
        E: Reason,
        I: IntoIterator,
        I::Item: Into<Resolution<T, E>>,
    {
        combinator::race(self, inputs)
    }

    /// See [`combinator::any`].
    pub fn any<T, E, I>(&self, inputs: I) -> Pledge<T, AggregateError<E>>
    where
        T: Payload,
        E: Reason,
        I: IntoIterator,
        I::Item: Into<Resolution<T, E>>,
    {
        combinator::any(self, inputs)
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
