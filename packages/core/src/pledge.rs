//! The pledge state machine.
//!
//! A [`Pledge`] starts pending and settles at most once, either fulfilled with
//! a value or rejected with a reason. Continuations registered with
//! [`then`](Pledge::then) and friends wait in a per-pledge FIFO queue and are
//! always delivered from a task handed to the runtime's scheduler, never from
//! the call that settled the pledge or attached the continuation.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::error::{panic_message, Payload, PledgeError, Reason};
use crate::queue::CallbackQueue;
use crate::resolution::{self, Resolution, Step};
use crate::runtime::Runtime;
use crate::thenable::{Settler, Thenable};

/// Identity of a pledge, used for cycle detection and in tracing fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PledgeId(Uuid);

impl PledgeId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for PledgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// Settlement state of a pledge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum State {
    Pending,
    Fulfilled,
    Rejected,
}

enum Status<T, E> {
    Pending,
    Fulfilled(T),
    Rejected(E),
}

impl<T, E> Status<T, E> {
    fn state(&self) -> State {
        match self {
            Status::Pending => State::Pending,
            Status::Fulfilled(_) => State::Fulfilled,
            Status::Rejected(_) => State::Rejected,
        }
    }
}

/// A registered continuation. Consumed exactly once with the settled outcome.
pub(crate) type Continuation<T, E> = Box<dyn FnOnce(Result<T, E>) + Send + 'static>;

struct Inner<T, E> {
    status: Status<T, E>,
    queue: CallbackQueue<Continuation<T, E>>,
}

struct Shared<T, E> {
    id: PledgeId,
    runtime: Runtime,
    inner: Mutex<Inner<T, E>>,
}

/// A deferred value that settles at most once.
///
/// `Pledge` is a cheap handle: clones refer to the same underlying state.
///
/// # Example
///
/// ```rust
/// use pledge_core::{ManualScheduler, Pledge, Resolution, Runtime};
///
/// let scheduler = ManualScheduler::new();
/// let runtime = Runtime::new(scheduler.clone());
///
/// let answer: Pledge<i32, String> = Pledge::new(&runtime, |resolver| {
///     resolver.resolve(21);
///     Ok(())
/// });
/// let doubled = answer.and_then(|v| Ok(Resolution::Value(v * 2)));
///
/// scheduler.run_until_idle();
/// # drop(doubled);
/// ```
pub struct Pledge<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Clone for Pledge<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T, E> Pledge<T, E> {
    /// This pledge's identifier.
    pub fn id(&self) -> PledgeId {
        self.shared.id
    }

    /// The runtime this pledge schedules its continuations on.
    pub fn runtime(&self) -> &Runtime {
        &self.shared.runtime
    }

    /// Whether two handles refer to the same pledge.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    pub(crate) fn state(&self) -> State {
        self.lock().status.state()
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T, E>> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T: Payload, E: Reason> Pledge<T, E> {
    /// Create a pending pledge and run `initializer` synchronously with its
    /// [`Resolver`].
    ///
    /// An `Err` returned by the initializer rejects the pledge with that
    /// reason, as does a panic (converted to
    /// [`PledgeError::InitializerPanicked`]). Either is ignored if the
    /// initializer already settled the pledge.
    pub fn new<F>(runtime: &Runtime, initializer: F) -> Self
    where
        F: FnOnce(Resolver<T, E>) -> Result<(), E>,
    {
        let pledge = Self::pending(runtime);
        let resolver = Resolver::new(pledge.clone());

        match catch_unwind(AssertUnwindSafe(move || initializer(resolver))) {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => pledge.reject(reason),
            Err(payload) => {
                let message = panic_message(payload);
                warn!(pledge = %pledge.id(), %message, "initializer panicked");
                pledge.reject(E::from(PledgeError::InitializerPanicked(message)));
            }
        }

        pledge
    }

    /// A pledge that adopts `value`: fulfilled with it directly, or following
    /// it if it is itself a pledge or thenable.
    pub fn resolved(runtime: &Runtime, value: impl Into<Resolution<T, E>>) -> Self {
        let value = value.into();
        Self::new(runtime, move |resolver| {
            resolver.resolve(value);
            Ok(())
        })
    }

    /// A pledge rejected with `reason`. Reasons are never unwrapped.
    pub fn rejected(runtime: &Runtime, reason: E) -> Self {
        Self::new(runtime, move |resolver| {
            resolver.reject(reason);
            Ok(())
        })
    }

    /// Create a pending pledge with no initializer.
    pub(crate) fn pending(runtime: &Runtime) -> Self {
        let pledge = Self {
            shared: Arc::new(Shared {
                id: PledgeId::new(),
                runtime: runtime.clone(),
                inner: Mutex::new(Inner {
                    status: Status::Pending,
                    queue: CallbackQueue::new(),
                }),
            }),
        };
        trace!(pledge = %pledge.id(), runtime = %runtime.config().name, "pledge created");
        pledge
    }

    /// Register both continuations and return the downstream pledge.
    ///
    /// Exactly one callback runs, from a scheduled task, once this pledge
    /// settles. Its result is fed through the resolution procedure into the
    /// returned pledge; `Err(reason)` or a panic rejects it instead.
    pub fn then<U, E2, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Pledge<U, E2>
    where
        U: Payload,
        E2: Reason,
        F: FnOnce(T) -> Step<U, E2> + Send + 'static,
        R: FnOnce(E) -> Step<U, E2> + Send + 'static,
    {
        self.chain(move |outcome| match outcome {
            Ok(value) => on_fulfilled(value),
            Err(reason) => on_rejected(reason),
        })
    }

    /// Like [`then`](Self::then) with the rejection passed through unchanged.
    pub fn and_then<U, F>(&self, on_fulfilled: F) -> Pledge<U, E>
    where
        U: Payload,
        F: FnOnce(T) -> Step<U, E> + Send + 'static,
    {
        self.then(on_fulfilled, Err)
    }

    /// Transform the fulfillment value with a plain function.
    pub fn map<U, F>(&self, f: F) -> Pledge<U, E>
    where
        U: Payload,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.then(move |value| Ok(Resolution::Value(f(value))), Err)
    }

    /// Handle a rejection; a fulfillment value passes through unchanged.
    pub fn catch<E2, R>(&self, on_rejected: R) -> Pledge<T, E2>
    where
        E2: Reason,
        R: FnOnce(E) -> Step<T, E2> + Send + 'static,
    {
        self.then(|value| Ok(Resolution::Value(value)), on_rejected)
    }

    /// Run `on_finally` once this pledge settles either way, then pass the
    /// original outcome through verbatim.
    ///
    /// The callback sees neither value nor reason. If it returns a pledge or
    /// thenable, the outcome waits for it. If it fails (`Err`, a panic, or a
    /// rejected pledge) that failure replaces the original outcome.
    pub fn finally<F>(&self, on_finally: F) -> Pledge<T, E>
    where
        F: FnOnce() -> Step<(), E> + Send + 'static,
    {
        let runtime = self.runtime().clone();
        self.chain(move |outcome| {
            let gate: Pledge<(), E> = Pledge::resolved(&runtime, on_finally()?);
            let restored = gate.then(
                move |()| outcome.map(Resolution::Value),
                Err,
            );
            Ok(Resolution::Pledge(restored))
        })
    }

    /// Record a continuation and return its downstream pledge.
    fn chain<U, E2, F>(&self, callback: F) -> Pledge<U, E2>
    where
        U: Payload,
        E2: Reason,
        F: FnOnce(Result<T, E>) -> Step<U, E2> + Send + 'static,
    {
        let downstream = Pledge::pending(self.runtime());
        let target = downstream.clone();

        self.subscribe(Box::new(move |outcome| {
            match catch_unwind(AssertUnwindSafe(move || callback(outcome))) {
                Ok(Ok(next)) => resolution::resolve(&target, next),
                Ok(Err(reason)) => target.reject(reason),
                Err(payload) => {
                    let message = panic_message(payload);
                    warn!(pledge = %target.id(), %message, "callback panicked");
                    target.reject(E2::from(PledgeError::CallbackPanicked(message)));
                }
            }
        }));

        downstream
    }

    /// Enqueue a continuation, scheduling a flush if already settled.
    pub(crate) fn subscribe(&self, continuation: Continuation<T, E>) {
        let settled = {
            let mut inner = self.lock();
            inner.queue.enqueue(continuation);
            !matches!(inner.status, Status::Pending)
        };
        trace!(pledge = %self.id(), settled, "continuation registered");

        if settled {
            self.schedule_flush();
        }
    }

    /// Transition to fulfilled. No-op once settled.
    pub(crate) fn fulfill(&self, value: T) {
        self.transition(Status::Fulfilled(value));
    }

    /// Transition to rejected. No-op once settled.
    pub(crate) fn reject(&self, reason: E) {
        self.transition(Status::Rejected(reason));
    }

    fn transition(&self, next: Status<T, E>) {
        let state = next.state();
        let waiting = {
            let mut inner = self.lock();
            if !matches!(inner.status, Status::Pending) {
                trace!(pledge = %self.id(), ?state, "ignoring settlement of settled pledge");
                return;
            }
            inner.status = next;
            inner.queue.len()
        };

        debug!(
            pledge = %self.id(),
            runtime = %self.runtime().config().name,
            ?state,
            waiting,
            "pledge settled"
        );
        // Later subscribers schedule their own flush.
        if waiting > 0 {
            self.schedule_flush();
        }
    }

    fn schedule_flush(&self) {
        let pledge = self.clone();
        self.runtime().defer(Box::new(move || pledge.flush()));
    }

    /// Drain the whole queue, including continuations enqueued while draining.
    fn flush(&self) {
        let mut delivered = 0usize;

        loop {
            let (continuation, outcome) = {
                let mut inner = self.lock();
                // Flushes are only scheduled after settlement.
                if matches!(inner.status, Status::Pending) {
                    break;
                }
                let continuation = match inner.queue.dequeue() {
                    Some(continuation) => continuation,
                    None => break,
                };
                let outcome = match &inner.status {
                    Status::Fulfilled(value) => Ok(value.clone()),
                    Status::Rejected(reason) => Err(reason.clone()),
                    Status::Pending => break,
                };
                (continuation, outcome)
            };

            continuation(outcome);
            delivered += 1;
        }

        if delivered > 0 {
            trace!(pledge = %self.id(), delivered, "flushed continuations");
        }
    }
}

impl<T: Payload, E: Reason> Thenable<T, E> for Pledge<T, E> {
    fn register(self: Box<Self>, settler: Settler<T, E>) -> Result<(), E> {
        self.subscribe(Box::new(move |outcome| match outcome {
            Ok(value) => settler.resolve(Resolution::Value(value)),
            Err(reason) => settler.reject(reason),
        }));
        Ok(())
    }

    fn pledge_id(&self) -> Option<PledgeId> {
        Some(self.id())
    }
}

impl<T, E> std::fmt::Debug for Pledge<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pledge")
            .field("id", &self.id())
            .field("state", &self.state())
            .finish()
    }
}

/// Settlement hooks handed to a pledge initializer.
///
/// [`resolve`](Self::resolve) runs the resolution procedure against the
/// pledge; [`reject`](Self::reject) rejects it directly. Calls after the
/// pledge settled are no-ops.
pub struct Resolver<T, E> {
    pledge: Pledge<T, E>,
}

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Self {
            pledge: self.pledge.clone(),
        }
    }
}

impl<T: Payload, E: Reason> Resolver<T, E> {
    pub(crate) fn new(pledge: Pledge<T, E>) -> Self {
        Self { pledge }
    }

    /// Resolve the pledge with a value, pledge or thenable.
    pub fn resolve(&self, value: impl Into<Resolution<T, E>>) {
        resolution::resolve(&self.pledge, value.into());
    }

    /// Reject the pledge with `reason`.
    pub fn reject(&self, reason: E) {
        self.pledge.reject(reason);
    }

    /// The pledge this resolver settles.
    pub fn pledge(&self) -> &Pledge<T, E> {
        &self.pledge
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;

    type Outcome<T> = Arc<Mutex<Option<Result<T, String>>>>;

    fn runtime() -> (ManualScheduler, Runtime) {
        let scheduler = ManualScheduler::new();
        let runtime = Runtime::new(scheduler.clone());
        (scheduler, runtime)
    }

    fn observe<T: Payload>(pledge: &Pledge<T, String>) -> Outcome<T> {
        let slot: Outcome<T> = Arc::new(Mutex::new(None));
        let on_value = slot.clone();
        let on_reason = slot.clone();
        let _: Pledge<(), String> = pledge.then(
            move |v| {
                *on_value.lock().unwrap() = Some(Ok(v));
                Ok(Resolution::Value(()))
            },
            move |e| {
                *on_reason.lock().unwrap() = Some(Err(e));
                Ok(Resolution::Value(()))
            },
        );
        slot
    }

    #[test]
    fn starts_pending() {
        let (_, runtime) = runtime();
        let pledge: Pledge<i32, String> = Pledge::pending(&runtime);
        assert_eq!(pledge.state(), State::Pending);
    }

    #[test]
    fn settles_once() {
        let (scheduler, runtime) = runtime();
        let pledge: Pledge<i32, String> = Pledge::pending(&runtime);

        pledge.fulfill(1);
        pledge.fulfill(2);
        pledge.reject("late".to_string());
        assert_eq!(pledge.state(), State::Fulfilled);

        let seen = observe(&pledge);
        scheduler.run_until_idle();
        assert_eq!(*seen.lock().unwrap(), Some(Ok(1)));
    }

    #[test]
    fn rejection_is_final() {
        let (scheduler, runtime) = runtime();
        let pledge: Pledge<i32, String> = Pledge::pending(&runtime);

        pledge.reject("first".to_string());
        pledge.fulfill(7);
        assert_eq!(pledge.state(), State::Rejected);

        let seen = observe(&pledge);
        scheduler.run_until_idle();
        assert_eq!(*seen.lock().unwrap(), Some(Err("first".to_string())));
    }

    #[test]
    fn callbacks_never_run_synchronously() {
        let (scheduler, runtime) = runtime();
        let pledge: Pledge<i32, String> = Pledge::resolved(&runtime, 3);

        let seen = observe(&pledge);
        assert!(seen.lock().unwrap().is_none());

        scheduler.run_until_idle();
        assert_eq!(*seen.lock().unwrap(), Some(Ok(3)));
    }

    #[test]
    fn initializer_error_rejects() {
        let (scheduler, runtime) = runtime();
        let pledge: Pledge<i32, String> = Pledge::new(&runtime, |_| Err("nope".to_string()));

        let seen = observe(&pledge);
        scheduler.run_until_idle();
        assert_eq!(*seen.lock().unwrap(), Some(Err("nope".to_string())));
    }

    #[test]
    fn initializer_error_after_settlement_is_ignored() {
        let (scheduler, runtime) = runtime();
        let pledge: Pledge<i32, String> = Pledge::new(&runtime, |resolver| {
            resolver.resolve(5);
            Err("ignored".to_string())
        });

        let seen = observe(&pledge);
        scheduler.run_until_idle();
        assert_eq!(*seen.lock().unwrap(), Some(Ok(5)));
    }

    #[test]
    fn initializer_panic_rejects() {
        let (scheduler, runtime) = runtime();
        let pledge: Pledge<i32, String> = Pledge::new(&runtime, |_| panic!("exploded"));

        let seen = observe(&pledge);
        scheduler.run_until_idle();
        let outcome = seen.lock().unwrap().clone();
        let reason = outcome.unwrap().unwrap_err();
        assert!(reason.contains("initializer panicked"));
        assert!(reason.contains("exploded"));
    }

    #[test]
    fn continuations_fire_in_registration_order() {
        let (scheduler, runtime) = runtime();
        let pledge: Pledge<i32, String> = Pledge::pending(&runtime);
        let log = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let log = log.clone();
            let _ = pledge.map(move |_| log.lock().unwrap().push(i));
        }

        pledge.fulfill(0);
        scheduler.run_until_idle();
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn late_continuation_joins_running_flush() {
        let (scheduler, runtime) = runtime();
        let pledge: Pledge<i32, String> = Pledge::resolved(&runtime, 1);
        scheduler.run_until_idle();

        let log = Arc::new(Mutex::new(Vec::new()));
        let inner_pledge = pledge.clone();
        let inner_log = log.clone();
        let _ = pledge.map(move |_| {
            inner_log.lock().unwrap().push("first");
            let log = inner_log.clone();
            // Attached mid-flush: drained by the same loop.
            let _ = inner_pledge.map(move |_| log.lock().unwrap().push("late"));
        });

        // One flush task runs both continuations.
        assert!(scheduler.run_next());
        assert_eq!(*log.lock().unwrap(), vec!["first", "late"]);
    }

    #[test]
    fn callback_error_rejects_downstream() {
        let (scheduler, runtime) = runtime();
        let pledge: Pledge<i32, String> = Pledge::resolved(&runtime, 1);
        let downstream: Pledge<i32, String> = pledge.and_then(|_| Err("thrown".to_string()));

        let seen = observe(&downstream);
        scheduler.run_until_idle();
        assert_eq!(*seen.lock().unwrap(), Some(Err("thrown".to_string())));
    }

    #[test]
    fn callback_panic_rejects_downstream() {
        let (scheduler, runtime) = runtime();
        let pledge: Pledge<i32, String> = Pledge::resolved(&runtime, 1);
        let downstream: Pledge<i32, String> = pledge.map(|_| panic!("bad callback"));

        let seen = observe(&downstream);
        scheduler.run_until_idle();
        let reason = seen.lock().unwrap().clone().unwrap().unwrap_err();
        assert!(reason.contains("callback panicked: bad callback"));
    }

    #[test]
    fn catch_recovers() {
        let (scheduler, runtime) = runtime();
        let pledge: Pledge<i32, String> = Pledge::rejected(&runtime, "oops".to_string());
        let recovered: Pledge<i32, String> =
            pledge.catch(|reason| Ok(Resolution::Value(reason.len() as i32)));

        let seen = observe(&recovered);
        scheduler.run_until_idle();
        assert_eq!(*seen.lock().unwrap(), Some(Ok(4)));
    }

    #[test]
    fn rejection_skips_and_then() {
        let (scheduler, runtime) = runtime();
        let pledge: Pledge<i32, String> = Pledge::rejected(&runtime, "skip".to_string());
        let ran = Arc::new(Mutex::new(false));
        let flag = ran.clone();
        let downstream = pledge.map(move |v| {
            *flag.lock().unwrap() = true;
            v
        });

        let seen = observe(&downstream);
        scheduler.run_until_idle();
        assert!(!*ran.lock().unwrap());
        assert_eq!(*seen.lock().unwrap(), Some(Err("skip".to_string())));
    }

    #[test]
    fn finally_passes_value_through() {
        let (scheduler, runtime) = runtime();
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        let pledge: Pledge<i32, String> = Pledge::resolved(&runtime, 9).finally(move || {
            *counter.lock().unwrap() += 1;
            Ok(Resolution::Value(()))
        });

        let seen = observe(&pledge);
        scheduler.run_until_idle();
        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(*seen.lock().unwrap(), Some(Ok(9)));
    }

    #[test]
    fn finally_failure_overrides_outcome() {
        let (scheduler, runtime) = runtime();
        let pledge: Pledge<i32, String> = Pledge::rejected(&runtime, "original".to_string())
            .finally(|| Err("cleanup failed".to_string()));

        let seen = observe(&pledge);
        scheduler.run_until_idle();
        assert_eq!(*seen.lock().unwrap(), Some(Err("cleanup failed".to_string())));
    }

    #[test]
    fn each_pledge_has_its_own_id() {
        let (_, runtime) = runtime();
        let a: Pledge<i32, String> = Pledge::pending(&runtime);
        let b: Pledge<i32, String> = Pledge::pending(&runtime);

        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
        assert_eq!(a.id().to_string().len(), 36);
    }

    #[test]
    fn debug_shows_state() {
        let (_, runtime) = runtime();
        let pledge: Pledge<i32, String> = Pledge::pending(&runtime);
        let rendered = format!("{:?}", pledge);
        assert!(rendered.contains("Pending"));
        assert!(rendered.contains(&pledge.id().to_string()));
    }
}
