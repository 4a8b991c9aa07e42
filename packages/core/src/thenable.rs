//! The thenable capability: anything a pledge can adopt.
//!
//! Foreign deferred values take part in resolution by implementing
//! [`Thenable`]. During adoption the library hands the thenable a
//! [`Settler`], a cloneable pair of hooks sharing a single claim token:
//! whichever hook is called first wins, every later call from any clone is
//! ignored.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::error::{Payload, Reason};
use crate::pledge::{Pledge, PledgeId};
use crate::resolution::{self, Resolution};

/// A value exposing a registration method compatible with pledge chaining.
pub trait Thenable<T, E>: Send + 'static {
    /// Register `settler` to be told about this value's outcome.
    ///
    /// Returning `Err(reason)` before calling either hook rejects the adopting
    /// pledge with `reason`. After a hook was called, errors are ignored.
    fn register(self: Box<Self>, settler: Settler<T, E>) -> Result<(), E>;

    /// Identity of the underlying pledge, if this is one. Used for cycle
    /// detection.
    fn pledge_id(&self) -> Option<PledgeId> {
        None
    }
}

/// Hooks a thenable uses to settle the pledge adopting it.
///
/// Adoption depth only accumulates while hooks fire from inside `register`.
/// A hook called after `register` returned (from a later task, say) starts a
/// fresh, depth-zero resolution.
pub struct Settler<T, E> {
    target: Pledge<T, E>,
    called: Arc<AtomicBool>,
    registering: Arc<AtomicBool>,
    depth: usize,
}

impl<T, E> Clone for Settler<T, E> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            called: self.called.clone(),
            registering: self.registering.clone(),
            depth: self.depth,
        }
    }
}

impl<T: Payload, E: Reason> Settler<T, E> {
    pub(crate) fn new(target: Pledge<T, E>, depth: usize) -> Self {
        Self {
            target,
            called: Arc::new(AtomicBool::new(false)),
            registering: Arc::new(AtomicBool::new(true)),
            depth,
        }
    }

    /// Mark `register` as returned; later hooks no longer nest.
    pub(crate) fn registered(&self) {
        self.registering.store(false, Ordering::Release);
    }

    /// Continue resolution with `value`, which may itself be a thenable.
    pub fn resolve(&self, value: impl Into<Resolution<T, E>>) {
        if self.claim() {
            let depth = if self.registering.load(Ordering::Acquire) {
                self.depth
            } else {
                0
            };
            resolution::resolve_at(&self.target, value.into(), depth);
        } else {
            trace!(pledge = %self.target.id(), "ignoring repeated thenable resolve");
        }
    }

    /// Reject the adopting pledge with `reason`.
    pub fn reject(&self, reason: E) {
        if self.claim() {
            self.target.reject(reason);
        } else {
            trace!(pledge = %self.target.id(), "ignoring repeated thenable reject");
        }
    }

    /// Whether either hook has been called.
    pub fn is_called(&self) -> bool {
        self.called.load(Ordering::Acquire)
    }

    fn claim(&self) -> bool {
        self.called
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// A [`Thenable`] built from a closure. See [`thenable`].
pub struct FnThenable<F>(F);

impl<T, E, F> Thenable<T, E> for FnThenable<F>
where
    F: FnOnce(Settler<T, E>) -> Result<(), E> + Send + 'static,
{
    fn register(self: Box<Self>, settler: Settler<T, E>) -> Result<(), E> {
        (self.0)(settler)
    }
}

/// Adapt a registration closure into a [`Thenable`].
///
/// This is the explicit bridge for foreign deferred values that do not
/// implement the trait themselves.
///
/// ```rust
/// use pledge_core::{thenable, ManualScheduler, Pledge, Resolution, Runtime, Settler};
///
/// let scheduler = ManualScheduler::new();
/// let runtime = Runtime::new(scheduler.clone());
///
/// let foreign = thenable(|settler: Settler<i32, String>| {
///     settler.resolve(42);
///     Ok(())
/// });
/// let pledge: Pledge<i32, String> = Pledge::resolved(&runtime, Resolution::thenable(foreign));
/// scheduler.run_until_idle();
/// # drop(pledge);
/// ```
pub fn thenable<T, E, F>(register: F) -> FnThenable<F>
where
    F: FnOnce(Settler<T, E>) -> Result<(), E> + Send + 'static,
{
    FnThenable(register)
}
