//! The resolution procedure.
//!
//! Decides how a value offered to a pledge settles it: plain values fulfill
//! directly, pledges and thenables are adopted (recursively, through any
//! number of layers), and a pledge offered to itself is rejected with
//! [`PledgeError::ChainingCycle`].

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{trace, warn};

use crate::error::{panic_message, Payload, PledgeError, Reason};
use crate::pledge::Pledge;
use crate::thenable::{Settler, Thenable};

/// Something a pledge can be resolved with.
pub enum Resolution<T, E> {
    /// A plain value; fulfills directly.
    Value(T),
    /// A pledge to adopt.
    Pledge(Pledge<T, E>),
    /// A foreign thenable to adopt.
    Thenable(Box<dyn Thenable<T, E>>),
}

impl<T, E> Resolution<T, E> {
    /// Wrap a foreign thenable.
    pub fn thenable(thenable: impl Thenable<T, E>) -> Self {
        Resolution::Thenable(Box::new(thenable))
    }
}

impl<T, E> From<T> for Resolution<T, E> {
    fn from(value: T) -> Self {
        Resolution::Value(value)
    }
}

impl<T, E> From<Pledge<T, E>> for Resolution<T, E> {
    fn from(pledge: Pledge<T, E>) -> Self {
        Resolution::Pledge(pledge)
    }
}

impl<T: std::fmt::Debug, E> std::fmt::Debug for Resolution<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolution::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Resolution::Pledge(pledge) => f.debug_tuple("Pledge").field(&pledge.id()).finish(),
            Resolution::Thenable(_) => f.write_str("Thenable(..)"),
        }
    }
}

/// What a continuation callback produces: a resolution, or a reason to
/// reject the downstream pledge with.
pub type Step<T, E> = Result<Resolution<T, E>, E>;

/// Run the resolution procedure against `target`.
pub(crate) fn resolve<T: Payload, E: Reason>(target: &Pledge<T, E>, value: Resolution<T, E>) {
    resolve_at(target, value, 0);
}

/// Run the resolution procedure at a given adoption depth.
///
/// `depth` counts thenables whose `register` is still on the current stack.
pub(crate) fn resolve_at<T: Payload, E: Reason>(
    target: &Pledge<T, E>,
    value: Resolution<T, E>,
    depth: usize,
) {
    let thenable: Box<dyn Thenable<T, E>> = match value {
        Resolution::Value(value) => return target.fulfill(value),
        Resolution::Pledge(pledge) => Box::new(pledge),
        Resolution::Thenable(thenable) => thenable,
    };

    if thenable.pledge_id() == Some(target.id()) {
        warn!(pledge = %target.id(), "chaining cycle detected");
        return target.reject(E::from(PledgeError::ChainingCycle(target.id())));
    }

    let limit = target.runtime().config().max_adoption_depth;
    if depth >= limit {
        warn!(pledge = %target.id(), limit, "adoption depth limit exceeded");
        return target.reject(E::from(PledgeError::AdoptionDepthExceeded(limit)));
    }

    trace!(pledge = %target.id(), depth, "adopting thenable");
    let settler = Settler::new(target.clone(), depth + 1);
    let probe = settler.clone();

    let registration = catch_unwind(AssertUnwindSafe(move || thenable.register(settler)));
    probe.registered();

    match registration {
        Ok(Ok(())) => {}
        // Only honored if neither hook fired first.
        Ok(Err(reason)) => probe.reject(reason),
        Err(payload) => {
            let message = panic_message(payload);
            warn!(pledge = %target.id(), %message, "thenable panicked during adoption");
            probe.reject(E::from(PledgeError::ForeignAdoption(message)));
        }
    }
}
