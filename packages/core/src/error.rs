//! Error types for the pledge core.
//!
//! Nothing in this crate ever returns these errors synchronously. Every failure
//! the library itself detects is converted into the caller's reason type and
//! used to reject the pledge it concerns.

use thiserror::Error;

use crate::pledge::PledgeId;

/// Failures detected by the library while settling a pledge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PledgeError {
    /// A pledge was resolved with itself.
    #[error("chaining cycle detected for pledge {0}")]
    ChainingCycle(PledgeId),

    /// A foreign thenable panicked while registering its hooks, before it
    /// called either of them.
    #[error("foreign thenable failed during adoption: {0}")]
    ForeignAdoption(String),

    /// A registered `then`/`catch`/`finally` callback panicked.
    #[error("callback panicked: {0}")]
    CallbackPanicked(String),

    /// The initializer passed to `Pledge::new` panicked.
    #[error("initializer panicked: {0}")]
    InitializerPanicked(String),

    /// Nested adoption went deeper than `RuntimeConfig::max_adoption_depth`.
    #[error("adoption depth limit of {0} exceeded")]
    AdoptionDepthExceeded(usize),

    /// A host future bridged into a pledge panicked.
    #[error("host future panicked: {0}")]
    HostFuturePanicked(String),

    /// A pledge was dropped while still pending, so its outcome can never be
    /// delivered to an awaiting host future.
    #[error("pledge abandoned before settlement")]
    Abandoned,
}

impl From<PledgeError> for String {
    fn from(e: PledgeError) -> Self {
        e.to_string()
    }
}

/// Bound for rejection reasons.
///
/// Reasons are opaque to the library, but it must be able to express its own
/// failures (cycles, panics) in the caller's reason type.
pub trait Reason: Clone + Send + 'static + From<PledgeError> {}

impl<E> Reason for E where E: Clone + Send + 'static + From<PledgeError> {}

/// Bound for fulfillment values. Every continuation receives its own clone.
pub trait Payload: Clone + Send + 'static {}

impl<T> Payload for T where T: Clone + Send + 'static {}

/// Render a panic payload caught with `catch_unwind` as a message.
pub(crate) fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
