//! Inbound bridge: drive a host future and expose its outcome as a pledge.

use std::future::Future;

use pledge_core::{Payload, Pledge, PledgeError, Reason, Runtime};
use tokio::runtime::Handle;
use tracing::{trace, warn};

use crate::scheduler::panic_message;

/// Spawn `future` on `handle` and return a pledge settled with its output.
///
/// `Ok` resolves the pledge, `Err` rejects it. A panic in the future rejects
/// it with [`PledgeError::HostFuturePanicked`]; a task cancelled before
/// completing (for instance by runtime shutdown) rejects it with
/// [`PledgeError::Abandoned`].
pub fn from_future<T, E, F>(runtime: &Runtime, handle: &Handle, future: F) -> Pledge<T, E>
where
    T: Payload,
    E: Reason,
    F: Future<Output = Result<T, E>> + Send + 'static,
{
    let (pledge, resolver) = runtime.deferred::<T, E>();
    let id = pledge.id();

    let task = handle.spawn(future);
    handle.spawn(async move {
        match task.await {
            Ok(Ok(value)) => resolver.resolve(value),
            Ok(Err(reason)) => resolver.reject(reason),
            Err(e) if e.is_panic() => {
                let message = panic_message(e.into_panic().as_ref());
                warn!(pledge = %id, %message, "host future panicked");
                resolver.reject(E::from(PledgeError::HostFuturePanicked(message)));
            }
            Err(_) => resolver.reject(E::from(PledgeError::Abandoned)),
        }
        trace!(pledge = %id, "host future completed");
    });

    pledge
}
