//! Outbound bridge: await a pledge as a `std::future::Future`.
//!
//! The pledge delivers its outcome through a continuation that sends it down
//! a tokio oneshot channel. If the continuation is dropped without running
//! (every handle to a pending pledge went away, or the scheduler was shut
//! down), the future resolves to [`PledgeError::Abandoned`].

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{Payload, PledgeError, Reason};
use crate::pledge::Pledge;

/// Future returned by awaiting a [`Pledge`].
pub struct PledgeFuture<T, E> {
    rx: oneshot::Receiver<Result<T, E>>,
}

impl<T, E: From<PledgeError>> Future for PledgeFuture<T, E> {
    type Output = Result<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(E::from(PledgeError::Abandoned))))
    }
}

impl<T: Payload, E: Reason> IntoFuture for Pledge<T, E> {
    type Output = Result<T, E>;
    type IntoFuture = PledgeFuture<T, E>;

    fn into_future(self) -> Self::IntoFuture {
        let (tx, rx) = oneshot::channel();
        self.subscribe(Box::new(move |outcome| {
            // The receiver may already be gone; nobody is waiting then.
            let _ = tx.send(outcome);
        }));
        PledgeFuture { rx }
    }
}
