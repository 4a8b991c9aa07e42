//! Tokio integration for pledges.
//!
//! - [`TokioScheduler`] runs deferred pledge work on a tokio runtime
//! - [`from_future`] turns a host future into a pledge
//!
//! Awaiting a pledge needs no extra glue: `pledge-core` is built with its
//! `async` feature here, so every `Pledge<T, E>` implements `IntoFuture`.

mod bridge;
mod scheduler;

pub use bridge::from_future;
pub use scheduler::TokioScheduler;
