//! Pledge core: deferred values with interoperable chaining.
//!
//! A [`Pledge`] is a value that is pending, fulfilled or rejected, and
//! settles exactly once. This crate holds the parts with real invariants:
//!
//! - The state machine: settle-once transitions and a FIFO continuation
//!   queue flushed from scheduled tasks, never synchronously
//! - The resolution procedure: adoption of nested pledges and foreign
//!   [`Thenable`]s, first-call-wins hooks, cycle detection
//! - The combinators: [`all`], [`all_settled`], [`race`], [`any`]
//!
//! Deferred execution is an injected [`Scheduler`]. [`ManualScheduler`] is a
//! deterministic implementation for tests and single-threaded hosts; the
//! `pledge-tokio` crate provides one backed by a tokio runtime.
//!
//! # Example
//!
//! ```rust
//! use pledge_core::{ManualScheduler, Pledge, Resolution, Runtime};
//!
//! let scheduler = ManualScheduler::new();
//! let runtime = Runtime::new(scheduler.clone());
//!
//! let name: Pledge<String, String> = runtime.pledge(|resolver| {
//!     resolver.resolve("world".to_string());
//!     Ok(())
//! });
//! let greeting = name
//!     .map(|name| format!("hello, {}", name))
//!     .finally(|| Ok(Resolution::Value(())));
//!
//! // Nothing runs until the scheduler does.
//! scheduler.run_until_idle();
//! # drop(greeting);
//! ```
//!
//! # Async Support
//!
//! Enable the `async` feature to await pledges from host futures:
//!
//! ```toml
//! [dependencies]
//! pledge-core = { version = "0.1", features = ["async"] }
//! ```
//!
//! Then `pledge.await` yields `Result<T, E>`.

mod aggregate;
pub mod combinator;
mod error;
mod pledge;
mod queue;
mod resolution;
mod runtime;
mod scheduler;
mod settlement;
mod thenable;

pub use aggregate::{AggregateError, ALL_REJECTED};
pub use combinator::{all, all_settled, any, race};
pub use error::{Payload, PledgeError, Reason};
pub use pledge::{Pledge, PledgeId, Resolver};
pub use resolution::{Resolution, Step};
pub use runtime::{Runtime, RuntimeConfig};
pub use scheduler::{ManualScheduler, Scheduler, Task};
pub use settlement::Settlement;
pub use thenable::{thenable, FnThenable, Settler, Thenable};

// Async support
#[cfg(feature = "async")]
mod bridge;

#[cfg(feature = "async")]
pub use bridge::PledgeFuture;
