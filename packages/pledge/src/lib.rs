//! Pledge: deferred values with interoperable chaining.
//!
//! This crate re-exports [`pledge_core`] and, with the default `tokio`
//! feature, the tokio scheduler and future bridge from `pledge-tokio`.
//!
//! ```rust
//! use pledge::{Pledge, Runtime, TokioScheduler};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let runtime = Runtime::new(TokioScheduler::try_current().unwrap());
//!
//! let inputs: Vec<Pledge<i32, String>> = vec![runtime.resolve(1), runtime.resolve(2)];
//! let both: Pledge<Vec<i32>, String> = runtime.all(inputs);
//! assert_eq!(both.await, Ok(vec![1, 2]));
//! # }
//! ```

pub use pledge_core::*;

#[cfg(feature = "tokio")]
pub use pledge_tokio::{from_future, TokioScheduler};
