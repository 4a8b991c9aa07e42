//! Error carrying every reason collected by [`any`](crate::combinator::any).

use thiserror::Error;

use crate::error::PledgeError;

/// Message used when `any` sees every input reject.
pub const ALL_REJECTED: &str = "All pledges were rejected";

/// Several rejection reasons reported as one.
///
/// `errors` keeps input order and stays mutable after construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AggregateError<E> {
    /// The collected reasons, in input order.
    pub errors: Vec<E>,
    message: String,
}

impl<E> AggregateError<E> {
    /// Aggregate `errors` under the default message.
    pub fn new(errors: Vec<E>) -> Self {
        Self::with_message(errors, ALL_REJECTED)
    }

    /// Aggregate `errors` under a custom message.
    pub fn with_message(errors: Vec<E>, message: impl Into<String>) -> Self {
        Self {
            errors,
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn into_errors(self) -> Vec<E> {
        self.errors
    }
}

/// A library failure on an aggregate pledge carries no input reasons.
impl<E> From<PledgeError> for AggregateError<E> {
    fn from(e: PledgeError) -> Self {
        Self::with_message(Vec::new(), e.to_string())
    }
}
