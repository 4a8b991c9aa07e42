//! Combinators deriving one pledge from many.
//!
//! Every combinator first turns each input into a pledge (plain values become
//! already-fulfilled pledges) and then observes the inputs only through the
//! public chaining contract.
//!
//! | Combinator | Fulfills with | Rejects with |
//! |---|---|---|
//! | [`all`] | every value, in input order | the first rejection seen |
//! | [`all_settled`] | one [`Settlement`] per input | never, from its inputs |
//! | [`race`] | the first value | the first reason |
//! | [`any`] | the first value | an [`AggregateError`] once every input rejected |

use std::sync::{Arc, Mutex};

use crate::aggregate::AggregateError;
use crate::error::{Payload, PledgeError, Reason};
use crate::pledge::Pledge;
use crate::resolution::Resolution;
use crate::runtime::Runtime;
use crate::settlement::Settlement;

/// Collects fulfillment values by input index.
struct Gather<T> {
    slots: Vec<Option<T>>,
    remaining: usize,
}

impl<T> Gather<T> {
    fn new(len: usize) -> Self {
        let mut slots = Vec::with_capacity(len);
        slots.resize_with(len, || None);
        Self {
            slots,
            remaining: len,
        }
    }

    /// Store `value`; returns every value once the last slot is filled.
    fn fill(&mut self, index: usize, value: T) -> Option<Vec<T>> {
        if self.slots[index].replace(value).is_none() {
            self.remaining -= 1;
        }
        if self.remaining > 0 {
            return None;
        }
        self.slots.iter_mut().map(Option::take).collect()
    }
}

/// Turn every input into a pledge; plain values become fulfilled pledges.
fn lift<T, E, I>(runtime: &Runtime, inputs: I) -> Vec<Pledge<T, E>>
where
    T: Payload,
    E: Reason,
    I: IntoIterator,
    I::Item: Into<Resolution<T, E>>,
{
    inputs
        .into_iter()
        .map(|input| Pledge::resolved(runtime, input))
        .collect()
}

/// Fulfill with every input's value once all fulfill, or reject with the
/// first rejection without waiting for the rest.
///
/// An empty input fulfills with an empty vector.
pub fn all<T, E, I>(runtime: &Runtime, inputs: I) -> Pledge<Vec<T>, E>
where
    T: Payload,
    E: Reason,
    I: IntoIterator,
    I::Item: Into<Resolution<T, E>>,
{
    let inputs = lift(runtime, inputs);
    if inputs.is_empty() {
        return Pledge::resolved(runtime, Vec::new());
    }

    Pledge::new(runtime, |resolver| {
        let gather = Arc::new(Mutex::new(Gather::new(inputs.len())));

        for (index, input) in inputs.into_iter().enumerate() {
            let gather = gather.clone();
            let on_value = resolver.clone();
            let on_reason = resolver.clone();

            let _: Pledge<(), E> = input.then(
                move |value| {
                    let done = gather
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .fill(index, value);
                    if let Some(values) = done {
                        on_value.resolve(values);
                    }
                    Ok(Resolution::Value(()))
                },
                move |reason| {
                    on_reason.reject(reason);
                    Ok(Resolution::Value(()))
                },
            );
        }

        Ok(())
    })
}

/// Wait for every input to settle and report each outcome in input order.
pub fn all_settled<T, E, I>(runtime: &Runtime, inputs: I) -> Pledge<Vec<Settlement<T, E>>, E>
where
    T: Payload,
    E: Reason,
    I: IntoIterator,
    I::Item: Into<Resolution<T, E>>,
{
    let records: Vec<Pledge<Settlement<T, E>, E>> = lift(runtime, inputs)
        .into_iter()
        .map(|input| {
            input.then(
                |value| Ok(Resolution::Value(Settlement::Fulfilled { value })),
                |reason| Ok(Resolution::Value(Settlement::Rejected { reason })),
            )
        })
        .collect();

    all(runtime, records)
}

/// Settle like whichever input settles first.
///
/// Later settlements are no-ops. An empty input never settles.
pub fn race<T, E, I>(runtime: &Runtime, inputs: I) -> Pledge<T, E>
where
    T: Payload,
    E: Reason,
    I: IntoIterator,
    I::Item: Into<Resolution<T, E>>,
{
    let inputs = lift(runtime, inputs);

    Pledge::new(runtime, |resolver| {
        for input in inputs {
            let on_value = resolver.clone();
            let on_reason = resolver.clone();

            let _: Pledge<(), E> = input.then(
                move |value| {
                    on_value.resolve(value);
                    Ok(Resolution::Value(()))
                },
                move |reason| {
                    on_reason.reject(reason);
                    Ok(Resolution::Value(()))
                },
            );
        }

        Ok(())
    })
}

/// The inverted reason type used by [`any`]: a fulfillment travelling down
/// the rejection path.
#[derive(Clone)]
enum Inverted<T> {
    Won(T),
    Failed(PledgeError),
}

impl<T> From<PledgeError> for Inverted<T> {
    fn from(e: PledgeError) -> Self {
        Inverted::Failed(e)
    }
}

/// Fulfill with the first value any input fulfills with; reject with an
/// [`AggregateError`] holding every reason, in input order, only once all
/// inputs rejected.
///
/// Implemented by swapping success and failure on each input and handing the
/// result to [`all`]: the first inverted rejection is the winning value, and
/// an inverted success of every input is the list of reasons.
pub fn any<T, E, I>(runtime: &Runtime, inputs: I) -> Pledge<T, AggregateError<E>>
where
    T: Payload,
    E: Reason,
    I: IntoIterator,
    I::Item: Into<Resolution<T, E>>,
{
    let inverted: Vec<Pledge<E, Inverted<T>>> = lift(runtime, inputs)
        .into_iter()
        .map(|input| {
            input.then(
                |value| Err(Inverted::Won(value)),
                |reason| Ok(Resolution::Value(reason)),
            )
        })
        .collect();

    all::<E, Inverted<T>, _>(runtime, inverted).then(
        |reasons| Err(AggregateError::new(reasons)),
        |inverted| match inverted {
            Inverted::Won(value) => Ok(Resolution::Value(value)),
            Inverted::Failed(e) => Err(AggregateError::from(e)),
        },
    )
}
