//! The step protocol.
//!
//! A saga is a suspendable computation driven from outside. The interpreter
//! calls [`Saga::step`] with how the previous effect settled and receives
//! either the next effect to perform or the final value:
//!
//! ```text
//!   step(Value(Unit)) ──► Yield(take "A")
//!   step(Value(a))    ──► Yield(call f(a))
//!   step(Value(r))    ──► Done(r)
//! ```
//!
//! The first step always receives `Resume::Value(Value::Unit)`. Returning
//! `Err` raises an uncaught failure in the task.
//!
//! Sagas are written by hand as state holders. [`from_fn`] wraps a closure,
//! and [`Fsm`] provides the table-driven shape the built-in helpers use.

mod adapter;
mod fsm;
mod helpers;

pub use fsm::{Fsm, Move, Transition, END};
pub use helpers::{take_every_helper, take_latest_helper, throttle_helper};

pub(crate) use adapter::task_saga;

use core::fmt;

use crate::effect::Effect;
use crate::error::Result;
use crate::types::{Resume, Value};

/// Result of one step.
#[derive(Debug)]
pub enum Step {
    /// Perform this effect, then step again with its result.
    Yield(Effect),
    /// The computation finished with this value.
    Done(Value),
}

/// A suspendable computation.
pub trait Saga {
    /// Advances the computation.
    ///
    /// # Errors
    ///
    /// An error is an uncaught failure of the computation. It terminates the
    /// task and propagates to the parent.
    fn step(&mut self, input: Resume) -> Result<Step>;

    /// Name used for the task and in the saga stack.
    fn name(&self) -> &str {
        "anonymous"
    }
}

impl<S: Saga + ?Sized> Saga for Box<S> {
    fn step(&mut self, input: Resume) -> Result<Step> {
        (**self).step(input)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// A saga backed by a closure.
pub struct FnSaga<F> {
    name: String,
    f: F,
}

impl<F> Saga for FnSaga<F>
where
    F: FnMut(Resume) -> Result<Step>,
{
    fn step(&mut self, input: Resume) -> Result<Step> {
        (self.f)(input)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<F> fmt::Debug for FnSaga<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSaga").field("name", &self.name).finish()
    }
}

/// Wraps a step closure as a saga.
///
/// ```
/// use sagaflow::effect;
/// use sagaflow::saga::{self, Saga, Step};
/// use sagaflow::types::{Resume, Value};
///
/// let mut first = true;
/// let mut s = saga::from_fn("wait-for-a", move |input: Resume| {
///     if std::mem::take(&mut first) {
///         return Ok(Step::Yield(effect::take("A")));
///     }
///     Ok(Step::Done(input.value().cloned().unwrap_or_default()))
/// });
/// assert!(matches!(s.step(Resume::Value(Value::Unit)), Ok(Step::Yield(_))));
/// assert_eq!(s.name(), "wait-for-a");
/// ```
pub fn from_fn<F>(name: &str, f: F) -> FnSaga<F>
where
    F: FnMut(Resume) -> Result<Step>,
{
    FnSaga {
        name: name.to_owned(),
        f,
    }
}
