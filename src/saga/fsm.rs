//! Table-driven sagas.
//!
//! An [`Fsm`] holds pattern-local data and a table from state names to
//! transitions. Each transition returns a [`Move`]: the next state, the
//! effect to yield and optionally a function storing the effect's result in
//! the data before the next transition runs. Reaching [`END`] finishes the
//! saga.
//!
//! ```text
//!           ┌──────────── capture(action) ───────────┐
//!           ▼                                        │
//!   q1 ── take(pattern) ──► q2 ── fork(worker, action) ──┐
//!   ▲                       │                            │
//!   │                       └── action is End ──► END    │
//!   └────────────────────────────────────────────────────┘
//! ```

use core::fmt;

use super::{Saga, Step};
use crate::effect::Effect;
use crate::error::{Error, Result};
use crate::types::{Resume, Value};

/// The terminal state.
pub const END: &str = "END";

/// A state's transition.
pub type Transition<S> = fn(&mut S) -> Result<Move<S>>;

/// Stores an effect's result into the pattern data.
pub type Capture<S> = fn(&mut S, Value);

/// Where a transition leads.
pub struct Move<S> {
    state: &'static str,
    effect: Option<Effect>,
    capture: Option<Capture<S>>,
}

impl<S> Move<S> {
    /// Go to `state` after yielding `effect`.
    #[must_use]
    pub const fn to(state: &'static str, effect: Effect) -> Self {
        Self {
            state,
            effect: Some(effect),
            capture: None,
        }
    }

    /// Finish the saga.
    #[must_use]
    pub const fn end() -> Self {
        Self {
            state: END,
            effect: None,
            capture: None,
        }
    }

    /// Store the yielded effect's result with `capture`.
    #[must_use]
    pub fn capture(mut self, capture: Capture<S>) -> Self {
        self.capture = Some(capture);
        self
    }
}

/// A saga driven by a state table.
pub struct Fsm<S> {
    name: String,
    table: Vec<(&'static str, Transition<S>)>,
    state: &'static str,
    capture: Option<Capture<S>>,
    data: S,
}

impl<S> Fsm<S> {
    /// Creates a machine starting in `initial`.
    pub fn new(
        name: impl Into<String>,
        data: S,
        initial: &'static str,
        table: &[(&'static str, Transition<S>)],
    ) -> Self {
        Self {
            name: name.into(),
            table: table.to_vec(),
            state: initial,
            capture: None,
            data,
        }
    }

    /// The current state name.
    #[must_use]
    pub const fn state(&self) -> &'static str {
        self.state
    }

    /// Pattern-local data.
    #[must_use]
    pub const fn data(&self) -> &S {
        &self.data
    }

    fn transition(&self) -> Result<Transition<S>> {
        self.table
            .iter()
            .find(|(name, _)| *name == self.state)
            .map(|(_, t)| *t)
            .ok_or_else(|| {
                Error::internal(format!("{}: no transition for state {}", self.name, self.state))
            })
    }
}

impl<S> Saga for Fsm<S> {
    fn step(&mut self, input: Resume) -> Result<Step> {
        if self.state == END {
            return Ok(Step::Done(Value::Unit));
        }
        let value = match input {
            Resume::Value(value) => value,
            Resume::Error(err) => {
                self.state = END;
                return Err(err);
            }
            Resume::Cancel | Resume::Close => {
                self.state = END;
                return Ok(Step::Done(Value::Unit));
            }
        };
        if let Some(capture) = self.capture.take() {
            capture(&mut self.data, value);
        }
        let next = (self.transition()?)(&mut self.data)?;
        self.state = next.state;
        self.capture = next.capture;
        match next.effect {
            _ if next.state == END => Ok(Step::Done(Value::Unit)),
            Some(effect) => Ok(Step::Yield(effect)),
            None => Err(Error::internal(format!(
                "{}: state {} yields nothing",
                self.name, next.state
            ))),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<S: fmt::Debug> fmt::Debug for Fsm<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fsm")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}
