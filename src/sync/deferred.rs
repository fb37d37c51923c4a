//! Settle-once awaitable cell.
//!
//! A [`Deferred`] is what a CALL effect suspends on. It settles exactly once
//! with an [`Outcome`]; later settle attempts are ignored. Waiters registered
//! with [`Deferred::then`] run synchronously at settlement, or immediately if
//! the cell already settled.
//!
//! A deferred may carry a canceller. When the effect awaiting it is cancelled
//! (race loss, task cancellation) the interpreter calls [`Deferred::cancel`],
//! which runs the canceller and settles the cell as cancelled. Deferreds
//! without a canceller are left alone on cancellation: other observers may
//! still be waiting on them.

use core::fmt;
use std::cell::RefCell;
use std::rc::Rc;

use crate::error::Error;
use crate::types::{Outcome, Value};

type Waiter = Box<dyn FnOnce(Outcome<Value, Error>)>;
type Canceller = Box<dyn FnOnce()>;

#[derive(Default)]
struct State {
    outcome: Option<Outcome<Value, Error>>,
    waiters: Vec<Waiter>,
    canceller: Option<Canceller>,
}

/// A settle-once awaitable.
#[derive(Clone, Default)]
pub struct Deferred {
    inner: Rc<RefCell<State>>,
}

impl Deferred {
    /// Creates an unsettled deferred without a canceller.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an unsettled deferred whose cancellation runs `canceller`.
    #[must_use]
    pub fn with_canceller(canceller: impl FnOnce() + 'static) -> Self {
        let deferred = Self::new();
        deferred.inner.borrow_mut().canceller = Some(Box::new(canceller));
        deferred
    }

    /// Creates a deferred already resolved with `value`.
    #[must_use]
    pub fn resolved(value: Value) -> Self {
        let deferred = Self::new();
        deferred.resolve(value);
        deferred
    }

    /// Creates a deferred already rejected with `error`.
    #[must_use]
    pub fn rejected(error: Error) -> Self {
        let deferred = Self::new();
        deferred.reject(error);
        deferred
    }

    /// Resolves with `value`. Returns false if already settled.
    pub fn resolve(&self, value: Value) -> bool {
        self.settle(Outcome::Ok(value))
    }

    /// Rejects with `error`. Returns false if already settled.
    pub fn reject(&self, error: Error) -> bool {
        self.settle(Outcome::Err(error))
    }

    /// Settles with `outcome` and runs the waiters in registration order.
    ///
    /// Returns false if already settled.
    pub fn settle(&self, outcome: Outcome<Value, Error>) -> bool {
        let waiters = {
            let mut state = self.inner.borrow_mut();
            if state.outcome.is_some() {
                return false;
            }
            state.outcome = Some(outcome.clone());
            state.canceller = None;
            std::mem::take(&mut state.waiters)
        };
        for waiter in waiters {
            waiter(outcome.clone());
        }
        true
    }

    /// Runs the canceller, then settles as cancelled.
    ///
    /// Returns false if already settled.
    pub fn cancel(&self) -> bool {
        let canceller = {
            let mut state = self.inner.borrow_mut();
            if state.outcome.is_some() {
                return false;
            }
            state.canceller.take()
        };
        if let Some(canceller) = canceller {
            canceller();
        }
        self.settle(Outcome::Cancelled)
    }

    /// Registers a waiter.
    pub fn then(&self, waiter: impl FnOnce(Outcome<Value, Error>) + 'static) {
        let settled = {
            let mut state = self.inner.borrow_mut();
            let Some(outcome) = state.outcome.clone() else {
                state.waiters.push(Box::new(waiter));
                return;
            };
            outcome
        };
        waiter(settled);
    }

    /// Returns true once settled.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.inner.borrow().outcome.is_some()
    }

    /// Returns true if unsettled and carrying a canceller.
    #[must_use]
    pub fn is_cancellable(&self) -> bool {
        let state = self.inner.borrow();
        state.outcome.is_none() && state.canceller.is_some()
    }

    /// The settled outcome, if any.
    #[must_use]
    pub fn outcome(&self) -> Option<Outcome<Value, Error>> {
        self.inner.borrow().outcome.clone()
    }
}

impl PartialEq for Deferred {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.borrow();
        f.debug_struct("Deferred")
            .field("outcome", &state.outcome)
            .field("waiters", &state.waiters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn settles_once() {
        let d = Deferred::new();
        assert!(d.resolve(Value::from(1)));
        assert!(!d.resolve(Value::from(2)));
        assert!(!d.reject(Error::user("late")));
        assert_eq!(d.outcome(), Some(Outcome::Ok(Value::from(1))));
    }

    #[test]
    fn waiters_run_in_order_and_late_waiters_run_immediately() {
        let d = Deferred::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for tag in ["a", "b"] {
            let log = log.clone();
            d.then(move |o| log.borrow_mut().push((tag, o.is_ok())));
        }
        assert!(log.borrow().is_empty());
        d.resolve(Value::Unit);
        let late = log.clone();
        d.then(move |o| late.borrow_mut().push(("c", o.is_ok())));
        assert_eq!(*log.borrow(), vec![("a", true), ("b", true), ("c", true)]);
    }

    #[test]
    fn cancel_runs_canceller_and_settles_cancelled() {
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        let d = Deferred::with_canceller(move || flag.set(true));
        assert!(d.is_cancellable());
        let seen = Rc::new(RefCell::new(None));
        let sink = seen.clone();
        d.then(move |o| *sink.borrow_mut() = Some(o));
        assert!(d.cancel());
        assert!(ran.get());
        assert_eq!(*seen.borrow(), Some(Outcome::Cancelled));
        assert!(!d.cancel());
    }

    #[test]
    fn canceller_dropped_on_settle() {
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        let d = Deferred::with_canceller(move || flag.set(true));
        d.resolve(Value::Unit);
        assert!(!d.is_cancellable());
        assert!(!d.cancel());
        assert!(!ran.get());
    }

    #[test]
    fn waiter_may_reenter() {
        let d = Deferred::new();
        let inner = d.clone();
        let hits = Rc::new(Cell::new(0));
        let count = hits.clone();
        d.then(move |_| {
            let count = count.clone();
            inner.then(move |_| count.set(count.get() + 1));
        });
        d.reject(Error::user("boom"));
        assert_eq!(hits.get(), 1);
    }
}
