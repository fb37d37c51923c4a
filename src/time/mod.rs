//! Virtual time.
//!
//! The runtime never reads the wall clock. A [`Timer`] keeps a virtual
//! `now` and a set of pending deadlines; time moves only when the host calls
//! [`Timer::advance`]. Delays are [`Deferred`]s, so a computation waits on
//! one by yielding a CALL of [`crate::effect::delay`].
//!
//! # Example
//!
//! ```
//! use sagaflow::time::Timer;
//! use sagaflow::types::Time;
//! use std::time::Duration;
//!
//! let timer = Timer::new();
//! let done = timer.delay(Duration::from_millis(100));
//! timer.advance(Duration::from_millis(99));
//! assert!(!done.is_settled());
//! timer.advance(Duration::from_millis(1));
//! assert!(done.is_settled());
//! assert_eq!(timer.now(), Time::from_millis(100));
//! ```

use core::fmt;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use crate::sync::Deferred;
use crate::types::{Time, Value};

#[derive(Default)]
struct Wheel {
    now: Time,
    seq: u64,
    pending: BTreeMap<(Time, u64), Deferred>,
}

/// Virtual clock plus pending delays.
///
/// Cloning yields another handle to the same clock.
#[derive(Clone, Default)]
pub struct Timer {
    inner: Rc<RefCell<Wheel>>,
}

impl Timer {
    /// Creates a timer at [`Time::ZERO`] with nothing pending.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> Time {
        self.inner.borrow().now
    }

    /// A deferred that resolves with `true` once `duration` has elapsed.
    ///
    /// Cancelling the deferred removes the pending deadline. Delays sharing
    /// a deadline fire in creation order.
    #[must_use]
    pub fn delay(&self, duration: Duration) -> Deferred {
        let key = {
            let mut wheel = self.inner.borrow_mut();
            wheel.seq += 1;
            (wheel.now + duration, wheel.seq)
        };
        let weak = Rc::downgrade(&self.inner);
        let deferred = Deferred::with_canceller(move || {
            if let Some(wheel) = weak.upgrade() {
                wheel.borrow_mut().pending.remove(&key);
            }
        });
        self.inner.borrow_mut().pending.insert(key, deferred.clone());
        deferred
    }

    /// Moves time forward by `duration`, firing due delays in deadline order.
    ///
    /// While a delay fires, `now` reads as its deadline. Delays created by a
    /// firing delay fire in the same call if they fall due.
    ///
    /// Returns the number of delays fired.
    pub fn advance(&self, duration: Duration) -> usize {
        let target = self.now() + duration;
        let mut fired = 0;
        loop {
            let due = {
                let mut wheel = self.inner.borrow_mut();
                match wheel.pending.first_key_value() {
                    Some((&(deadline, _), _)) if deadline <= target => {
                        wheel.now = deadline;
                        wheel.pending.pop_first().map(|(_, d)| d)
                    }
                    _ => None,
                }
            };
            let Some(deferred) = due else {
                break;
            };
            deferred.resolve(Value::Bool(true));
            fired += 1;
        }
        self.inner.borrow_mut().now = target;
        fired
    }

    /// Earliest pending deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Time> {
        self.inner
            .borrow()
            .pending
            .first_key_value()
            .map(|(&(deadline, _), _)| deadline)
    }

    /// Number of pending delays.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.borrow().pending.len()
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let wheel = self.inner.borrow();
        f.debug_struct("Timer")
            .field("now", &wheel.now)
            .field("pending", &wheel.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Outcome;
    use std::cell::Cell;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn fires_in_deadline_order() {
        let timer = Timer::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for (tag, delay) in [("late", 30), ("early", 10), ("tie", 10)] {
            let order = order.clone();
            let t = timer.clone();
            timer
                .delay(ms(delay))
                .then(move |_| order.borrow_mut().push((tag, t.now().as_millis())));
        }
        assert_eq!(timer.advance(ms(50)), 3);
        assert_eq!(
            *order.borrow(),
            vec![("early", 10), ("tie", 10), ("late", 30)]
        );
        assert_eq!(timer.now(), Time::from_millis(50));
    }

    #[test]
    fn cancelled_delay_never_fires() {
        let timer = Timer::new();
        let d = timer.delay(ms(5));
        assert_eq!(timer.pending_count(), 1);
        assert!(d.cancel());
        assert_eq!(timer.pending_count(), 0);
        assert_eq!(timer.advance(ms(10)), 0);
        assert_eq!(d.outcome(), Some(Outcome::Cancelled));
    }

    #[test]
    fn chained_delays_fire_within_one_advance() {
        let timer = Timer::new();
        let hits = Rc::new(Cell::new(0));
        let (t, h) = (timer.clone(), hits.clone());
        timer.delay(ms(10)).then(move |_| {
            h.set(h.get() + 1);
            let h = h.clone();
            t.delay(ms(10)).then(move |_| h.set(h.get() + 1));
        });
        timer.advance(ms(20));
        assert_eq!(hits.get(), 2);
        assert_eq!(timer.next_deadline(), None);
    }
}
