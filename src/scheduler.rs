//! Reentrancy guard for dispatch.
//!
//! [`Scheduler::asap`] runs a job immediately unless another job is already
//! running (or the scheduler is suspended), in which case the job is queued
//! and runs once the current one unwinds. This keeps nested dispatch from
//! growing the call stack and preserves arrival order of external events.
//!
//! ```text
//!   asap(a) ──► run a ──► a calls asap(b) ──► queued
//!                 │
//!                 └── a returns ──► run b
//! ```

use core::fmt;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

/// A deferred unit of work.
pub type Job = Box<dyn FnOnce()>;

/// Semaphore-guarded job queue.
#[derive(Default)]
pub struct Scheduler {
    queue: RefCell<VecDeque<Job>>,
    semaphore: Cell<usize>,
}

impl Scheduler {
    /// Creates an idle scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `job` now if idle, otherwise after the running job finishes.
    pub fn asap(&self, job: impl FnOnce() + 'static) {
        self.queue.borrow_mut().push_back(Box::new(job));
        if self.semaphore.get() == 0 {
            self.suspend();
            self.flush();
        }
    }

    /// Holds back queued jobs until the matching [`Scheduler::flush`].
    pub fn suspend(&self) {
        self.semaphore.set(self.semaphore.get() + 1);
    }

    fn release(&self) {
        self.semaphore.set(self.semaphore.get().saturating_sub(1));
    }

    /// Releases one suspension and, if none remain, drains the queue.
    pub fn flush(&self) {
        self.release();
        while self.semaphore.get() == 0 {
            let Some(job) = self.queue.borrow_mut().pop_front() else {
                break;
            };
            self.suspend();
            job();
            self.release();
        }
    }

    /// Number of jobs waiting to run.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Returns true while a job is running or the scheduler is suspended.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.semaphore.get() > 0
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.pending())
            .field("semaphore", &self.semaphore.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn idle_scheduler_runs_immediately() {
        let sched = Scheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        sched.asap(move || sink.borrow_mut().push(1));
        assert_eq!(*log.borrow(), vec![1]);
        assert!(!sched.is_busy());
    }

    #[test]
    fn nested_jobs_run_after_the_current_one() {
        let sched = Rc::new(Scheduler::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        let (s, l) = (sched.clone(), log.clone());
        sched.asap(move || {
            l.borrow_mut().push("outer:start");
            let inner = l.clone();
            s.asap(move || inner.borrow_mut().push("inner"));
            l.borrow_mut().push("outer:end");
        });
        assert_eq!(*log.borrow(), vec!["outer:start", "outer:end", "inner"]);
    }

    #[test]
    fn suspend_holds_jobs_until_flush() {
        let sched = Scheduler::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        sched.suspend();
        for n in 0..3 {
            let sink = log.clone();
            sched.asap(move || sink.borrow_mut().push(n));
        }
        assert!(log.borrow().is_empty());
        assert_eq!(sched.pending(), 3);
        sched.flush();
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert_eq!(sched.pending(), 0);
    }

    #[test]
    fn nested_suspension_needs_matching_flushes() {
        let sched = Scheduler::new();
        let hits = Rc::new(Cell::new(0));
        sched.suspend();
        sched.suspend();
        let h = hits.clone();
        sched.asap(move || h.set(h.get() + 1));
        sched.flush();
        assert_eq!(hits.get(), 0);
        sched.flush();
        assert_eq!(hits.get(), 1);
    }
}
