//! Supervision of a task's main computation and its attached children.
//!
//! A task completes only when its main computation and every attached child
//! have completed. The first failure among them aborts the whole group:
//! every remaining member is cancelled and the task fails with that error.
//!
//! ```text
//!   main ──┐
//!   child ─┼──► all done ──► on_done(main's outcome)
//!   child ─┘
//!          └──► any error ──► cancel the rest ──► on_done(Err)
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::Error;
use crate::types::{Outcome, TaskId, Value};

/// Receives the outcome of a supervised member or of the whole group.
pub(crate) type Continuation = Box<dyn FnOnce(Outcome<Value, Error>)>;

/// A member of a fork queue.
pub(crate) trait Supervised {
    /// Distinguishes members within one queue.
    fn key(&self) -> TaskId;
    /// Installs, or with `None` clears, the continuation run at completion.
    fn set_continuation(&self, cont: Option<Continuation>);
    /// Cancels the member.
    fn cancel(&self);
}

struct QueueState {
    main_key: TaskId,
    members: Vec<Rc<dyn Supervised>>,
    result: Outcome<Value, Error>,
    completed: bool,
    on_done: Option<Continuation>,
}

/// Fork queue of one task.
pub(crate) struct ForkQueue {
    inner: Rc<RefCell<QueueState>>,
}

impl ForkQueue {
    /// Creates an empty queue. `main_key` identifies the member whose
    /// outcome becomes the group's.
    pub(crate) fn new(main_key: TaskId, on_done: Continuation) -> Self {
        Self {
            inner: Rc::new(RefCell::new(QueueState {
                main_key,
                members: Vec::new(),
                result: Outcome::Ok(Value::Unit),
                completed: false,
                on_done: Some(on_done),
            })),
        }
    }

    /// Adds a member and takes over its continuation.
    pub(crate) fn add_task(&self, member: Rc<dyn Supervised>) {
        let key = member.key();
        self.inner.borrow_mut().members.push(Rc::clone(&member));
        let weak = Rc::downgrade(&self.inner);
        member.set_continuation(Some(Box::new(move |outcome| {
            if let Some(inner) = weak.upgrade() {
                Self { inner }.settle(key, outcome);
            }
        })));
    }

    fn settle(&self, key: TaskId, outcome: Outcome<Value, Error>) {
        if let Outcome::Err(err) = outcome {
            {
                let mut state = self.inner.borrow_mut();
                if state.completed {
                    return;
                }
                state.members.retain(|m| m.key() != key);
            }
            self.abort(err);
            return;
        }
        let done = {
            let mut state = self.inner.borrow_mut();
            if state.completed {
                return;
            }
            state.members.retain(|m| m.key() != key);
            if key == state.main_key {
                state.result = outcome;
            }
            if state.members.is_empty() {
                state.completed = true;
                state.on_done.take().map(|cb| (cb, state.result.clone()))
            } else {
                None
            }
        };
        if let Some((on_done, result)) = done {
            on_done(result);
        }
    }

    /// Cancels every member, then fails the group with `err`.
    pub(crate) fn abort(&self, err: Error) {
        let on_done = {
            let mut state = self.inner.borrow_mut();
            if state.completed {
                return;
            }
            state.on_done.take()
        };
        self.cancel_all();
        if let Some(on_done) = on_done {
            on_done(Outcome::Err(err));
        }
    }

    /// Cancels every member without reporting. Idempotent.
    pub(crate) fn cancel_all(&self) {
        let members = {
            let mut state = self.inner.borrow_mut();
            if state.completed {
                return;
            }
            state.completed = true;
            std::mem::take(&mut state.members)
        };
        for member in &members {
            member.set_continuation(None);
        }
        for member in members {
            member.cancel();
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.borrow().members.len()
    }

    #[cfg(test)]
    pub(crate) fn is_completed(&self) -> bool {
        self.inner.borrow().completed
    }
}
