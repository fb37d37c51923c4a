//! Synchronous subscriber list.

use core::fmt;
use std::cell::RefCell;
use std::rc::Rc;

use crate::channel::{Emit, Message, Unsubscribe};
use crate::error::Result;
use crate::tracing_compat::warn;

struct Subscribers<T> {
    next_id: u64,
    entries: Vec<(u64, Emit<T>)>,
}

/// Fan-out of messages to subscribed sinks.
///
/// Emission runs over a snapshot of the subscriber list, so sinks may
/// subscribe or unsubscribe while a message is being delivered.
pub struct Emitter<T> {
    subscribers: Rc<RefCell<Subscribers<T>>>,
}

impl<T: Clone + 'static> Emitter<T> {
    /// Creates an emitter without subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: Rc::new(RefCell::new(Subscribers {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Adds a sink. The returned handle removes it.
    pub fn subscribe(&self, sink: Emit<T>) -> Unsubscribe {
        let id = {
            let mut subs = self.subscribers.borrow_mut();
            subs.next_id += 1;
            let id = subs.next_id;
            subs.entries.push((id, sink));
            id
        };
        let weak = Rc::downgrade(&self.subscribers);
        Box::new(move || {
            if let Some(subs) = weak.upgrade() {
                subs.borrow_mut().entries.retain(|(entry, _)| *entry != id);
            }
        })
    }

    /// Delivers `msg` to every sink subscribed when the call started.
    ///
    /// Every sink runs even if an earlier one fails; the first failure is
    /// returned and later ones are logged.
    pub fn emit(&self, msg: Message<T>) -> Result<()> {
        let snapshot: Vec<Emit<T>> = self
            .subscribers
            .borrow()
            .entries
            .iter()
            .map(|(_, sink)| Rc::clone(sink))
            .collect();
        let mut first_err = None;
        for sink in snapshot {
            if let Err(err) = sink(msg.clone()) {
                if first_err.is_none() {
                    first_err = Some(err);
                } else {
                    warn!(error = %err, "subscriber failed after an earlier failure");
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Number of subscribed sinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.borrow().entries.len()
    }

    /// Returns true when nothing is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + 'static> Default for Emitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("subscribers", &self.subscribers.borrow().entries.len())
            .finish()
    }
}
