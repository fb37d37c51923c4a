//! In-memory event hub.

use core::fmt;
use std::cell::RefCell;

use super::{Emitter, EventHub, Listener};
use crate::channel::{Message, Unsubscribe};
use crate::error::Result;
use crate::types::{Action, Value};

/// Computes the next state from the current one and an action.
pub type Reducer = Box<dyn Fn(&Value, &Action) -> Value>;

/// An [`EventHub`] holding state in memory.
///
/// Dispatch validates the action, applies the reducer (if any), records the
/// action in the dispatch log and notifies subscribers.
pub struct LocalHub {
    emitter: Emitter<Action>,
    state: RefCell<Value>,
    reducer: Option<Reducer>,
    log: RefCell<Vec<Action>>,
}

impl LocalHub {
    /// A hub with `Unit` state and no reducer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            emitter: Emitter::new(),
            state: RefCell::new(Value::Unit),
            reducer: None,
            log: RefCell::new(Vec::new()),
        }
    }

    /// A hub whose state starts at `initial` and evolves through `reducer`.
    #[must_use]
    pub fn with_reducer(
        initial: Value,
        reducer: impl Fn(&Value, &Action) -> Value + 'static,
    ) -> Self {
        Self {
            state: RefCell::new(initial),
            reducer: Some(Box::new(reducer)),
            ..Self::new()
        }
    }

    /// Signals end-of-stream to every subscriber.
    pub fn end(&self) -> Result<()> {
        self.emitter.emit(Message::End)
    }

    /// Every action dispatched so far, in order.
    #[must_use]
    pub fn dispatched(&self) -> Vec<Action> {
        self.log.borrow().clone()
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.emitter.len()
    }
}

impl Default for LocalHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub for LocalHub {
    fn subscribe(&self, listener: Listener) -> Unsubscribe {
        self.emitter.subscribe(listener)
    }

    fn dispatch(&self, action: Action) -> Result<Value> {
        action.validate()?;
        if let Some(reducer) = &self.reducer {
            let next = reducer(&self.state.borrow(), &action);
            *self.state.borrow_mut() = next;
        }
        self.log.borrow_mut().push(action.clone());
        self.emitter.emit(Message::Item(action.clone()))?;
        Ok(Value::Action(action))
    }

    fn query_state(&self) -> Value {
        self.state.borrow().clone()
    }
}

impl fmt::Debug for LocalHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalHub")
            .field("state", &self.state.borrow())
            .field("subscribers", &self.emitter.len())
            .field("dispatched", &self.log.borrow().len())
            .finish()
    }
}
