//! The event hub boundary.
//!
//! The runtime does not own application state or decide what events mean.
//! It talks to an [`EventHub`]: something that can be subscribed to, can
//! dispatch actions to its subscribers, and can report its current state.
//!
//! [`LocalHub`] is an in-memory implementation for tests, demos and
//! applications that need nothing more.

mod emitter;
mod local;

pub use emitter::Emitter;
pub use local::{LocalHub, Reducer};

use crate::channel::{Emit, Unsubscribe};
use crate::error::Result;
use crate::types::{Action, Value};

/// Sink subscribed to a hub.
pub type Listener = Emit<Action>;

/// The source of actions and state.
///
/// Implementations must invoke subscribed listeners synchronously inside
/// [`EventHub::dispatch`], before it returns.
pub trait EventHub {
    /// Subscribes `listener`; the returned handle cancels the subscription.
    fn subscribe(&self, listener: Listener) -> Unsubscribe;

    /// Dispatches `action` to every listener.
    ///
    /// The returned value is what a resolving PUT resumes with; a
    /// [`Value::Pending`] result is awaited.
    fn dispatch(&self, action: Action) -> Result<Value>;

    /// Snapshot of the current state, as seen by SELECT.
    fn query_state(&self) -> Value;
}
