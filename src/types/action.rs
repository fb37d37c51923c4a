//! The event type flowing between the hub, channels and sagas.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An event dispatched through the hub.
///
/// `kind` is what patterns match against. Actions dispatched by the
/// runtime itself (PUT effects) carry an internal tag so the standard
/// channel can deliver them without deferring through the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Action type matched by patterns.
    #[serde(rename = "type")]
    pub kind: String,
    /// Free-form payload.
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(skip)]
    internal: bool,
}

impl Action {
    /// Creates an action with a `null` payload.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: serde_json::Value::Null,
            internal: false,
        }
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<serde_json::Value>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Returns true if the runtime dispatched this action.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        self.internal
    }

    pub(crate) fn into_internal(mut self) -> Self {
        self.internal = true;
        self
    }

    /// Rejects actions without a type.
    pub fn validate(&self) -> Result<()> {
        if self.kind.is_empty() {
            return Err(Error::undefined_input(
                "an action was provided without a type; check the action creator and the event source",
            ));
        }
        Ok(())
    }
}

// The internal tag is routing metadata, not part of the event.
impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.payload == other.payload
    }
}
