//! Dynamic values exchanged between the interpreter and computations.

use crate::channel::Channel;
use crate::error::Error;
use crate::processor::Task;
use crate::sync::Deferred;
use crate::types::Action;

/// A resumption value.
///
/// Effects settle with a `Value`; computations receive it through
/// [`Resume::Value`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// No meaningful value.
    #[default]
    Unit,
    /// A flag, e.g. the answer to a CANCELLED query.
    Bool(bool),
    /// Arbitrary data.
    Data(serde_json::Value),
    /// An event taken from a channel.
    Action(Action),
    /// End-of-stream, seen by `take_maybe` and `flush` on a closed channel.
    End,
    /// Handle to a forked task.
    Task(Task),
    /// Handle to a channel.
    Channel(Channel<Value>),
    /// A drained buffer.
    List(Vec<Value>),
    /// The winning branch of a race.
    Raced {
        /// Position of the winning effect in the race.
        index: usize,
        /// What the winner settled with.
        value: Box<Value>,
    },
    /// An awaitable; yielding a CALL that returns one suspends until it settles.
    Pending(Deferred),
}

impl Value {
    /// Returns true for the end-of-stream value.
    #[must_use]
    pub const fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }

    /// Borrows the action, if this is one.
    #[must_use]
    pub const fn as_action(&self) -> Option<&Action> {
        match self {
            Self::Action(a) => Some(a),
            _ => None,
        }
    }

    /// Borrows the task handle, if this is one.
    #[must_use]
    pub const fn as_task(&self) -> Option<&Task> {
        match self {
            Self::Task(t) => Some(t),
            _ => None,
        }
    }

    /// Borrows the channel handle, if this is one.
    #[must_use]
    pub const fn as_channel(&self) -> Option<&Channel<Self>> {
        match self {
            Self::Channel(c) => Some(c),
            _ => None,
        }
    }

    /// Borrows the data, if this is data.
    #[must_use]
    pub const fn as_data(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Data(d) => Some(d),
            _ => None,
        }
    }

    /// Returns the flag, if this is a boolean.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the data as an integer, if it is one.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.as_data().and_then(serde_json::Value::as_i64)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Self::Data(value)
    }
}

impl From<Action> for Value {
    fn from(action: Action) -> Self {
        Self::Action(action)
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Self::Bool(flag)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Data(n.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Data(s.into())
    }
}

impl From<Task> for Value {
    fn from(task: Task) -> Self {
        Self::Task(task)
    }
}

impl From<Channel<Self>> for Value {
    fn from(channel: Channel<Self>) -> Self {
        Self::Channel(channel)
    }
}

/// What a computation is stepped with.
#[derive(Debug, Clone)]
pub enum Resume {
    /// The previous effect settled with a value.
    Value(Value),
    /// The previous effect failed; the computation may handle it or fail.
    Error(Error),
    /// The task was cancelled. Cleanup effects may still be yielded and
    /// CANCELLED answers `true` from here on.
    Cancel,
    /// A TAKE without the maybe flag saw end-of-stream; the computation
    /// should finish.
    Close,
}

impl Resume {
    /// Borrows the value, if this is a value resumption.
    #[must_use]
    pub const fn value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accessors_match_variants() {
        let action = Value::from(Action::new("A"));
        assert_eq!(action.as_action().map(|a| a.kind.as_str()), Some("A"));
        assert!(action.as_task().is_none());
        assert_eq!(Value::from(7).as_i64(), Some(7));
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert!(Value::End.is_end());
        assert!(!Value::Unit.is_end());
    }

    #[test]
    fn raced_values_compare_structurally() {
        let a = Value::Raced {
            index: 1,
            value: Box::new(Value::from(json!("x"))),
        };
        let b = Value::Raced {
            index: 1,
            value: Box::new(Value::from("x")),
        };
        assert_eq!(a, b);
    }

    #[test]
    fn resume_value_accessor() {
        assert_eq!(Resume::Value(Value::Unit).value(), Some(&Value::Unit));
        assert!(Resume::Cancel.value().is_none());
    }
}
