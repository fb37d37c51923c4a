//! Action patterns.
//!
//! A [`Pattern`] is chosen when an effect is built and compiled once into an
//! opaque predicate when the effect is interpreted.

use core::fmt;
use std::rc::Rc;

use crate::channel::ItemMatcher;
use crate::types::{Action, Value};

/// What a TAKE or ACTION_CHANNEL accepts.
#[derive(Clone)]
pub enum Pattern {
    /// Every action.
    Wildcard,
    /// Actions of exactly this type.
    Exact(String),
    /// Actions accepted by any of the nested patterns.
    AnyOf(Vec<Pattern>),
    /// Actions accepted by a predicate.
    Predicate(Rc<dyn Fn(&Action) -> bool>),
}

impl Pattern {
    /// A pattern from a predicate.
    pub fn predicate(f: impl Fn(&Action) -> bool + 'static) -> Self {
        Self::Predicate(Rc::new(f))
    }

    /// Returns true if `action` matches.
    #[must_use]
    pub fn matches(&self, action: &Action) -> bool {
        match self {
            Self::Wildcard => true,
            Self::Exact(kind) => action.kind == *kind,
            Self::AnyOf(patterns) => patterns.iter().any(|p| p.matches(action)),
            Self::Predicate(f) => f(action),
        }
    }

    /// Compiles the pattern into a matcher over channel values.
    ///
    /// Only [`Value::Action`] items can match.
    #[must_use]
    pub fn value_matcher(&self) -> ItemMatcher<Value> {
        match self {
            Self::Wildcard => Rc::new(|v: &Value| v.as_action().is_some()),
            pattern => {
                let pattern = pattern.clone();
                Rc::new(move |v: &Value| v.as_action().is_some_and(|a| pattern.matches(a)))
            }
        }
    }
}

impl From<&str> for Pattern {
    fn from(s: &str) -> Self {
        if s == "*" {
            Self::Wildcard
        } else {
            Self::Exact(s.to_owned())
        }
    }
}

impl From<String> for Pattern {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<Vec<&str>> for Pattern {
    fn from(kinds: Vec<&str>) -> Self {
        Self::AnyOf(kinds.into_iter().map(Self::from).collect())
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wildcard => f.write_str("*"),
            Self::Exact(kind) => write!(f, "{kind:?}"),
            Self::AnyOf(patterns) => f.debug_list().entries(patterns).finish(),
            Self::Predicate(_) => f.write_str("<predicate>"),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wildcard => f.write_str("*"),
            Self::Exact(kind) => f.write_str(kind),
            Self::AnyOf(patterns) => {
                f.write_str("[")?;
                for (i, p) in patterns.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{p}")?;
                }
                f.write_str("]")
            }
            Self::Predicate(_) => f.write_str("<predicate>"),
        }
    }
}
