//! Three-valued outcome type.
//!
//! The outcome type represents how a task (or a deferred) finished:
//!
//! - `Ok(T)`: Success with value
//! - `Err(E)`: The computation failed
//! - `Cancelled`: The task was cancelled before it finished

/// The three-valued outcome of a task.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T, E> {
    /// Success with a value.
    Ok(T),
    /// The computation failed.
    Err(E),
    /// The task was cancelled.
    Cancelled,
}

impl<T, E> Outcome<T, E> {
    /// Returns true if this outcome is `Ok`.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// Returns true if this outcome is `Err`.
    #[must_use]
    pub const fn is_err(&self) -> bool {
        matches!(self, Self::Err(_))
    }

    /// Returns true if this outcome is `Cancelled`.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Borrows the success value, if any.
    #[must_use]
    pub const fn ok(&self) -> Option<&T> {
        match self {
            Self::Ok(v) => Some(v),
            _ => None,
        }
    }

    /// Borrows the error, if any.
    #[must_use]
    pub const fn err(&self) -> Option<&E> {
        match self {
            Self::Err(e) => Some(e),
            _ => None,
        }
    }

    /// Maps the success value using the provided function.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U, E> {
        match self {
            Self::Ok(v) => Outcome::Ok(f(v)),
            Self::Err(e) => Outcome::Err(e),
            Self::Cancelled => Outcome::Cancelled,
        }
    }
}

impl<T, E> From<Result<T, E>> for Outcome<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(v) => Self::Ok(v),
            Err(e) => Self::Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors() {
        let err: Outcome<i32, &str> = Outcome::Err("bad");
        assert_eq!(err.err(), Some(&"bad"));
        assert_eq!(err.ok(), None);
        assert_eq!(Outcome::<i32, &str>::Ok(3).map(|v| v * 2), Outcome::Ok(6));
        assert!(Outcome::<i32, &str>::Cancelled.is_cancelled());
    }
}
