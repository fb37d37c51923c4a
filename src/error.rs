//! Error types and error handling strategy for sagaflow.
//!
//! This module defines the core error types used throughout the runtime.
//! Error handling follows these principles:
//!
//! - Errors are explicit and typed (no stringly-typed errors)
//! - Caller mistakes, capacity limits, runtime defects and computation
//!   failures are distinct categories and never conflated
//! - An error that terminates a task carries the chain of task names it
//!   travelled through (the saga stack)
//!
//! # Error Categories
//!
//! - **Contract**: the caller broke an API contract (undefined action,
//!   invalid argument). Raised synchronously at the call site.
//! - **Capacity**: a buffer under the reject policy overflowed.
//! - **Internal**: the runtime detected an inconsistent state of its own.
//!   These indicate a bug in sagaflow, not in the caller.
//! - **Computation**: a computation failed, or a failure was injected into
//!   it by a CALL/CPS/JOIN. Propagates up exactly one task at a time.

use core::fmt;
use std::sync::Arc;

use crate::types::{EffectId, TaskId};

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // === Caller contract ===
    /// An action (event) was absent or had no type.
    UndefinedInput,
    /// An argument did not satisfy the operation's contract.
    InvalidArgument,

    // === Capacity ===
    /// A buffer under the reject policy was full.
    BufferOverflow,

    // === Internal / state machine ===
    /// A channel invariant (taker/buffer exclusivity, closed/taker
    /// exclusivity) was violated.
    InvariantViolation,
    /// Internal runtime error (bug).
    Internal,
    /// Invalid state transition, e.g. resuming a finished computation.
    InvalidStateTransition,

    // === Computation ===
    /// Operation was cancelled.
    Cancelled,
    /// Error raised by a computation or an invoked function.
    User,
}

impl ErrorKind {
    /// Returns the error category for this kind.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::UndefinedInput | Self::InvalidArgument => ErrorCategory::Contract,
            Self::BufferOverflow => ErrorCategory::Capacity,
            Self::InvariantViolation | Self::Internal | Self::InvalidStateTransition => {
                ErrorCategory::Internal
            }
            Self::Cancelled | Self::User => ErrorCategory::Computation,
        }
    }
}

/// High-level error category for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The caller violated an API contract.
    Contract,
    /// A bounded resource was exhausted.
    Capacity,
    /// The runtime reached an inconsistent state.
    Internal,
    /// A computation failed.
    Computation,
}

/// Diagnostic context for an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// The task where the error originated.
    pub task_id: Option<TaskId>,
    /// The effect whose interpretation produced the error.
    pub effect_id: Option<EffectId>,
    /// Names of the tasks the error propagated through, innermost first.
    pub saga_stack: Vec<String>,
}

/// The main error type for sagaflow operations.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
    context: ErrorContext,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
            context: ErrorContext {
                task_id: None,
                effect_id: None,
                saga_stack: Vec::new(),
            },
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns true if this error represents cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// Returns true if this error reports a defect in the runtime itself.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self.kind.category(), ErrorCategory::Internal)
    }

    /// Returns true if the caller broke an API contract.
    #[must_use]
    pub const fn is_contract_violation(&self) -> bool {
        matches!(self.kind.category(), ErrorCategory::Contract)
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Adds structured context to the error.
    #[must_use]
    pub fn with_context(mut self, ctx: ErrorContext) -> Self {
        self.context = ctx;
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Records the task in which the error originated, if not already set.
    #[must_use]
    pub fn in_task(mut self, task_id: TaskId) -> Self {
        self.context.task_id.get_or_insert(task_id);
        self
    }

    /// Records the effect whose interpretation failed, if not already set.
    #[must_use]
    pub fn at_effect(mut self, effect_id: EffectId) -> Self {
        self.context.effect_id.get_or_insert(effect_id);
        self
    }

    /// Appends a task name to the saga stack.
    #[must_use]
    pub fn push_frame(mut self, task_name: impl Into<String>) -> Self {
        self.context.saga_stack.push(task_name.into());
        self
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        self.kind.category()
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the error context.
    #[must_use]
    pub fn context(&self) -> &ErrorContext {
        &self.context
    }

    /// Returns the names of the tasks this error terminated, innermost first.
    #[must_use]
    pub fn saga_stack(&self) -> &[String] {
        &self.context.saga_stack
    }

    /// Creates an undefined-input error (missing or untyped action).
    #[must_use]
    pub fn undefined_input(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::UndefinedInput).with_message(detail)
    }

    /// Creates an invalid-argument error.
    #[must_use]
    pub fn invalid_argument(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument).with_message(detail)
    }

    /// Creates a buffer overflow error.
    #[must_use]
    pub fn buffer_overflow(capacity: usize) -> Self {
        Self::new(ErrorKind::BufferOverflow)
            .with_message(format!("channel buffer overflow (capacity {capacity})"))
    }

    /// Creates an invariant-violation error.
    ///
    /// The message points the reader at the runtime, not at their code.
    #[must_use]
    pub fn invariant(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvariantViolation).with_message(format!(
            "inconsistent runtime state detected (this is a sagaflow bug): {}",
            detail.into()
        ))
    }

    /// Creates an internal error (runtime bug).
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal).with_message(detail)
    }

    /// Creates a user error, as raised by a computation.
    #[must_use]
    pub fn user(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::User).with_message(detail)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

// Sources are opaque; two errors are equal when they say the same thing.
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.message == other.message && self.context == other.context
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

/// Extension trait for adding context to Results.
#[allow(clippy::result_large_err)]
pub trait ResultExt<T> {
    /// Attach a context message on error.
    fn context(self, msg: impl Into<String>) -> Result<T>;
    /// Attach context message computed lazily on error.
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for core::result::Result<T, E> {
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_message(msg))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| e.into().with_message(f()))
    }
}

/// A specialized Result type for sagaflow operations.
#[allow(clippy::result_large_err)]
pub type Result<T> = core::result::Result<T, Error>;
