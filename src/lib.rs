//! Sagaflow: a cooperative, effect-driven saga runtime.
//!
//! # Overview
//!
//! A saga is a suspendable computation that never performs side effects
//! itself. It yields effect descriptors (take an event, dispatch an event,
//! call a function, fork a child, race several effects) and the runtime
//! performs them and resumes the saga with the result. Everything runs on
//! one thread, cooperatively, against an event hub the application owns.
//!
//! # Core Guarantees
//!
//! - **Supervision**: a task completes only when its main computation and
//!   every attached child have completed; the first failure cancels the rest
//! - **Cancellation reaches everything**: cancelling a task cancels its
//!   pending effect, its race branches and its attached children, and lets
//!   the saga run cleanup effects
//! - **Ordered delivery**: external events are delivered after the running
//!   dispatch unwinds, in arrival order
//! - **Checked channels**: a channel never holds pending takers beside a
//!   non-empty buffer, nor pending takers once closed
//! - **Virtual time**: delays run on a clock the caller advances
//!
//! # Module Structure
//!
//! - [`types`]: Core types (identifiers, outcomes, actions, values)
//! - [`error`]: Error types
//! - [`channel`]: Buffers, channels and event channels
//! - [`hub`]: The event hub boundary and an in-memory hub
//! - [`scheduler`]: Reentrancy guard for dispatch
//! - [`sync`]: Settle-once awaitables
//! - [`time`]: Virtual clock
//! - [`effect`]: Effect descriptors and constructors
//! - [`saga`]: The step protocol and built-in helpers
//! - [`processor`]: The effect interpreter
//! - [`monitor`]: Observer hooks and the diagnostic sink
//! - [`config`]: Runtime configuration
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use sagaflow::{effect, saga, Action, LocalHub, Runtime, Value};
//! use sagaflow::effect::Func;
//!
//! let hub = Rc::new(LocalHub::new());
//! let runtime = Runtime::new(hub.clone());
//! let greet = Func::new("greet", |_| Ok(Value::Unit));
//! let mut started = false;
//! let task = runtime.run(saga::from_fn("root", move |_| {
//!     if started {
//!         return Ok(saga::Step::Done(Value::Unit));
//!     }
//!     started = true;
//!     Ok(saga::Step::Yield(effect::take_every("HELLO", greet.clone(), vec![])))
//! }));
//! runtime.dispatch(Action::new("HELLO")).expect("dispatch");
//! assert!(task.is_running(), "take_every keeps its parent alive");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_inception)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]

pub mod channel;
pub mod config;
pub mod effect;
pub mod error;
pub mod hub;
pub mod monitor;
pub mod processor;
pub mod saga;
pub mod scheduler;
pub mod sync;
pub mod time;
pub mod tracing_compat;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-exports for convenient access to core types
pub use channel::{Buffer, Channel, Message, Overflow};
pub use config::{ConfigError, RuntimeConfig, SagaOptions};
pub use effect::{Effect, EffectKind, Pattern};
pub use error::{Error, ErrorCategory, ErrorKind, Result, ResultExt};
pub use hub::{EventHub, LocalHub};
pub use monitor::{Logger, NoOpMonitor, SagaMonitor};
pub use processor::{Runtime, RuntimeBuilder, Task};
pub use saga::{Saga, Step};
pub use sync::Deferred;
pub use time::Timer;
pub use types::{Action, EffectId, Outcome, Resume, TaskId, Value};
