//! Test utilities for sagaflow unit tests.
//!
//! This module provides shared helpers for unit tests:
//! - Consistent tracing-based logging initialization
//! - Phase/section macros for readable test output
//! - Small saga builders and a recording hub for interpreter tests

use crate::effect::Effect;
use crate::error::Result;
use crate::hub::LocalHub;
use crate::processor::Runtime;
use crate::saga::{self, Saga, Step};
use crate::types::{Resume, Value};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Mutex, Once};
use tracing_subscriber::fmt::format::FmtSpan;

static INIT_LOGGING: Once = Once::new();
static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Initialize test logging with trace-level output.
///
/// Safe to call multiple times; only initializes once.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .with_file(true)
            .with_line_number(true)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
            .try_init();
    });
}

/// Acquire the global environment lock for tests that mutate env vars.
pub(crate) fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// A runtime over a fresh [`LocalHub`].
pub(crate) fn test_runtime() -> (Runtime, Rc<LocalHub>) {
    init_test_logging();
    let hub = Rc::new(LocalHub::new());
    (Runtime::new(hub.clone()), hub)
}

/// A saga that yields `effects` in order and records every resumption.
///
/// Finishes with the last value it was resumed with.
pub(crate) fn scripted(
    name: &str,
    effects: Vec<Effect>,
    seen: Rc<RefCell<Vec<Resume>>>,
) -> impl Saga {
    let mut effects = effects.into_iter();
    let mut started = false;
    saga::from_fn(name, move |input: Resume| -> Result<Step> {
        if started {
            seen.borrow_mut().push(input.clone());
        }
        started = true;
        match input {
            Resume::Error(err) => Err(err),
            Resume::Cancel | Resume::Close => Ok(Step::Done(Value::Unit)),
            Resume::Value(last) => Ok(effects
                .next()
                .map_or(Step::Done(last), Step::Yield)),
        }
    })
}

/// Log a test phase transition with a visual separator.
#[macro_export]
macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = %$name, "========================================");
        tracing::info!(phase = %$name, "TEST PHASE: {}", $name);
        tracing::info!(phase = %$name, "========================================");
    };
}

/// Log a section within a test phase.
#[macro_export]
macro_rules! test_section {
    ($name:expr) => {
        tracing::debug!(section = %$name, "--- {} ---", $name);
    };
}

/// Log test completion with summary.
#[macro_export]
macro_rules! test_complete {
    ($name:expr) => {
        tracing::info!(test = %$name, "test completed successfully: {}", $name);
    };
    ($name:expr, $($key:ident = $value:expr),* $(,)?) => {
        tracing::info!(
            test = %$name,
            $($key = %$value,)*
            "test completed successfully: {}",
            $name
        );
    };
}

/// Log before assertions for context.
#[macro_export]
macro_rules! assert_with_log {
    ($cond:expr, $msg:expr, $expected:expr, $actual:expr) => {
        tracing::debug!(
            expected = ?$expected,
            actual = ?$actual,
            "Asserting: {}",
            $msg
        );
        assert!($cond, "{}: expected {:?}, got {:?}", $msg, $expected, $actual);
    };
}

/// Assert that an outcome is Ok with a specific value.
#[macro_export]
macro_rules! assert_outcome_ok {
    ($outcome:expr, $expected:expr) => {
        match $outcome {
            Some($crate::types::Outcome::Ok(v)) => assert_eq!(v, $expected),
            other => unreachable!("expected Outcome::Ok({:?}), got {:?}", $expected, other),
        }
    };
}

/// Assert that an outcome is Cancelled.
#[macro_export]
macro_rules! assert_outcome_cancelled {
    ($outcome:expr) => {
        match $outcome {
            Some($crate::types::Outcome::Cancelled) => {}
            other => unreachable!("expected Outcome::Cancelled, got {:?}", other),
        }
    };
}

/// Assert that an outcome is Err.
#[macro_export]
macro_rules! assert_outcome_err {
    ($outcome:expr) => {
        match $outcome {
            Some($crate::types::Outcome::Err(_)) => {}
            other => unreachable!("expected Outcome::Err, got {:?}", other),
        }
    };
}
