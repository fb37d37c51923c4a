//! Observer hooks and the diagnostic sink.
//!
//! A [`SagaMonitor`] is told about every effect the interpreter starts and
//! how it settles, and about every action the runtime dispatches. Hooks are
//! pure notifications: nothing they return is consumed, and running without
//! a monitor behaves exactly like running with [`NoOpMonitor`].
//!
//! A [`Logger`] receives the runtime's own diagnostics (uncaught task
//! failures, cancellations, discarded errors). The default,
//! [`TracingLogger`], forwards to `tracing`.

use core::fmt;
use std::cell::RefCell;

use crate::effect::{Effect, EffectKind};
use crate::error::Error;
use crate::tracing_compat::{error, info, warn};
use crate::types::{Action, EffectId, Value};

/// What `effect_triggered` receives.
#[derive(Debug)]
pub struct EffectDescription<'a> {
    /// Id of the started effect.
    pub effect_id: EffectId,
    /// Id of the effect it belongs to: the FORK or CALL that started the
    /// task, the enclosing RACE, or [`EffectId::ROOT`].
    pub parent_effect_id: EffectId,
    /// Branch label inside a race, empty otherwise.
    pub label: &'a str,
    /// The effect itself.
    pub effect: &'a Effect,
}

/// Observer of effect lifecycles.
///
/// Every method defaults to doing nothing.
pub trait SagaMonitor {
    /// An effect is about to run.
    fn effect_triggered(&self, _desc: &EffectDescription<'_>) {}

    /// An effect settled with a value.
    fn effect_resolved(&self, _effect_id: EffectId, _value: &Value) {}

    /// An effect failed.
    fn effect_rejected(&self, _effect_id: EffectId, _error: &Error) {}

    /// An effect was cancelled before settling.
    fn effect_cancelled(&self, _effect_id: EffectId) {}

    /// The runtime dispatched an action through the hub.
    fn action_dispatched(&self, _action: &Action) {}
}

/// Monitor that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpMonitor;

impl SagaMonitor for NoOpMonitor {}

/// One recorded monitor notification.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// `effect_triggered`
    Triggered {
        /// Effect id.
        effect_id: EffectId,
        /// Parent effect id.
        parent_effect_id: EffectId,
        /// Race branch label.
        label: String,
        /// Effect tag.
        kind: EffectKind,
    },
    /// `effect_resolved`
    Resolved(EffectId, Value),
    /// `effect_rejected`
    Rejected(EffectId, Error),
    /// `effect_cancelled`
    Cancelled(EffectId),
    /// `action_dispatched`
    Dispatched(Action),
}

/// Monitor that keeps every notification, in order.
#[derive(Default)]
pub struct RecordingMonitor {
    events: RefCell<Vec<MonitorEvent>>,
}

impl RecordingMonitor {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications so far.
    #[must_use]
    pub fn events(&self) -> Vec<MonitorEvent> {
        self.events.borrow().clone()
    }

    /// Kinds of the triggered effects, in order.
    #[must_use]
    pub fn triggered_kinds(&self) -> Vec<EffectKind> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                MonitorEvent::Triggered { kind, .. } => Some(*kind),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: MonitorEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl SagaMonitor for RecordingMonitor {
    fn effect_triggered(&self, desc: &EffectDescription<'_>) {
        self.record(MonitorEvent::Triggered {
            effect_id: desc.effect_id,
            parent_effect_id: desc.parent_effect_id,
            label: desc.label.to_owned(),
            kind: desc.effect.kind(),
        });
    }

    fn effect_resolved(&self, effect_id: EffectId, value: &Value) {
        self.record(MonitorEvent::Resolved(effect_id, value.clone()));
    }

    fn effect_rejected(&self, effect_id: EffectId, error: &Error) {
        self.record(MonitorEvent::Rejected(effect_id, error.clone()));
    }

    fn effect_cancelled(&self, effect_id: EffectId) {
        self.record(MonitorEvent::Cancelled(effect_id));
    }

    fn action_dispatched(&self, action: &Action) {
        self.record(MonitorEvent::Dispatched(action.clone()));
    }
}

impl fmt::Debug for RecordingMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingMonitor")
            .field("events", &self.events.borrow().len())
            .finish()
    }
}

/// Severity of a runtime diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    /// Informational, e.g. a task was cancelled.
    Info,
    /// Something was discarded.
    Warn,
    /// A task failed and nothing handled it.
    Error,
}

/// Sink for runtime diagnostics.
pub trait Logger {
    /// Records one diagnostic. `detail` is the error, if there is one.
    fn log(&self, level: LogLevel, message: &str, detail: Option<&Error>);
}

/// Logger forwarding to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str, detail: Option<&Error>) {
        let detail = detail.map(ToString::to_string).unwrap_or_default();
        match level {
            LogLevel::Info => info!(detail = %detail, "{}", message),
            LogLevel::Warn => warn!(detail = %detail, "{}", message),
            LogLevel::Error => error!(detail = %detail, "{}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_logging;

    #[test]
    fn recording_monitor_keeps_order() {
        let monitor = RecordingMonitor::new();
        let effect = crate::effect::cancelled();
        monitor.effect_triggered(&EffectDescription {
            effect_id: EffectId::new(2),
            parent_effect_id: EffectId::ROOT,
            label: "",
            effect: &effect,
        });
        monitor.effect_resolved(EffectId::new(2), &Value::Bool(false));
        monitor.action_dispatched(&Action::new("A"));
        assert_eq!(monitor.triggered_kinds(), vec![EffectKind::Cancelled]);
        assert_eq!(
            monitor.events()[1..],
            [
                MonitorEvent::Resolved(EffectId::new(2), Value::Bool(false)),
                MonitorEvent::Dispatched(Action::new("A")),
            ]
        );
    }

    #[test]
    fn noop_monitor_accepts_everything() {
        let m = NoOpMonitor;
        m.effect_cancelled(EffectId::new(1));
        m.effect_rejected(EffectId::new(1), &Error::user("x"));
    }

    #[test]
    fn tracing_logger_handles_every_level() {
        init_test_logging();
        let err = Error::user("boom");
        for level in [LogLevel::Info, LogLevel::Warn, LogLevel::Error] {
            TracingLogger.log(level, "diagnostic", Some(&err));
        }
        TracingLogger.log(LogLevel::Info, "no detail", None);
    }
}
