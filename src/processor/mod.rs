//! The effect interpreter.
//!
//! A [`Runtime`] runs sagas as [`Task`]s against an [`EventHub`]. It owns
//! everything its tasks share: the hub, the dispatch [`Scheduler`], the id
//! generator, the virtual [`Timer`], the configuration and the observer
//! hooks. Every task created through a runtime (roots, forks, nested saga
//! calls) is registered in its live table until both the task and its main
//! computation have finished.
//!
//! Everything is single-threaded and synchronous: effects that can settle
//! immediately resume the saga before control returns to whoever started or
//! woke it. Such resumptions are queued and stepped in a loop, never by
//! recursion.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use sagaflow::effect;
//! use sagaflow::hub::LocalHub;
//! use sagaflow::processor::Runtime;
//! use sagaflow::saga::{self, Step};
//! use sagaflow::types::{Action, Resume, Value};
//!
//! let hub = Rc::new(LocalHub::new());
//! let runtime = Runtime::new(hub.clone());
//! let mut waiting = false;
//! let task = runtime.run(saga::from_fn("greeter", move |input: Resume| {
//!     if !waiting {
//!         waiting = true;
//!         return Ok(Step::Yield(effect::take("HELLO")));
//!     }
//!     Ok(Step::Done(input.value().cloned().unwrap_or_default()))
//! }));
//! assert!(task.is_running());
//! runtime.dispatch(Action::new("HELLO")).expect("dispatch");
//! assert_eq!(task.result(), Some(Value::Action(Action::new("HELLO"))));
//! ```

mod callback;
mod effects;
mod fork_queue;
mod task;

pub use task::Task;

pub(crate) use callback::Callback;

use core::fmt;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use crate::channel::{Buffer, Channel};
use crate::config::{RuntimeConfig, SagaOptions};
use crate::error::{Error, Result};
use crate::hub::EventHub;
use crate::monitor::{LogLevel, Logger, SagaMonitor, TracingLogger};
use crate::saga::Saga;
use crate::scheduler::Scheduler;
use crate::time::Timer;
use crate::types::{Action, EffectId, IdGen, TaskId, Value};

use task::TaskCore;

/// State shared by every task of one runtime.
pub(crate) struct Env {
    hub: Rc<dyn EventHub>,
    scheduler: Rc<Scheduler>,
    ids: IdGen,
    timer: Timer,
    config: RuntimeConfig,
    options: SagaOptions,
    live: RefCell<BTreeMap<TaskId, Rc<TaskCore>>>,
}

impl Env {
    fn log(&self, level: LogLevel, message: &str, detail: Option<&Error>) {
        match &self.options.logger {
            Some(logger) => logger.log(level, message, detail),
            None => TracingLogger.log(level, message, detail),
        }
    }

    /// Hands the failure of a task nobody supervises to the error handler,
    /// or logs it.
    fn report_uncaught(&self, name: &str, err: &Error) {
        match &self.options.on_error {
            Some(handler) => handler(err),
            None => {
                let stack = err.saga_stack().join(" <- ");
                self.log(
                    LogLevel::Error,
                    &format!("uncaught at {name} (saga stack: {stack})"),
                    Some(err),
                );
            }
        }
    }

    fn register(&self, task: &Rc<TaskCore>) {
        self.live.borrow_mut().insert(task.id, Rc::clone(task));
    }
}

/// Handle to a saga runtime. Clones share the runtime.
#[derive(Clone)]
pub struct Runtime {
    env: Rc<Env>,
}

impl Runtime {
    /// A runtime over `hub` with default configuration.
    pub fn new(hub: Rc<dyn EventHub>) -> Self {
        Self::from_parts(hub, RuntimeConfig::default(), SagaOptions::default(), Timer::new())
    }

    /// Starts a builder.
    #[must_use]
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    fn from_parts(
        hub: Rc<dyn EventHub>,
        config: RuntimeConfig,
        options: SagaOptions,
        timer: Timer,
    ) -> Self {
        Self {
            env: Rc::new(Env {
                hub,
                scheduler: Rc::new(Scheduler::new()),
                ids: IdGen::new(),
                timer,
                config,
                options,
                live: RefCell::new(BTreeMap::new()),
            }),
        }
    }

    fn from_env(env: Rc<Env>) -> Self {
        Self { env }
    }

    /// Runs `saga` as a root task named after the saga.
    pub fn run(&self, saga: impl Saga + 'static) -> Task {
        let name = saga.name().to_owned();
        self.run_under(saga, &name, EffectId::ROOT)
    }

    /// Runs `saga` as a root task named `name`.
    pub fn run_named(&self, saga: impl Saga + 'static, name: &str) -> Task {
        self.run_under(saga, name, EffectId::ROOT)
    }

    /// Runs `saga` as a root task whose effects report `parent` as their
    /// parent effect id.
    ///
    /// A failure of a root task goes to the `on_error` handler if one is
    /// configured and is logged otherwise.
    pub fn run_under(&self, saga: impl Saga + 'static, name: &str, parent: EffectId) -> Task {
        let core = TaskCore::new(&self.env, Box::new(saga), name, parent);
        self.env.register(&core);
        core.start();
        Task::new(core)
    }

    /// Dispatches an external action through the hub.
    ///
    /// Deliveries are held until every listener has seen the action, so an
    /// action dispatched by a task reacting to this one reaches all tasks
    /// after it.
    ///
    /// # Errors
    ///
    /// `UndefinedInput` for an untyped action; otherwise whatever the hub
    /// or a listener reports.
    pub fn dispatch(&self, action: Action) -> Result<Value> {
        action.validate()?;
        if let Some(monitor) = &self.env.options.monitor {
            monitor.action_dispatched(&action);
        }
        self.env.scheduler.suspend();
        let dispatched = self.env.hub.dispatch(action);
        self.env.scheduler.flush();
        dispatched
    }

    /// Current hub state.
    #[must_use]
    pub fn state(&self) -> Value {
        self.env.hub.query_state()
    }

    /// The virtual clock driving `delay`.
    #[must_use]
    pub fn timer(&self) -> &Timer {
        &self.env.timer
    }

    /// Advances the virtual clock by `by`, firing due delays. Returns how
    /// many fired.
    pub fn advance(&self, by: Duration) -> usize {
        self.env.timer.advance(by)
    }

    /// A fresh channel with a fixed buffer of the default limit.
    #[must_use]
    pub fn channel(&self) -> Channel<Value> {
        Channel::new(Buffer::fixed(self.env.config.default_buffer_limit))
    }

    /// Tasks not yet finished, in creation order.
    #[must_use]
    pub fn live_tasks(&self) -> Vec<Task> {
        self.env
            .live
            .borrow()
            .values()
            .map(|core| Task::new(Rc::clone(core)))
            .collect()
    }

    /// The runtime's configuration.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.env.config
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.env.config)
            .field("options", &self.env.options)
            .field("live_tasks", &self.env.live.borrow().len())
            .field("now", &self.env.timer.now())
            .finish_non_exhaustive()
    }
}

/// Builder for a [`Runtime`] with custom configuration and hooks.
#[derive(Default)]
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    options: SagaOptions,
    timer: Option<Timer>,
}

impl RuntimeBuilder {
    /// A builder with default configuration and no hooks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces every hook at once.
    #[must_use]
    pub fn options(mut self, options: SagaOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the effect monitor.
    #[must_use]
    pub fn monitor(mut self, monitor: Rc<dyn SagaMonitor>) -> Self {
        self.options.monitor = Some(monitor);
        self
    }

    /// Sets the diagnostic sink.
    #[must_use]
    pub fn logger(mut self, logger: Rc<dyn Logger>) -> Self {
        self.options.logger = Some(logger);
        self
    }

    /// Sets the handler for failures of root and detached tasks.
    #[must_use]
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Error) + 'static,
    {
        self.options.on_error = Some(Rc::new(handler));
        self
    }

    /// Shares an existing clock instead of creating one.
    #[must_use]
    pub fn timer(mut self, timer: Timer) -> Self {
        self.timer = Some(timer);
        self
    }

    /// Builds the runtime over `hub`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `default_buffer_limit` is zero.
    pub fn build(self, hub: Rc<dyn EventHub>) -> Result<Runtime> {
        if self.config.default_buffer_limit == 0 {
            return Err(Error::invalid_argument(
                "default_buffer_limit must be at least 1",
            ));
        }
        Ok(Runtime::from_parts(
            hub,
            self.config,
            self.options,
            self.timer.unwrap_or_default(),
        ))
    }
}

impl fmt::Debug for RuntimeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeBuilder")
            .field("config", &self.config)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
