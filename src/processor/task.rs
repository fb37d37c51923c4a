//! Task records and handles.
//!
//! A task drives one saga (its main computation) and supervises the
//! children it forks through a [`ForkQueue`]. Its lifecycle:
//!
//! ```text
//!   Running ──► main done + children done ─────────► Ok(result)
//!      │    ──► main or attached child failed ──────► Err(error)
//!      └──────► cancel() ───────────────────────────► Cancelled
//! ```
//!
//! Cancelling a task cancels its pending effect and all attached children;
//! the main computation is then stepped with [`Resume::Cancel`] and may
//! still yield cleanup effects.

use core::fmt;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use super::callback::Callback;
use super::fork_queue::{Continuation, ForkQueue, Supervised};
use super::{Env, Runtime};
use crate::channel::{std_channel, Channel};
use crate::error::{Error, ErrorKind};
use crate::monitor::LogLevel;
use crate::saga::{Saga, Step};
use crate::sync::Deferred;
use crate::tracing_compat::debug;
use crate::types::{EffectId, Outcome, Resume, TaskId, Value};

type Joiner = Box<dyn FnOnce(Resume)>;

struct MainState {
    running: bool,
    cancelled: bool,
    cont: Option<Continuation>,
    pending: Option<Callback>,
    stepping: bool,
    inbox: VecDeque<Resume>,
    held_flushes: usize,
}

struct TaskState {
    running: bool,
    cancelled: bool,
    aborted: bool,
    outcome: Option<Outcome<Value, Error>>,
    cont: Option<Continuation>,
    joiners: Vec<(u64, Joiner)>,
    next_joiner: u64,
    done: Option<Deferred>,
    main: MainState,
}

/// Internal record of a running or finished task.
pub(crate) struct TaskCore {
    pub(super) id: TaskId,
    pub(super) name: String,
    pub(super) parent_effect: EffectId,
    pub(super) env: Rc<Env>,
    pub(super) std_chan: Channel<Value>,
    pub(super) queue: ForkQueue,
    channels: RefCell<Vec<Channel<Value>>>,
    saga: RefCell<Option<Box<dyn Saga>>>,
    state: RefCell<TaskState>,
    this: Weak<TaskCore>,
}

/// The member of a fork queue standing for the task's main computation.
struct MainEntry {
    id: TaskId,
    task: Weak<TaskCore>,
}

impl Supervised for MainEntry {
    fn key(&self) -> TaskId {
        self.id
    }

    fn set_continuation(&self, cont: Option<Continuation>) {
        if let Some(task) = self.task.upgrade() {
            task.state.borrow_mut().main.cont = cont;
        }
    }

    fn cancel(&self) {
        if let Some(task) = self.task.upgrade() {
            task.cancel_main();
        }
    }
}

impl Supervised for TaskCore {
    fn key(&self) -> TaskId {
        self.id
    }

    fn set_continuation(&self, cont: Option<Continuation>) {
        self.state.borrow_mut().cont = cont;
    }

    fn cancel(&self) {
        self.cancel_task();
    }
}

pub(super) fn resume_for(outcome: &Outcome<Value, Error>) -> Resume {
    match outcome {
        Outcome::Ok(value) => Resume::Value(value.clone()),
        Outcome::Err(err) => Resume::Error(err.clone()),
        Outcome::Cancelled => Resume::Cancel,
    }
}

impl TaskCore {
    /// Creates a task ready to [`start`](Self::start).
    pub(super) fn new(
        env: &Rc<Env>,
        saga: Box<dyn Saga>,
        name: &str,
        parent_effect: EffectId,
    ) -> Rc<Self> {
        let id = env.ids.next_task();
        let name = format!("{}{}", env.config.task_name_prefix, name);
        let hub = Rc::clone(&env.hub);
        let std_chan = std_channel(move |emit| hub.subscribe(emit), Rc::clone(&env.scheduler));
        let core = Rc::new_cyclic(|this: &Weak<Self>| {
            let owner = this.clone();
            let queue = ForkQueue::new(
                id,
                Box::new(move |outcome| {
                    if let Some(task) = owner.upgrade() {
                        task.end(outcome);
                    }
                }),
            );
            Self {
                id,
                name,
                parent_effect,
                env: Rc::clone(env),
                std_chan,
                queue,
                channels: RefCell::new(Vec::new()),
                saga: RefCell::new(Some(saga)),
                state: RefCell::new(TaskState {
                    running: true,
                    cancelled: false,
                    aborted: false,
                    outcome: None,
                    cont: None,
                    joiners: Vec::new(),
                    next_joiner: 0,
                    done: None,
                    main: MainState {
                        running: true,
                        cancelled: false,
                        cont: None,
                        pending: None,
                        stepping: false,
                        inbox: VecDeque::new(),
                        held_flushes: 0,
                    },
                }),
                this: this.clone(),
            }
        });
        core.queue.add_task(Rc::new(MainEntry {
            id,
            task: Rc::downgrade(&core),
        }));
        core
    }

    pub(super) fn start(&self) {
        debug!(task = %self.name, id = %self.id, parent = %self.parent_effect, "task started");
        self.next(Resume::Value(Value::Unit));
    }

    /// Callback resuming the main computation.
    fn resume_main(&self) -> Callback {
        let this = self.this.clone();
        Callback::new(move |resume| {
            if let Some(task) = this.upgrade() {
                task.next(resume);
            }
        })
    }

    /// Steps the main computation with `input` and runs what it yields.
    ///
    /// Resumptions arriving while a step is in progress (an effect that
    /// settled before `run_effect` returned) are queued and stepped by the
    /// outermost call, so a long run of immediate effects uses constant
    /// stack.
    pub(super) fn next(&self, input: Resume) {
        if matches!(input, Resume::Cancel) {
            self.interrupt_pending();
        }
        {
            let mut state = self.state.borrow_mut();
            state.main.inbox.push_back(input);
            if state.main.stepping {
                return;
            }
            state.main.stepping = true;
        }
        loop {
            let input = {
                let mut state = self.state.borrow_mut();
                match state.main.inbox.pop_front() {
                    Some(input) => input,
                    None => {
                        state.main.stepping = false;
                        break;
                    }
                }
            };
            self.step_once(input);
        }
        let held = std::mem::take(&mut self.state.borrow_mut().main.held_flushes);
        for _ in 0..held {
            self.env.scheduler.flush();
        }
    }

    /// Releases a scheduler suspension once the running step loop drains,
    /// so the main computation reaches its next blocking effect before
    /// queued deliveries run.
    pub(super) fn release_after_step(&self) {
        let held = {
            let mut state = self.state.borrow_mut();
            if state.main.stepping {
                state.main.held_flushes += 1;
            }
            state.main.stepping
        };
        if !held {
            self.env.scheduler.flush();
        }
    }

    /// Marks the main computation cancelled and cancels its pending effect.
    fn interrupt_pending(&self) {
        let pending = {
            let mut state = self.state.borrow_mut();
            if !state.main.running {
                return;
            }
            state.main.cancelled = true;
            state.main.pending.take()
        };
        if let Some(pending) = pending {
            pending.cancel();
        }
    }

    fn step_once(&self, input: Resume) {
        if !self.state.borrow().main.running {
            // A cancel queued behind the step that finished the main is moot.
            if !matches!(input, Resume::Cancel) {
                let err = Error::new(ErrorKind::InvalidStateTransition).with_message(format!(
                    "{} resumed after its main computation finished",
                    self.name
                ));
                self.env.log(LogLevel::Warn, "ignored a late resumption", Some(&err));
            }
            return;
        }
        if matches!(input, Resume::Cancel) {
            self.interrupt_pending();
        }

        let saga = self.saga.borrow_mut().take();
        let Some(mut saga) = saga else {
            let err = Error::internal(format!("{} re-entered its own step", self.name));
            self.env.log(LogLevel::Error, "saga step re-entered", Some(&err));
            return;
        };
        let stepped = saga.step(input);
        *self.saga.borrow_mut() = Some(saga);

        match stepped {
            Ok(Step::Yield(effect)) => {
                let cb = self.resume_main();
                self.state.borrow_mut().main.pending = Some(cb.clone());
                self.run_effect(effect, self.parent_effect, "", &cb);
            }
            Ok(Step::Done(value)) => {
                let cancelled = self.state.borrow().main.cancelled;
                self.finish_main(if cancelled {
                    Outcome::Cancelled
                } else {
                    Outcome::Ok(value)
                });
            }
            Err(err) => {
                let cancelled = self.state.borrow().main.cancelled;
                if cancelled {
                    self.env
                        .log(LogLevel::Error, &format!("{} failed during cleanup", self.name), Some(&err));
                }
                self.finish_main(Outcome::Err(err.in_task(self.id)));
            }
        }
    }

    fn finish_main(&self, outcome: Outcome<Value, Error>) {
        let cont = {
            let mut state = self.state.borrow_mut();
            state.main.running = false;
            state.main.pending = None;
            state.main.cont.take()
        };
        if let Some(cont) = cont {
            cont(outcome);
        }
        self.release_if_finished();
    }

    fn cancel_main(&self) {
        let running = {
            let state = self.state.borrow();
            state.main.running && !state.main.cancelled
        };
        if running {
            self.next(Resume::Cancel);
        }
    }

    /// Cancels the task: its pending effect, its attached children, and the
    /// main computation. No-op once the task finished or was cancelled.
    pub(crate) fn cancel_task(&self) {
        {
            let mut state = self.state.borrow_mut();
            if !state.running || state.cancelled {
                return;
            }
            state.cancelled = true;
        }
        self.queue.cancel_all();
        self.end(Outcome::Cancelled);
    }

    fn end(&self, outcome: Outcome<Value, Error>) {
        let outcome = match outcome {
            Outcome::Err(err) => Outcome::Err(err.in_task(self.id).push_frame(self.name.clone())),
            other => other,
        };
        let (cont, joiners, done) = {
            let mut state = self.state.borrow_mut();
            if !state.running {
                return;
            }
            state.running = false;
            match &outcome {
                Outcome::Cancelled => state.cancelled = true,
                Outcome::Err(_) => state.aborted = true,
                Outcome::Ok(_) => {}
            }
            state.outcome = Some(outcome.clone());
            (
                state.cont.take(),
                std::mem::take(&mut state.joiners),
                state.done.clone(),
            )
        };
        if let Err(err) = self.std_chan.close() {
            self.env
                .log(LogLevel::Warn, "failed to close a task channel", Some(&err));
        }
        let owned = std::mem::take(&mut *self.channels.borrow_mut());
        for chan in owned {
            if let Err(err) = chan.close() {
                self.env
                    .log(LogLevel::Warn, "failed to close an action channel", Some(&err));
            }
        }

        match &outcome {
            Outcome::Ok(_) => debug!(task = %self.name, id = %self.id, "task finished"),
            Outcome::Cancelled => {
                debug!(task = %self.name, id = %self.id, "task cancelled");
                if self.env.config.log_cancellations {
                    self.env
                        .log(LogLevel::Info, &format!("{} has been cancelled", self.name), None);
                }
            }
            Outcome::Err(err) if cont.is_none() => self.env.report_uncaught(&self.name, err),
            Outcome::Err(err) => debug!(task = %self.name, id = %self.id, error = %err, "task failed"),
        }

        if let Some(done) = done {
            done.settle(outcome.clone());
        }
        if let Some(cont) = cont {
            cont(outcome.clone());
        }
        for (_, joiner) in joiners {
            joiner(resume_for(&outcome));
        }
        self.release_if_finished();
    }

    fn release_if_finished(&self) {
        let finished = {
            let state = self.state.borrow();
            !state.running && !state.main.running
        };
        if finished {
            let released = self.env.live.borrow_mut().remove(&self.id);
            drop(released);
        }
    }

    pub(super) fn add_joiner(&self, joiner: impl FnOnce(Resume) + 'static) -> u64 {
        let mut state = self.state.borrow_mut();
        state.next_joiner += 1;
        let id = state.next_joiner;
        state.joiners.push((id, Box::new(joiner)));
        id
    }

    pub(super) fn remove_joiner(&self, id: u64) {
        let removed = {
            let mut state = self.state.borrow_mut();
            state
                .joiners
                .iter()
                .position(|(j, _)| *j == id)
                .map(|pos| state.joiners.remove(pos))
        };
        drop(removed);
    }

    /// Ties `chan` to this task: it is closed when the task ends.
    pub(super) fn own_channel(&self, chan: Channel<Value>) {
        let mut channels = self.channels.borrow_mut();
        channels.retain(|owned| !owned.is_closed());
        channels.push(chan);
    }

    pub(super) fn this(&self) -> Weak<Self> {
        self.this.clone()
    }

    pub(super) fn set_continuation_cb(&self, cont: impl FnOnce(Outcome<Value, Error>) + 'static) {
        self.state.borrow_mut().cont = Some(Box::new(cont));
    }

    pub(super) fn runtime(&self) -> Runtime {
        Runtime::from_env(Rc::clone(&self.env))
    }

    pub(super) fn is_running(&self) -> bool {
        self.state.borrow().running
    }

    pub(super) fn is_main_cancelled(&self) -> bool {
        self.state.borrow().main.cancelled
    }

    pub(super) fn outcome(&self) -> Option<Outcome<Value, Error>> {
        self.state.borrow().outcome.clone()
    }
}

/// Handle to a task.
///
/// Handles compare equal when they refer to the same task.
#[derive(Clone)]
pub struct Task {
    core: Rc<TaskCore>,
}

impl Task {
    pub(super) fn new(core: Rc<TaskCore>) -> Self {
        Self { core }
    }

    pub(super) fn core(&self) -> &Rc<TaskCore> {
        &self.core
    }

    /// The task's id.
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.core.id
    }

    /// The task's name, prefix included.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Returns true until the task finished, failed or was cancelled.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.core.is_running()
    }

    /// Returns true if the task was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.core.state.borrow().cancelled
    }

    /// Returns true if the task failed.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.core.state.borrow().aborted
    }

    /// The value the task finished with.
    #[must_use]
    pub fn result(&self) -> Option<Value> {
        match self.core.outcome() {
            Some(Outcome::Ok(value)) => Some(value),
            _ => None,
        }
    }

    /// The error the task failed with.
    #[must_use]
    pub fn error(&self) -> Option<Error> {
        match self.core.outcome() {
            Some(Outcome::Err(err)) => Some(err),
            _ => None,
        }
    }

    /// How the task terminated, once it has.
    #[must_use]
    pub fn outcome(&self) -> Option<Outcome<Value, Error>> {
        self.core.outcome()
    }

    /// Cancels the task. No-op if it already terminated.
    pub fn cancel(&self) {
        self.core.cancel_task();
    }

    /// A deferred settled with the task's outcome.
    #[must_use]
    pub fn done(&self) -> Deferred {
        let (done, outcome) = {
            let mut state = self.core.state.borrow_mut();
            let done = state.done.get_or_insert_with(Deferred::new).clone();
            (done, state.outcome.clone())
        };
        if let Some(outcome) = outcome {
            done.settle(outcome);
        }
        done
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.core, &other.core)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.core.id)
            .field("name", &self.core.name)
            .field("running", &self.core.is_running())
            .finish()
    }
}
