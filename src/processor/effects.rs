//! Effect interpretation.
//!
//! [`TaskCore::run_effect`] numbers the effect, reports it to the monitor,
//! and hands it to the handler for its kind. Handlers settle the effect's
//! callback exactly once, now or later, and install a cancel hook when the
//! effect can be interrupted while suspended.
//!
//! | Effect | Suspends on | Cancel hook |
//! |--------|-------------|-------------|
//! | TAKE | channel taker | removes the taker |
//! | PUT | scheduler | none |
//! | CALL | deferred / nested task | cancels the deferred (if it has a canceller) / the task |
//! | CPS | callback | the callee's hook |
//! | JOIN | the joined task | stops waiting |
//! | RACE | every branch | cancels every branch |

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::callback::Callback;
use super::task::{resume_for, Task, TaskCore};
use crate::channel::{event_channel, Buffer, Channel, Emit, Message};
use crate::effect::{
    CallDescriptor, CallResult, CallScope, CallTarget, CancelTarget, CpsCallback, CpsDescriptor,
    Effect, Pattern, PutTarget, Selector, TakeSource,
};
use crate::error::{Error, ErrorKind};
use crate::monitor::{EffectDescription, LogLevel};
use crate::saga::{task_saga, Saga};
use crate::sync::Deferred;
use crate::tracing_compat::trace;
use crate::types::{Action, EffectId, Outcome, Resume, Value};

impl TaskCore {
    /// Runs `effect` on behalf of `parent`, settling `cb` with its result.
    pub(super) fn run_effect(&self, effect: Effect, parent: EffectId, label: &str, cb: &Callback) {
        let effect_id = self.env.ids.next_effect();
        let monitor = self.env.options.monitor.clone();
        if let Some(monitor) = &monitor {
            monitor.effect_triggered(&EffectDescription {
                effect_id,
                parent_effect_id: parent,
                label,
                effect: &effect,
            });
        }
        trace!(task = %self.name, effect_id = %effect_id, parent = %parent, kind = %effect.kind(), "effect triggered");

        let outer = cb.clone();
        let on_settle = monitor.clone();
        let curr = Callback::new(move |resume: Resume| {
            if let Some(monitor) = &on_settle {
                match &resume {
                    Resume::Value(value) => monitor.effect_resolved(effect_id, value),
                    Resume::Error(err) => monitor.effect_rejected(effect_id, err),
                    Resume::Cancel => monitor.effect_cancelled(effect_id),
                    Resume::Close => monitor.effect_resolved(effect_id, &Value::End),
                }
            }
            outer.settle(resume);
        });
        let hook = curr.clone();
        cb.set_cancel(move || {
            if hook.cancel() {
                if let Some(monitor) = &monitor {
                    monitor.effect_cancelled(effect_id);
                }
            }
        });

        match effect {
            Effect::Take { source, maybe } => self.run_take(source, maybe, &curr),
            Effect::Put { target, resolve } => self.run_put(target, resolve, curr),
            Effect::Race(effects) => self.run_race(effects, effect_id, &curr),
            Effect::Call(call) => self.run_call(call, effect_id, &curr),
            Effect::Cps(cps) => self.run_cps(cps, &curr),
            Effect::Fork { call, detached } => self.run_fork(call, detached, effect_id, &curr),
            Effect::Join(task) => run_join(&task, &curr),
            Effect::Cancel(target) => self.run_cancel(target, &curr),
            Effect::Select { selector, args } => self.run_select(&selector, &args, &curr),
            Effect::ActionChannel { pattern, buffer } => {
                self.run_action_channel(pattern, buffer, &curr);
            }
            Effect::Cancelled => {
                let cancelled = self.is_main_cancelled();
                curr.settle(Resume::Value(Value::Bool(cancelled)));
            }
            Effect::Flush(chan) => run_flush(&chan, &curr),
        }
    }

    fn run_take(&self, source: TakeSource, maybe: bool, cb: &Callback) {
        let (chan, matcher) = match source {
            TakeSource::Pattern(pattern) => (self.std_chan.clone(), Some(pattern.value_matcher())),
            TakeSource::Channel(chan) => (chan, None),
        };
        let settle = cb.clone();
        let taker = move |msg: Message<Value>| match msg {
            Message::Item(value) if !value.is_end() => settle.settle(Resume::Value(value)),
            _ if maybe => settle.settle(Resume::Value(Value::End)),
            _ => settle.settle(Resume::Close),
        };
        match chan.take_matching(taker, matcher) {
            Ok(Some(taker_id)) => {
                cb.set_cancel(move || {
                    chan.cancel_take(taker_id);
                });
            }
            Ok(None) => {}
            Err(err) => cb.settle(Resume::Error(err)),
        }
    }

    fn run_put(&self, target: PutTarget, resolve: bool, cb: Callback) {
        let env = Rc::clone(&self.env);
        let name = self.name.clone();
        self.env.scheduler.asap(move || match target {
            PutTarget::Channel(chan, value) => match chan.put(value) {
                Ok(()) => cb.settle(Resume::Value(Value::Unit)),
                Err(err) => cb.settle(Resume::Error(err)),
            },
            PutTarget::Hub(action) => {
                let action = action.into_internal();
                if let Some(monitor) = &env.options.monitor {
                    monitor.action_dispatched(&action);
                }
                match env.hub.dispatch(action) {
                    Ok(Value::Pending(deferred)) if resolve => resolve_deferred(&deferred, &cb),
                    Ok(value) => cb.settle(Resume::Value(value)),
                    Err(err) if resolve => cb.settle(Resume::Error(err)),
                    Err(err) => {
                        env.log(LogLevel::Error, &format!("uncaught at {name}"), Some(&err));
                        cb.settle(Resume::Value(Value::Unit));
                    }
                }
            }
        });
    }

    fn run_call(&self, call: CallDescriptor, effect_id: EffectId, cb: &Callback) {
        let CallDescriptor { this, target, args } = call;
        let func = match target {
            CallTarget::Saga(saga) => return self.resolve_saga(saga, effect_id, cb),
            CallTarget::Func(func) => func,
        };
        let scope = CallScope::new(this, self.runtime());
        match func.invoke(&scope, args) {
            Err(err) => cb.settle(Resume::Error(err.at_effect(effect_id))),
            Ok(CallResult::Saga(saga)) => self.resolve_saga(saga, effect_id, cb),
            Ok(CallResult::Value(Value::Pending(deferred))) => resolve_deferred(&deferred, cb),
            Ok(CallResult::Value(value)) => cb.settle(Resume::Value(value)),
        }
    }

    /// Drives `saga` as a nested task whose outcome settles `cb`.
    fn resolve_saga(&self, saga: Box<dyn Saga>, effect_id: EffectId, cb: &Callback) {
        let name = saga.name().to_owned();
        let child = TaskCore::new(&self.env, saga, &name, effect_id);
        let settle = cb.clone();
        child.set_continuation_cb(move |outcome| settle.settle(resume_for(&outcome)));
        let weak = child.this();
        cb.set_cancel(move || {
            if let Some(child) = weak.upgrade() {
                child.cancel_task();
            }
        });
        self.env.register(&child);
        child.start();
    }

    fn run_cps(&self, cps: CpsDescriptor, cb: &Callback) {
        let CpsDescriptor { this, func, args } = cps;
        let scope = CallScope::new(this, self.runtime());
        if let Err(err) = func.invoke(&scope, args, CpsCallback::new(cb.clone())) {
            cb.settle(Resume::Error(err));
        }
    }

    fn run_fork(&self, call: CallDescriptor, detached: bool, effect_id: EffectId, cb: &Callback) {
        self.env.scheduler.suspend();
        let name = call.name().to_owned();
        let saga = task_saga(call, &self.runtime());
        let child = TaskCore::new(&self.env, saga, &name, effect_id);
        if !detached {
            // Failures before the child joins the queue must not be reported as uncaught.
            child.set_continuation_cb(|_| {});
        }
        self.env.register(&child);
        child.start();

        let handle = Resume::Value(Value::Task(Task::new(Rc::clone(&child))));
        if detached || !child.is_running() {
            match child.outcome() {
                Some(Outcome::Err(err)) if !detached => self.queue.abort(err),
                _ => cb.settle(handle),
            }
        } else {
            self.queue.add_task(child);
            cb.settle(handle);
        }
        self.release_after_step();
    }

    fn run_cancel(&self, target: CancelTarget, cb: &Callback) {
        match target {
            CancelTarget::Task(task) => task.core().cancel_task(),
            CancelTarget::CurrentTask => self.cancel_task(),
        }
        cb.settle(Resume::Value(Value::Unit));
    }

    fn run_race(&self, effects: Vec<Effect>, effect_id: EffectId, cb: &Callback) {
        let completed = Rc::new(Cell::new(false));
        let branches: Rc<RefCell<Vec<Callback>>> = Rc::new(RefCell::new(Vec::new()));

        for index in 0..effects.len() {
            let (completed, siblings, outer) = (completed.clone(), branches.clone(), cb.clone());
            let branch = Callback::new(move |resume: Resume| {
                if completed.get() {
                    return;
                }
                let winner = match resume {
                    Resume::Error(err) => Resume::Error(err),
                    Resume::Value(value) if !value.is_end() => Resume::Value(Value::Raced {
                        index,
                        value: Box::new(value),
                    }),
                    _ => return,
                };
                completed.set(true);
                cancel_branches(&siblings);
                outer.settle(winner);
            });
            branches.borrow_mut().push(branch);
        }

        let (done, all) = (completed.clone(), branches.clone());
        cb.set_cancel(move || {
            if !done.replace(true) {
                cancel_branches(&all);
            }
        });

        let started: Vec<Callback> = branches.borrow().clone();
        for (index, (effect, branch)) in effects.into_iter().zip(started).enumerate() {
            if completed.get() {
                break;
            }
            self.run_effect(effect, effect_id, &index.to_string(), &branch);
        }
    }

    fn run_select(&self, selector: &Selector, args: &[Value], cb: &Callback) {
        let state = self.env.hub.query_state();
        match selector(&state, args) {
            Ok(value) => cb.settle(Resume::Value(value)),
            Err(err) => cb.settle(Resume::Error(err)),
        }
    }

    fn run_action_channel(&self, pattern: Pattern, buffer: Option<Buffer<Value>>, cb: &Callback) {
        let buffer = buffer.unwrap_or_else(|| Buffer::fixed(self.env.config.default_buffer_limit));
        let hub = Rc::clone(&self.env.hub);
        let chan = event_channel(
            move |emit: Emit<Value>| {
                hub.subscribe(Rc::new(move |msg: Message<Action>| {
                    emit(msg.map(Value::Action))
                }))
            },
            buffer,
            Some(pattern.value_matcher()),
        );
        self.own_channel(chan.clone());
        cb.settle(Resume::Value(Value::Channel(chan)));
    }
}

fn cancel_branches(branches: &Rc<RefCell<Vec<Callback>>>) {
    let all: Vec<Callback> = branches.borrow().clone();
    for branch in all {
        branch.cancel();
    }
}

/// Settles `cb` once `deferred` settles.
fn resolve_deferred(deferred: &Deferred, cb: &Callback) {
    if deferred.is_cancellable() {
        let target = deferred.clone();
        cb.set_cancel(move || {
            target.cancel();
        });
    }
    let settle = cb.clone();
    deferred.then(move |outcome| {
        settle.settle(match outcome {
            Outcome::Ok(value) => Resume::Value(value),
            Outcome::Err(err) => Resume::Error(err),
            Outcome::Cancelled => Resume::Error(
                Error::new(ErrorKind::Cancelled).with_message("awaited value was cancelled"),
            ),
        });
    });
}

fn run_join(task: &Task, cb: &Callback) {
    let core = task.core();
    if core.is_running() {
        let settle = cb.clone();
        let joiner = core.add_joiner(move |resume| settle.settle(resume));
        let weak = core.this();
        cb.set_cancel(move || {
            if let Some(core) = weak.upgrade() {
                core.remove_joiner(joiner);
            }
        });
        return;
    }
    let resume = core
        .outcome()
        .map_or(Resume::Value(Value::Unit), |outcome| resume_for(&outcome));
    cb.settle(resume);
}

fn run_flush(chan: &Channel<Value>, cb: &Callback) {
    match chan.flush() {
        Ok(Message::Item(items)) => cb.settle(Resume::Value(Value::List(items))),
        Ok(Message::End) => cb.settle(Resume::Value(Value::End)),
        Err(err) => cb.settle(Resume::Error(err)),
    }
}
