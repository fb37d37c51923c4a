//! Recurring patterns built on [`Fsm`].
//!
//! | helper        | loop                                                        |
//! |---------------|-------------------------------------------------------------|
//! | `take_every`  | take, fork worker                                           |
//! | `take_latest` | take, cancel previous worker, fork worker                   |
//! | `throttle`    | open sliding(1) channel once; take, fork worker, delay      |
//!
//! Workers receive the helper's arguments followed by the action.
//! `take_every` and `take_latest` read either hub actions matching a
//! pattern or the items of an explicit channel; both end when their
//! source closes.

use std::time::Duration;

use super::fsm::{Fsm, Move, Transition};
use super::Saga;
use crate::channel::{Buffer, Channel};
use crate::effect::{self, Effect, Func, Pattern, TakeSource};
use crate::error::{Error, Result};
use crate::processor::Task;
use crate::types::Value;

#[derive(Debug)]
struct Worker {
    source: TakeSource,
    func: Func,
    args: Vec<Value>,
    action: Value,
}

impl Worker {
    fn new(source: TakeSource, func: Func, args: Vec<Value>) -> Self {
        Self {
            source,
            func,
            args,
            action: Value::Unit,
        }
    }

    fn take(&self) -> Effect {
        Effect::Take {
            source: self.source.clone(),
            maybe: false,
        }
    }

    fn fork(&self) -> Effect {
        let mut args = self.args.clone();
        args.push(self.action.clone());
        effect::fork(self.func.clone(), args)
    }

    fn label(&self, helper: &str) -> String {
        match &self.source {
            TakeSource::Pattern(pattern) => format!("{helper}({pattern}, {})", self.func.name()),
            TakeSource::Channel(_) => format!("{helper}(channel, {})", self.func.name()),
        }
    }
}

fn store_action(w: &mut Worker, action: Value) {
    w.action = action;
}

fn every_take(w: &mut Worker) -> Result<Move<Worker>> {
    Ok(Move::to("q2", w.take()).capture(store_action))
}

fn every_fork(w: &mut Worker) -> Result<Move<Worker>> {
    if w.action.is_end() {
        return Ok(Move::end());
    }
    Ok(Move::to("q1", w.fork()))
}

/// The saga behind [`effect::take_every`] and [`effect::take_every_channel`].
pub fn take_every_helper(source: TakeSource, worker: Func, args: Vec<Value>) -> impl Saga {
    let data = Worker::new(source, worker, args);
    let name = data.label("take_every");
    let table: [(&'static str, Transition<Worker>); 2] = [("q1", every_take), ("q2", every_fork)];
    Fsm::new(name, data, "q1", &table)
}

#[derive(Debug)]
struct Latest {
    worker: Worker,
    last: Option<Task>,
}

fn latest_take(l: &mut Latest) -> Result<Move<Latest>> {
    Ok(Move::to("q2", l.worker.take()).capture(|l, action| l.worker.action = action))
}

fn store_task(l: &mut Latest, task: Value) {
    l.last = task.as_task().cloned();
}

fn latest_cancel(l: &mut Latest) -> Result<Move<Latest>> {
    if l.worker.action.is_end() {
        return Ok(Move::end());
    }
    match &l.last {
        Some(task) => Ok(Move::to("q3", effect::cancel(task))),
        None => Ok(Move::to("q1", l.worker.fork()).capture(store_task)),
    }
}

fn latest_fork(l: &mut Latest) -> Result<Move<Latest>> {
    Ok(Move::to("q1", l.worker.fork()).capture(store_task))
}

/// The saga behind [`effect::take_latest`] and [`effect::take_latest_channel`].
pub fn take_latest_helper(source: TakeSource, worker: Func, args: Vec<Value>) -> impl Saga {
    let worker = Worker::new(source, worker, args);
    let name = worker.label("take_latest");
    let table: [(&'static str, Transition<Latest>); 3] = [
        ("q1", latest_take),
        ("q2", latest_cancel),
        ("q3", latest_fork),
    ];
    Fsm::new(name, Latest { worker, last: None }, "q1", &table)
}

#[derive(Debug)]
struct Throttled {
    pattern: Pattern,
    worker: Worker,
    window: Duration,
    channel: Option<Channel<Value>>,
}

fn throttle_open(t: &mut Throttled) -> Result<Move<Throttled>> {
    Ok(Move::to(
        "q2",
        effect::action_channel_with(t.pattern.clone(), Buffer::sliding(1)),
    )
    .capture(|t, chan| t.channel = chan.as_channel().cloned()))
}

fn throttle_take(t: &mut Throttled) -> Result<Move<Throttled>> {
    let channel = t
        .channel
        .clone()
        .ok_or_else(|| Error::internal("throttle resumed without its action channel"))?;
    Ok(Move::to("q3", effect::take_channel(channel)).capture(|t, action| t.worker.action = action))
}

fn throttle_fork(t: &mut Throttled) -> Result<Move<Throttled>> {
    if t.worker.action.is_end() {
        return Ok(Move::end());
    }
    Ok(Move::to("q4", t.worker.fork()))
}

fn throttle_wait(t: &mut Throttled) -> Result<Move<Throttled>> {
    Ok(Move::to("q2", effect::delay(t.window)))
}

/// The saga behind [`effect::throttle`].
pub fn throttle_helper(
    window: Duration,
    pattern: Pattern,
    worker: Func,
    args: Vec<Value>,
) -> impl Saga {
    let worker = Worker::new(TakeSource::Pattern(pattern.clone()), worker, args);
    let name = worker.label("throttle");
    let table: [(&'static str, Transition<Throttled>); 4] = [
        ("q1", throttle_open),
        ("q2", throttle_take),
        ("q3", throttle_fork),
        ("q4", throttle_wait),
    ];
    let data = Throttled {
        pattern,
        worker,
        window,
        channel: None,
    };
    Fsm::new(name, data, "q1", &table)
}
