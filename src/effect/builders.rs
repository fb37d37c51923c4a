//! Effect constructors.

use std::rc::Rc;
use std::time::Duration;

use super::{
    delay_fn, CallDescriptor, CallTarget, CancelTarget, CpsDescriptor, CpsFunc, Effect, Func,
    Pattern, PutTarget, TakeSource,
};
use crate::channel::{Buffer, Channel};
use crate::error::{Error, Result};
use crate::processor::Task;
use crate::saga::{self, Saga};
use crate::types::{Action, Value};

/// Waits for the next hub action matching `pattern`.
///
/// End-of-stream finishes the task; see [`take_maybe`] to observe it instead.
pub fn take(pattern: impl Into<Pattern>) -> Effect {
    Effect::Take {
        source: TakeSource::Pattern(pattern.into()),
        maybe: false,
    }
}

/// Like [`take`], but end-of-stream resumes with [`Value::End`].
pub fn take_maybe(pattern: impl Into<Pattern>) -> Effect {
    Effect::Take {
        source: TakeSource::Pattern(pattern.into()),
        maybe: true,
    }
}

/// Waits for the next item of `channel`.
#[must_use]
pub fn take_channel(channel: Channel<Value>) -> Effect {
    Effect::Take {
        source: TakeSource::Channel(channel),
        maybe: false,
    }
}

/// Like [`take_channel`], but end-of-stream resumes with [`Value::End`].
#[must_use]
pub fn take_maybe_channel(channel: Channel<Value>) -> Effect {
    Effect::Take {
        source: TakeSource::Channel(channel),
        maybe: true,
    }
}

/// Dispatches `action` through the hub.
///
/// # Errors
///
/// `UndefinedInput` if the action has no type.
pub fn put(action: Action) -> Result<Effect> {
    action.validate()?;
    Ok(Effect::Put {
        target: PutTarget::Hub(action),
        resolve: false,
    })
}

/// Like [`put`], but resumes with the dispatch result once it settles and
/// injects dispatch failures.
pub fn put_resolve(action: Action) -> Result<Effect> {
    action.validate()?;
    Ok(Effect::Put {
        target: PutTarget::Hub(action),
        resolve: true,
    })
}

/// Puts `value` into `channel`.
pub fn put_channel(channel: Channel<Value>, value: impl Into<Value>) -> Effect {
    Effect::Put {
        target: PutTarget::Channel(channel, value.into()),
        resolve: false,
    }
}

/// Runs `effects` concurrently and resumes with the first to settle, tagged
/// by its position. Every other branch is cancelled.
///
/// # Errors
///
/// `InvalidArgument` for an empty race, which could never settle.
pub fn race(effects: Vec<Effect>) -> Result<Effect> {
    if effects.is_empty() {
        return Err(Error::invalid_argument("race needs at least one effect"));
    }
    Ok(Effect::Race(effects))
}

fn descriptor(this: Value, target: CallTarget, args: Vec<Value>) -> CallDescriptor {
    CallDescriptor { this, target, args }
}

/// Invokes `func` with `args`.
#[must_use]
pub fn call(func: Func, args: Vec<Value>) -> Effect {
    apply(Value::Unit, func, args)
}

/// Invokes `func` with `args` and an explicit call context.
#[must_use]
pub fn apply(this: Value, func: Func, args: Vec<Value>) -> Effect {
    Effect::Call(descriptor(this, CallTarget::Func(func), args))
}

/// Drives `saga` to completion as a nested call.
pub fn call_saga(saga: impl Saga + 'static) -> Effect {
    Effect::Call(descriptor(Value::Unit, CallTarget::Saga(Box::new(saga)), Vec::new()))
}

/// Invokes a callback-style function.
#[must_use]
pub fn cps(func: CpsFunc, args: Vec<Value>) -> Effect {
    Effect::Cps(CpsDescriptor {
        this: Value::Unit,
        func,
        args,
    })
}

/// Starts `func` as an attached child task.
///
/// A failure of the child aborts the parent.
#[must_use]
pub fn fork(func: Func, args: Vec<Value>) -> Effect {
    Effect::Fork {
        call: descriptor(Value::Unit, CallTarget::Func(func), args),
        detached: false,
    }
}

/// Starts `func` as a detached child task.
#[must_use]
pub fn spawn(func: Func, args: Vec<Value>) -> Effect {
    Effect::Fork {
        call: descriptor(Value::Unit, CallTarget::Func(func), args),
        detached: true,
    }
}

/// Starts an already-built computation as an attached child task.
pub fn fork_saga(saga: impl Saga + 'static) -> Effect {
    Effect::Fork {
        call: descriptor(Value::Unit, CallTarget::Saga(Box::new(saga)), Vec::new()),
        detached: false,
    }
}

/// Waits for `task` to terminate.
#[must_use]
pub fn join(task: &Task) -> Effect {
    Effect::Join(task.clone())
}

/// Cancels `task`.
#[must_use]
pub fn cancel(task: &Task) -> Effect {
    Effect::Cancel(CancelTarget::Task(task.clone()))
}

/// Cancels the current task.
#[must_use]
pub fn cancel_self() -> Effect {
    Effect::Cancel(CancelTarget::CurrentTask)
}

/// Projects the hub state through `selector`, which receives the state
/// followed by `args`.
pub fn select(
    selector: impl Fn(&Value, &[Value]) -> Result<Value> + 'static,
    args: Vec<Value>,
) -> Effect {
    Effect::Select {
        selector: Rc::new(selector),
        args,
    }
}

/// Resumes with the whole hub state.
#[must_use]
pub fn select_state() -> Effect {
    select(|state, _| Ok(state.clone()), Vec::new())
}

/// Opens a channel buffering hub actions that match `pattern`, in a fixed
/// buffer sized by the runtime's `default_buffer_limit`.
pub fn action_channel(pattern: impl Into<Pattern>) -> Effect {
    Effect::ActionChannel {
        pattern: pattern.into(),
        buffer: None,
    }
}

/// Opens a channel buffering hub actions that match `pattern`.
pub fn action_channel_with(pattern: impl Into<Pattern>, buffer: Buffer<Value>) -> Effect {
    Effect::ActionChannel {
        pattern: pattern.into(),
        buffer: Some(buffer),
    }
}

/// Resumes with whether the current task was cancelled.
#[must_use]
pub const fn cancelled() -> Effect {
    Effect::Cancelled
}

/// Drains `channel`'s buffer.
#[must_use]
pub fn flush(channel: Channel<Value>) -> Effect {
    Effect::Flush(channel)
}

/// Suspends for `duration` of virtual time.
#[must_use]
pub fn delay(duration: Duration) -> Effect {
    let millis = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
    call(delay_fn(), vec![Value::from(millis)])
}

/// Forks `worker` for every action matching `pattern`.
///
/// The worker receives `args` followed by the action.
pub fn take_every(pattern: impl Into<Pattern>, worker: Func, args: Vec<Value>) -> Effect {
    fork_saga(saga::take_every_helper(TakeSource::Pattern(pattern.into()), worker, args))
}

/// Forks `worker` for every item of `channel`, until it closes.
#[must_use]
pub fn take_every_channel(channel: Channel<Value>, worker: Func, args: Vec<Value>) -> Effect {
    fork_saga(saga::take_every_helper(TakeSource::Channel(channel), worker, args))
}

/// Forks `worker` for every action matching `pattern`, cancelling the
/// previous worker if it is still running.
pub fn take_latest(pattern: impl Into<Pattern>, worker: Func, args: Vec<Value>) -> Effect {
    fork_saga(saga::take_latest_helper(TakeSource::Pattern(pattern.into()), worker, args))
}

/// Like [`take_latest`], over the items of `channel`.
#[must_use]
pub fn take_latest_channel(channel: Channel<Value>, worker: Func, args: Vec<Value>) -> Effect {
    fork_saga(saga::take_latest_helper(TakeSource::Channel(channel), worker, args))
}

/// Forks `worker` for at most one matching action per `window`.
///
/// The most recent action received during a window is kept and handled
/// once the window closes; older ones are dropped.
pub fn throttle(
    window: Duration,
    pattern: impl Into<Pattern>,
    worker: Func,
    args: Vec<Value>,
) -> Effect {
    fork_saga(saga::throttle_helper(window, pattern.into(), worker, args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::EffectKind;
    use crate::channel::DEFAULT_LIMIT;
    use crate::error::ErrorKind;

    #[test]
    fn constructors_tag_their_effects() {
        let noop = Func::new("noop", |_| Ok(Value::Unit));
        let cases = [
            (take("A"), EffectKind::Take),
            (put(Action::new("A")).expect("put"), EffectKind::Put),
            (call(noop.clone(), vec![]), EffectKind::Call),
            (fork(noop.clone(), vec![]), EffectKind::Fork),
            (spawn(noop, vec![]), EffectKind::Fork),
            (select_state(), EffectKind::Select),
            (action_channel("A"), EffectKind::ActionChannel),
            (cancelled(), EffectKind::Cancelled),
            (cancel_self(), EffectKind::Cancel),
            (flush(Channel::default()), EffectKind::Flush),
            (delay(Duration::from_millis(5)), EffectKind::Call),
        ];
        for (effect, kind) in cases {
            assert_eq!(effect.kind(), kind, "{effect:?}");
        }
    }

    #[test]
    fn put_rejects_untyped_actions() {
        let err = put(Action::new("")).expect_err("rejected");
        assert_eq!(err.kind(), ErrorKind::UndefinedInput);
        assert!(put_resolve(Action::new("")).is_err());
    }

    #[test]
    fn empty_race_is_rejected() {
        let err = race(Vec::new()).expect_err("rejected");
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn action_channel_leaves_the_buffer_to_the_runtime() {
        let Effect::ActionChannel { buffer, .. } = action_channel("*") else {
            unreachable!("action_channel builds ACTION_CHANNEL");
        };
        assert!(buffer.is_none());
        let Effect::ActionChannel { buffer, .. } =
            action_channel_with("*", Buffer::sliding(DEFAULT_LIMIT))
        else {
            unreachable!("action_channel_with builds ACTION_CHANNEL");
        };
        assert_eq!(buffer.map(|b| b.capacity()), Some(DEFAULT_LIMIT));
    }

    #[test]
    fn spawn_is_detached() {
        let noop = Func::new("noop", |_| Ok(Value::Unit));
        assert!(matches!(spawn(noop.clone(), vec![]), Effect::Fork { detached: true, .. }));
        assert!(matches!(fork(noop, vec![]), Effect::Fork { detached: false, .. }));
    }
}
