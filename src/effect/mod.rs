//! Effect descriptors.
//!
//! A computation never performs side effects itself. It yields an [`Effect`]
//! describing one, and the interpreter performs it and resumes the
//! computation with the result. Effects are plain data: building one does
//! nothing.
//!
//! Every descriptor is built by exactly one constructor in this module and
//! the interpreter matches on the variant exhaustively.
//!
//! # Example
//!
//! ```
//! use sagaflow::effect::{self, Effect, EffectKind};
//! use sagaflow::types::Action;
//!
//! let e = effect::take("USER_LOGGED_IN");
//! assert_eq!(e.kind(), EffectKind::Take);
//! let p = effect::put(Action::new("FETCH")).expect("valid action");
//! assert_eq!(p.kind().label(), "PUT");
//! ```

mod builders;
mod call;
mod matcher;

pub use builders::{
    action_channel, action_channel_with, apply, call, call_saga, cancel, cancel_self, cancelled,
    cps, delay, flush, fork, fork_saga, join, put, put_channel, put_resolve, race, select,
    select_state, spawn, take, take_channel, take_every, take_every_channel, take_latest,
    take_latest_channel, take_maybe, take_maybe_channel, throttle,
};
pub use call::{
    delay_fn, CallDescriptor, CallResult, CallScope, CallTarget, CpsCallback, CpsDescriptor,
    CpsFunc, Func, Selector,
};
pub use matcher::Pattern;

use core::fmt;

use crate::channel::{Buffer, Channel};
use crate::processor::Task;
use crate::types::{Action, Value};

/// Where a TAKE reads from.
#[derive(Debug, Clone)]
pub enum TakeSource {
    /// The task's standard channel over the hub, filtered by a pattern.
    Pattern(Pattern),
    /// An explicit channel; every item is accepted.
    Channel(Channel<Value>),
}

/// Where a PUT writes to.
#[derive(Debug, Clone)]
pub enum PutTarget {
    /// Dispatch through the hub.
    Hub(Action),
    /// Put into a channel.
    Channel(Channel<Value>, Value),
}

/// Which task a CANCEL targets.
#[derive(Debug, Clone)]
pub enum CancelTarget {
    /// A forked task.
    Task(Task),
    /// The task yielding the effect.
    CurrentTask,
}

/// An intended side effect.
pub enum Effect {
    /// Wait for the next matching event.
    Take {
        /// Source to take from.
        source: TakeSource,
        /// Resume with [`Value::End`] on end-of-stream instead of closing.
        maybe: bool,
    },
    /// Emit an event.
    Put {
        /// Destination.
        target: PutTarget,
        /// Await the dispatch result and inject dispatch failures.
        resolve: bool,
    },
    /// Run sub-effects; the first to settle wins.
    Race(Vec<Effect>),
    /// Invoke a function; awaitable results are awaited.
    Call(CallDescriptor),
    /// Invoke a function that completes through a callback.
    Cps(CpsDescriptor),
    /// Start a child task.
    Fork {
        /// What the child runs.
        call: CallDescriptor,
        /// Failures of a detached child do not reach the parent.
        detached: bool,
    },
    /// Wait for a task to terminate.
    Join(Task),
    /// Cancel a task.
    Cancel(CancelTarget),
    /// Project hub state.
    Select {
        /// Projection.
        selector: Selector,
        /// Extra projector arguments.
        args: Vec<Value>,
    },
    /// Open a buffered channel over hub events matching a pattern.
    ActionChannel {
        /// Accepted actions.
        pattern: Pattern,
        /// Buffer for the new channel; `None` uses a fixed buffer of the
        /// runtime's default limit.
        buffer: Option<Buffer<Value>>,
    },
    /// Ask whether the current task was cancelled.
    Cancelled,
    /// Drain a channel's buffer.
    Flush(Channel<Value>),
}

/// Effect tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    /// TAKE
    Take,
    /// PUT
    Put,
    /// RACE
    Race,
    /// CALL
    Call,
    /// CPS
    Cps,
    /// FORK
    Fork,
    /// JOIN
    Join,
    /// CANCEL
    Cancel,
    /// SELECT
    Select,
    /// ACTION_CHANNEL
    ActionChannel,
    /// CANCELLED
    Cancelled,
    /// FLUSH
    Flush,
}

impl EffectKind {
    /// Upper-case tag name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Take => "TAKE",
            Self::Put => "PUT",
            Self::Race => "RACE",
            Self::Call => "CALL",
            Self::Cps => "CPS",
            Self::Fork => "FORK",
            Self::Join => "JOIN",
            Self::Cancel => "CANCEL",
            Self::Select => "SELECT",
            Self::ActionChannel => "ACTION_CHANNEL",
            Self::Cancelled => "CANCELLED",
            Self::Flush => "FLUSH",
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Effect {
    /// The effect's tag.
    #[must_use]
    pub const fn kind(&self) -> EffectKind {
        match self {
            Self::Take { .. } => EffectKind::Take,
            Self::Put { .. } => EffectKind::Put,
            Self::Race(_) => EffectKind::Race,
            Self::Call(_) => EffectKind::Call,
            Self::Cps(_) => EffectKind::Cps,
            Self::Fork { .. } => EffectKind::Fork,
            Self::Join(_) => EffectKind::Join,
            Self::Cancel(_) => EffectKind::Cancel,
            Self::Select { .. } => EffectKind::Select,
            Self::ActionChannel { .. } => EffectKind::ActionChannel,
            Self::Cancelled => EffectKind::Cancelled,
            Self::Flush(_) => EffectKind::Flush,
        }
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Take { source, maybe } => f
                .debug_struct("Take")
                .field("source", source)
                .field("maybe", maybe)
                .finish(),
            Self::Put { target, resolve } => f
                .debug_struct("Put")
                .field("target", target)
                .field("resolve", resolve)
                .finish(),
            Self::Race(effects) => f.debug_tuple("Race").field(effects).finish(),
            Self::Call(call) => f.debug_tuple("Call").field(call).finish(),
            Self::Cps(cps) => f.debug_tuple("Cps").field(cps).finish(),
            Self::Fork { call, detached } => f
                .debug_struct("Fork")
                .field("call", call)
                .field("detached", detached)
                .finish(),
            Self::Join(task) => f.debug_tuple("Join").field(task).finish(),
            Self::Cancel(target) => f.debug_tuple("Cancel").field(target).finish(),
            Self::Select { args, .. } => f
                .debug_struct("Select")
                .field("args", args)
                .finish_non_exhaustive(),
            Self::ActionChannel { pattern, buffer } => f
                .debug_struct("ActionChannel")
                .field("pattern", pattern)
                .field("capacity", &buffer.as_ref().map(Buffer::capacity))
                .field("overflow", &buffer.as_ref().map(Buffer::overflow))
                .finish(),
            Self::Cancelled => f.write_str("Cancelled"),
            Self::Flush(chan) => f.debug_tuple("Flush").field(chan).finish(),
        }
    }
}
