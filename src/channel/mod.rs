//! Channels: buffered event delivery with backpressure.
//!
//! # Components
//!
//! - [`Buffer`]: ring storage with an overflow policy
//! - [`Channel`]: put/take/flush/close over a buffer and a taker list
//! - [`event_channel`]: a channel fed by an external subscription
//!
//! Every task also owns a standard channel over the hub. It is an event
//! channel with no buffer whose external deliveries are deferred through
//! the [`Scheduler`](crate::scheduler::Scheduler).

mod buffer;
mod chan;
mod event;

pub use buffer::{Buffer, Overflow, DEFAULT_LIMIT};
pub use chan::{Channel, ItemMatcher, TakerId};
pub use event::{event_channel, Emit, Unsubscribe};

pub(crate) use event::std_channel;

/// An item or the end-of-stream sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum Message<T> {
    /// A delivered item.
    Item(T),
    /// No further items will be delivered.
    End,
}

impl<T> Message<T> {
    /// Returns true for end-of-stream.
    #[must_use]
    pub const fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }

    /// Maps the item, keeping end-of-stream.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Message<U> {
        match self {
            Self::Item(item) => Message::Item(f(item)),
            Self::End => Message::End,
        }
    }

    /// Returns the item, if any.
    pub fn into_item(self) -> Option<T> {
        match self {
            Self::Item(item) => Some(item),
            Self::End => None,
        }
    }
}
