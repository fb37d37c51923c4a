//! Buffered channel with matcher-aware takers.
//!
//! A channel is a buffer plus a FIFO list of pending takers. Two states are
//! forbidden and checked on every mutating entry point:
//!
//! - closed with pending takers
//! - pending takers alongside a non-empty buffer
//!
//! Reaching either is a runtime defect and surfaces as
//! [`ErrorKind::InvariantViolation`](crate::error::ErrorKind::InvariantViolation).
//!
//! Callbacks never run while the channel's state is borrowed, so a taker
//! may freely put to or take from the same channel.

use core::fmt;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use super::{Buffer, Message};
use crate::error::{Error, Result};

/// Predicate selecting which items a taker accepts.
pub type ItemMatcher<T> = Rc<dyn Fn(&T) -> bool>;

type TakerCallback<T> = Box<dyn FnOnce(Message<T>)>;

/// Identifies a pending taker, for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TakerId(u64);

struct Taker<T> {
    id: TakerId,
    matcher: Option<ItemMatcher<T>>,
    callback: TakerCallback<T>,
}

impl<T> Taker<T> {
    fn accepts(&self, item: &T) -> bool {
        self.matcher.as_ref().map_or(true, |m| m(item))
    }
}

struct State<T> {
    closed: bool,
    takers: VecDeque<Taker<T>>,
    buffer: Buffer<T>,
    next_taker: u64,
    on_close: Option<Box<dyn FnOnce()>>,
}

impl<T> State<T> {
    fn check(&self) -> Result<()> {
        if self.closed && !self.takers.is_empty() {
            return Err(Error::invariant("closed channel with pending takers"));
        }
        if !self.takers.is_empty() && !self.buffer.is_empty() {
            return Err(Error::invariant("pending takers with a non-empty buffer"));
        }
        Ok(())
    }
}

/// A put/take/flush/close channel.
pub struct Channel<T> {
    inner: Rc<RefCell<State<T>>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Channel<T> {
    /// Creates an open channel over `buffer`.
    #[must_use]
    pub fn new(buffer: Buffer<T>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(State {
                closed: false,
                takers: VecDeque::new(),
                buffer,
                next_taker: 0,
                on_close: None,
            })),
        }
    }

    /// Delivers `item` to the oldest taker that accepts it, or buffers it
    /// when no taker is waiting.
    ///
    /// When takers are waiting but none accepts the item, the item is
    /// discarded: buffering it would leave takers pending beside a
    /// non-empty buffer. Puts to a closed channel are ignored.
    pub fn put(&self, item: T) -> Result<()> {
        let taker = {
            let mut state = self.inner.borrow_mut();
            state.check()?;
            if state.closed {
                return Ok(());
            }
            if state.takers.is_empty() {
                return state.buffer.put(item);
            }
            let Some(pos) = state.takers.iter().position(|t| t.accepts(&item)) else {
                return Ok(());
            };
            state.takers.remove(pos)
        };
        if let Some(taker) = taker {
            (taker.callback)(Message::Item(item));
        }
        Ok(())
    }

    /// Takes the next item, accepting anything.
    pub fn take(&self, callback: impl FnOnce(Message<T>) + 'static) -> Result<Option<TakerId>> {
        self.take_matching(callback, None)
    }

    /// Takes the next item.
    ///
    /// The callback runs immediately with the oldest buffered item, or with
    /// [`Message::End`] if the channel is closed and drained. Otherwise it
    /// is queued and the returned id can cancel it. The matcher only
    /// filters items that arrive while the taker is queued.
    pub fn take_matching(
        &self,
        callback: impl FnOnce(Message<T>) + 'static,
        matcher: Option<ItemMatcher<T>>,
    ) -> Result<Option<TakerId>> {
        let ready = {
            let mut state = self.inner.borrow_mut();
            state.check()?;
            if let Some(item) = state.buffer.take() {
                Message::Item(item)
            } else if state.closed {
                Message::End
            } else {
                state.next_taker += 1;
                let id = TakerId(state.next_taker);
                state.takers.push_back(Taker {
                    id,
                    matcher,
                    callback: Box::new(callback),
                });
                return Ok(Some(id));
            }
        };
        callback(ready);
        Ok(None)
    }

    /// Removes a pending taker without running it.
    ///
    /// Returns false if the taker already ran or was removed.
    pub fn cancel_take(&self, id: TakerId) -> bool {
        let removed = {
            let mut state = self.inner.borrow_mut();
            state
                .takers
                .iter()
                .position(|t| t.id == id)
                .and_then(|pos| state.takers.remove(pos))
        };
        removed.is_some()
    }

    /// Drains the buffer in arrival order.
    ///
    /// Yields [`Message::End`] instead of an empty batch when the channel is
    /// closed and drained.
    pub fn flush(&self) -> Result<Message<Vec<T>>> {
        let mut state = self.inner.borrow_mut();
        state.check()?;
        if state.closed && state.buffer.is_empty() {
            return Ok(Message::End);
        }
        Ok(Message::Item(state.buffer.flush()))
    }

    /// Closes the channel. Idempotent.
    ///
    /// The close hook runs first, then every pending taker receives
    /// [`Message::End`] in registration order.
    pub fn close(&self) -> Result<()> {
        let (hook, takers) = {
            let mut state = self.inner.borrow_mut();
            state.check()?;
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            (state.on_close.take(), std::mem::take(&mut state.takers))
        };
        if let Some(hook) = hook {
            hook();
        }
        for taker in takers {
            (taker.callback)(Message::End);
        }
        Ok(())
    }

    /// Runs `hook` once when the channel closes.
    pub(crate) fn set_on_close(&self, hook: impl FnOnce() + 'static) {
        self.inner.borrow_mut().on_close = Some(Box::new(hook));
    }

    /// Returns true once closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.borrow().closed
    }

    /// Number of queued takers.
    #[must_use]
    pub fn pending_takers(&self) -> usize {
        self.inner.borrow().takers.len()
    }

    /// Number of buffered items.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.inner.borrow().buffer.len()
    }

    /// Returns true if both handles refer to the same channel.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: 'static> Default for Channel<T> {
    fn default() -> Self {
        Self::new(Buffer::default())
    }
}

impl<T> PartialEq for Channel<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.borrow();
        f.debug_struct("Channel")
            .field("closed", &state.closed)
            .field("takers", &state.takers.len())
            .field("buffered", &state.buffer.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::cell::Cell;

    fn recorder<T: 'static>() -> (Rc<RefCell<Vec<Message<T>>>>, impl Fn() -> TakerCallback<T>) {
        let log: Rc<RefCell<Vec<Message<T>>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let make = move || {
            let sink = sink.clone();
            Box::new(move |m: Message<T>| sink.borrow_mut().push(m)) as TakerCallback<T>
        };
        (log, make)
    }

    #[test]
    fn reject_buffer_scenario() {
        let chan = Channel::new(Buffer::fixed(2));
        chan.put("a").expect("a");
        chan.put("b").expect("b");
        let err = chan.put("c").expect_err("third put overflows");
        assert_eq!(err.kind(), ErrorKind::BufferOverflow);

        let (log, cb) = recorder();
        chan.take(cb()).expect("take");
        assert_eq!(*log.borrow(), vec![Message::Item("a")]);
        chan.put("c").expect("room again");
        assert_eq!(chan.buffered_len(), 2);
    }

    #[test]
    fn first_matching_taker_wins() {
        let chan: Channel<i32> = Channel::new(Buffer::none());
        let (log, cb) = recorder();
        let first = chan.take(cb()).expect("t1");
        let second = chan.take(cb()).expect("t2");
        assert!(first.is_some() && second.is_some());
        chan.put(1).expect("put");
        assert_eq!(*log.borrow(), vec![Message::Item(1)]);
        assert_eq!(chan.pending_takers(), 1);
    }

    #[test]
    fn matcher_skips_to_later_taker() {
        let chan: Channel<i32> = Channel::new(Buffer::fixed(4));
        let hits = Rc::new(RefCell::new(Vec::new()));
        let even = hits.clone();
        chan.take_matching(
            move |m| even.borrow_mut().push(("even", m)),
            Some(Rc::new(|n: &i32| n % 2 == 0)),
        )
        .expect("take");
        let any = hits.clone();
        chan.take(move |m| any.borrow_mut().push(("any", m))).expect("take");
        chan.put(3).expect("put");
        assert_eq!(*hits.borrow(), vec![("any", Message::Item(3))]);
        chan.put(5).expect("unmatched put is discarded");
        assert_eq!(chan.buffered_len(), 0);
        chan.put(4).expect("put");
        assert_eq!(hits.borrow().len(), 2);
        assert_eq!(chan.pending_takers(), 0);
    }

    #[test]
    fn cancelled_taker_is_skipped() {
        let chan: Channel<i32> = Channel::new(Buffer::fixed(4));
        let (log, cb) = recorder();
        let id = chan.take(cb()).expect("take").expect("queued");
        assert!(chan.cancel_take(id));
        assert!(!chan.cancel_take(id));
        chan.put(9).expect("put");
        assert!(log.borrow().is_empty());
        assert_eq!(chan.buffered_len(), 1);
    }

    #[test]
    fn close_ends_takers_in_order_and_is_idempotent() {
        let chan: Channel<i32> = Channel::new(Buffer::none());
        let order = Rc::new(RefCell::new(Vec::new()));
        for n in 0..3 {
            let order = order.clone();
            chan.take(move |m| order.borrow_mut().push((n, m))).expect("take");
        }
        chan.close().expect("close");
        chan.close().expect("second close");
        assert_eq!(
            *order.borrow(),
            vec![(0, Message::End), (1, Message::End), (2, Message::End)]
        );
        assert_eq!(chan.pending_takers(), 0);
    }

    #[test]
    fn closed_channel_drains_then_ends() {
        let chan = Channel::new(Buffer::fixed(2));
        chan.put(1).expect("put");
        chan.close().expect("close");
        chan.put(2).expect("ignored after close");
        let (log, cb) = recorder();
        chan.take(cb()).expect("take");
        chan.take(cb()).expect("take");
        assert_eq!(*log.borrow(), vec![Message::Item(1), Message::End]);
    }

    #[test]
    fn flush_distinguishes_empty_from_end() {
        let chan: Channel<i32> = Channel::new(Buffer::fixed(4));
        assert_eq!(chan.flush().expect("flush"), Message::Item(vec![]));
        chan.put(1).expect("put");
        chan.put(2).expect("put");
        assert_eq!(chan.flush().expect("flush"), Message::Item(vec![1, 2]));
        chan.close().expect("close");
        assert_eq!(chan.flush().expect("flush"), Message::End);
    }

    #[test]
    fn close_hook_runs_once_before_takers() {
        let chan: Channel<i32> = Channel::new(Buffer::none());
        let log = Rc::new(RefCell::new(Vec::new()));
        let hook_log = log.clone();
        chan.set_on_close(move || hook_log.borrow_mut().push("hook"));
        let taker_log = log.clone();
        chan.take(move |_| taker_log.borrow_mut().push("taker")).expect("take");
        chan.close().expect("close");
        chan.close().expect("close");
        assert_eq!(*log.borrow(), vec!["hook", "taker"]);
    }

    #[test]
    fn taker_may_reenter_the_channel() {
        let chan: Channel<i32> = Channel::new(Buffer::fixed(4));
        let again = chan.clone();
        let got = Rc::new(Cell::new(0));
        let sink = got.clone();
        chan.take(move |m| {
            if let Message::Item(n) = m {
                again.put(n + 1).expect("nested put");
            }
        })
        .expect("take");
        chan.put(1).expect("put");
        chan.take(move |m| {
            if let Message::Item(n) = m {
                sink.set(n);
            }
        })
        .expect("take");
        assert_eq!(got.get(), 2);
    }
}
