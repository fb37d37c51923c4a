//! Property tests for buffer overflow policies and channel invariants.
//!
//! Every mutating operation on a channel is followed by a check that a
//! closed channel holds no takers and that takers never wait beside a
//! non-empty buffer.

#[macro_use]
mod common;

use common::*;
use proptest::prelude::*;
use sagaflow::{Buffer, Channel, ErrorKind, Message};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Debug, Clone)]
enum Op {
    Put(u16),
    Take,
    Flush,
    Close,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => any::<u16>().prop_map(Op::Put),
        3 => Just(Op::Take),
        1 => Just(Op::Flush),
        1 => Just(Op::Close),
    ]
}

fn buffer_strategy() -> impl Strategy<Value = (u8, usize)> {
    (0u8..5, 0usize..4)
}

fn make_buffer(policy: u8, limit: usize) -> Buffer<u16> {
    match policy {
        0 => Buffer::none(),
        1 => Buffer::fixed(limit.max(1)),
        2 => Buffer::dropping(limit.max(1)),
        3 => Buffer::sliding(limit.max(1)),
        _ => Buffer::expanding(limit.max(1)),
    }
}

fn assert_channel_invariants(chan: &Channel<u16>) {
    if chan.is_closed() {
        assert_eq!(chan.pending_takers(), 0, "closed channel kept takers");
    }
    assert!(
        chan.buffered_len() == 0 || chan.pending_takers() == 0,
        "takers pending beside {} buffered items",
        chan.buffered_len()
    );
}

proptest! {
    #![proptest_config(test_proptest_config(256))]

    #[test]
    fn reject_policy_fails_beyond_capacity_and_keeps_contents(
        limit in 1usize..8,
        values in prop::collection::vec(any::<u16>(), 0..20),
    ) {
        init_test_logging();
        let mut buffer = Buffer::fixed(limit);
        let mut accepted = Vec::new();
        for v in values {
            match buffer.put(v) {
                Ok(()) => accepted.push(v),
                Err(err) => {
                    prop_assert_eq!(err.kind(), ErrorKind::BufferOverflow);
                    prop_assert_eq!(buffer.len(), limit);
                }
            }
        }
        prop_assert!(accepted.len() <= limit);
        prop_assert_eq!(buffer.flush(), accepted);
    }

    #[test]
    fn slide_policy_keeps_the_last_values(
        limit in 1usize..8,
        values in prop::collection::vec(any::<u16>(), 0..30),
    ) {
        let mut buffer = Buffer::sliding(limit);
        for &v in &values {
            prop_assert!(buffer.put(v).is_ok());
        }
        let keep = values.len().min(limit);
        let expected = values[values.len() - keep..].to_vec();
        prop_assert_eq!(buffer.flush(), expected);
    }

    #[test]
    fn drop_policy_keeps_the_first_values(
        limit in 1usize..8,
        values in prop::collection::vec(any::<u16>(), 0..30),
    ) {
        let mut buffer = Buffer::dropping(limit);
        for &v in &values {
            prop_assert!(buffer.put(v).is_ok());
        }
        let keep = values.len().min(limit);
        prop_assert_eq!(buffer.flush(), values[..keep].to_vec());
    }

    #[test]
    fn expand_policy_never_fails_and_stays_fifo(
        initial in 1usize..4,
        ops in prop::collection::vec(prop::option::of(any::<u16>()), 0..60),
    ) {
        let mut buffer = Buffer::expanding(initial);
        let mut model = VecDeque::new();
        for op in ops {
            match op {
                Some(v) => {
                    prop_assert!(buffer.put(v).is_ok());
                    model.push_back(v);
                }
                None => prop_assert_eq!(buffer.take(), model.pop_front()),
            }
        }
        prop_assert_eq!(buffer.flush(), Vec::from(model));
        prop_assert!(buffer.is_empty());
    }

    #[test]
    fn channel_invariants_hold_after_every_operation(
        (policy, limit) in buffer_strategy(),
        ops in prop::collection::vec(op_strategy(), 0..80),
    ) {
        init_test_logging();
        let chan = Channel::new(make_buffer(policy, limit));
        let delivered: Rc<RefCell<Vec<Message<u16>>>> = Rc::default();
        for op in ops {
            match op {
                Op::Put(v) => {
                    if let Err(err) = chan.put(v) {
                        prop_assert_eq!(err.kind(), ErrorKind::BufferOverflow);
                    }
                }
                Op::Take => {
                    let sink = delivered.clone();
                    prop_assert!(chan.take(move |msg| sink.borrow_mut().push(msg)).is_ok());
                }
                Op::Flush => {
                    let flushed = chan.flush();
                    prop_assert!(flushed.is_ok());
                    prop_assert_eq!(chan.buffered_len(), 0);
                }
                Op::Close => prop_assert!(chan.close().is_ok()),
            }
            assert_channel_invariants(&chan);
        }
        prop_assert!(chan.close().is_ok());
        prop_assert!(chan.flush().is_ok());
        assert_channel_invariants(&chan);
        let before = delivered.borrow().len();
        let sink = delivered.clone();
        prop_assert!(chan.take(move |msg| sink.borrow_mut().push(msg)).is_ok());
        let last_is_end = delivered.borrow().last().is_some_and(Message::is_end);
        prop_assert_eq!(delivered.borrow().len(), before + 1);
        prop_assert!(last_is_end);
    }
}

#[test]
fn first_taker_wins_a_put_matching_both() {
    init_test_logging();
    test_phase!("first_taker_wins_a_put_matching_both");
    let chan: Channel<u16> = Channel::new(Buffer::expanding(2));
    let first: Rc<RefCell<Vec<Message<u16>>>> = Rc::default();
    let second: Rc<RefCell<Vec<Message<u16>>>> = Rc::default();
    let sink = first.clone();
    chan.take(move |msg| sink.borrow_mut().push(msg))
        .expect("take on an open channel");
    let sink = second.clone();
    chan.take(move |msg| sink.borrow_mut().push(msg))
        .expect("take on an open channel");
    chan.put(7).expect("put");
    assert_with_log!(
        first.borrow().len() == 1,
        "oldest taker resolved",
        1,
        first.borrow().len()
    );
    assert_with_log!(
        second.borrow().is_empty(),
        "second taker still pending",
        0,
        second.borrow().len()
    );
    assert_eq!(chan.pending_takers(), 1);
    test_complete!("first_taker_wins_a_put_matching_both");
}

#[test]
fn reject_channel_scenario() {
    init_test_logging();
    test_phase!("reject_channel_scenario");
    let chan: Channel<&'static str> = Channel::new(Buffer::fixed(2));
    chan.put("a").expect("first put fits");
    chan.put("b").expect("second put fits");
    let err = chan.put("c").expect_err("third put overflows");
    assert_eq!(err.kind(), ErrorKind::BufferOverflow);

    let taken: Rc<RefCell<Option<Message<&'static str>>>> = Rc::default();
    let sink = taken.clone();
    chan.take(move |msg| *sink.borrow_mut() = Some(msg))
        .expect("take");
    assert!(matches!(*taken.borrow(), Some(Message::Item("a"))));
    chan.put("c").expect("room after a take");
    assert_eq!(chan.buffered_len(), 2);
    test_complete!("reject_channel_scenario");
}

#[test]
fn flush_distinguishes_empty_from_end_of_stream() {
    init_test_logging();
    let chan: Channel<u16> = Channel::new(Buffer::expanding(4));
    chan.put(1).expect("put");
    chan.put(2).expect("put");
    match chan.flush().expect("flush") {
        Message::Item(items) => assert_eq!(items, vec![1, 2]),
        Message::End => panic!("open channel flushed as end-of-stream"),
    }
    match chan.flush().expect("flush") {
        Message::Item(items) => assert!(items.is_empty()),
        Message::End => panic!("open channel flushed as end-of-stream"),
    }
    chan.close().expect("close");
    assert!(chan.flush().expect("flush").is_end());
}
