//! Channels fed by an external subscription.

use std::rc::Rc;

use super::{Buffer, Channel, ItemMatcher, Message};
use crate::error::Result;
use crate::scheduler::Scheduler;
use crate::tracing_compat::warn;
use crate::types::{Action, Value};

/// Sink handed to a subscription source.
pub type Emit<T> = Rc<dyn Fn(Message<T>) -> Result<()>>;

/// Cancels a subscription.
pub type Unsubscribe = Box<dyn FnOnce()>;

/// Bridges a subscription into a channel.
///
/// `subscribe` receives a sink and returns the handle that cancels the
/// subscription. Items rejected by `matcher` are ignored, accepted items are
/// put into the channel, and [`Message::End`] closes it. Closing, from
/// either side, unsubscribes exactly once.
pub fn event_channel<T: 'static>(
    subscribe: impl FnOnce(Emit<T>) -> Unsubscribe,
    buffer: Buffer<T>,
    matcher: Option<ItemMatcher<T>>,
) -> Channel<T> {
    let chan = Channel::new(buffer);
    let sink = chan.clone();
    let emit: Emit<T> = Rc::new(move |msg: Message<T>| match msg {
        Message::End => sink.close(),
        Message::Item(item) => {
            if matcher.as_ref().is_some_and(|m| !m(&item)) {
                return Ok(());
            }
            sink.put(item)
        }
    });
    let unsubscribe = subscribe(emit);
    if chan.is_closed() {
        unsubscribe();
    } else {
        chan.set_on_close(unsubscribe);
    }
    chan
}

/// The per-task channel over the hub.
///
/// Actions the runtime dispatched itself are delivered synchronously.
/// Everything else, end-of-stream included, goes through
/// [`Scheduler::asap`] so it lands after the running dispatch unwinds.
pub(crate) fn std_channel(
    subscribe: impl FnOnce(Emit<Action>) -> Unsubscribe,
    scheduler: Rc<Scheduler>,
) -> Channel<Value> {
    event_channel(
        move |emit: Emit<Value>| {
            subscribe(Rc::new(move |msg: Message<Action>| match msg {
                Message::Item(action) if action.is_internal() => {
                    emit(Message::Item(Value::Action(action)))
                }
                other => {
                    let emit = emit.clone();
                    scheduler.asap(move || {
                        if let Err(err) = emit(other.map(Value::Action)) {
                            warn!(error = %err, "deferred delivery to a task channel failed");
                        }
                    });
                    Ok(())
                }
            }))
        },
        Buffer::none(),
        None,
    )
}
