//! One-shot effect callbacks.
//!
//! Every running effect owns a [`Callback`]. It either settles once with a
//! [`Resume`] or is cancelled once; whichever happens first wins and the
//! other becomes a no-op. Cancelling runs the hook the effect handler
//! installed (remove a taker, cancel a deferred, cancel a child task).

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::types::Resume;

type OnSettle = Box<dyn FnOnce(Resume)>;
type CancelHook = Box<dyn FnOnce()>;

#[derive(Default)]
struct Inner {
    settled: Cell<bool>,
    on_settle: RefCell<Option<OnSettle>>,
    cancel: RefCell<Option<CancelHook>>,
}

/// Settle-or-cancel-once continuation of an effect.
#[derive(Clone, Default)]
pub struct Callback {
    inner: Rc<Inner>,
}

impl Callback {
    pub(crate) fn new(on_settle: impl FnOnce(Resume) + 'static) -> Self {
        let cb = Self::default();
        *cb.inner.on_settle.borrow_mut() = Some(Box::new(on_settle));
        cb
    }

    /// Delivers `resume` unless already settled or cancelled.
    pub(crate) fn settle(&self, resume: Resume) {
        if self.inner.settled.replace(true) {
            return;
        }
        let hook = self.inner.cancel.borrow_mut().take();
        drop(hook);
        let on_settle = self.inner.on_settle.borrow_mut().take();
        if let Some(on_settle) = on_settle {
            on_settle(resume);
        }
    }

    /// Installs the cancellation hook. Ignored once settled.
    pub(crate) fn set_cancel(&self, hook: impl FnOnce() + 'static) {
        if self.inner.settled.get() {
            return;
        }
        *self.inner.cancel.borrow_mut() = Some(Box::new(hook));
    }

    /// Cancels the effect. Returns false if it already settled.
    pub(crate) fn cancel(&self) -> bool {
        if self.inner.settled.replace(true) {
            return false;
        }
        let on_settle = self.inner.on_settle.borrow_mut().take();
        drop(on_settle);
        let hook = self.inner.cancel.borrow_mut().take();
        if let Some(hook) = hook {
            hook();
        }
        true
    }

    pub(crate) fn is_settled(&self) -> bool {
        self.inner.settled.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    #[test]
    fn settles_once() {
        let got = Rc::new(RefCell::new(Vec::new()));
        let sink = got.clone();
        let cb = Callback::new(move |r| sink.borrow_mut().push(r.value().cloned()));
        cb.settle(Resume::Value(Value::from(1)));
        cb.settle(Resume::Value(Value::from(2)));
        assert_eq!(*got.borrow(), vec![Some(Value::from(1))]);
        assert!(!cb.cancel());
    }

    #[test]
    fn cancel_runs_hook_and_blocks_settle() {
        let hooked = Rc::new(Cell::new(false));
        let settled = Rc::new(Cell::new(false));
        let (h, s) = (hooked.clone(), settled.clone());
        let cb = Callback::new(move |_| s.set(true));
        cb.set_cancel(move || h.set(true));
        assert!(cb.cancel());
        cb.settle(Resume::Value(Value::Unit));
        assert!(hooked.get());
        assert!(!settled.get());
    }

    #[test]
    fn hook_set_after_settle_is_dropped() {
        let hooked = Rc::new(Cell::new(false));
        let h = hooked.clone();
        let cb = Callback::new(|_| {});
        cb.settle(Resume::Close);
        cb.set_cancel(move || h.set(true));
        assert!(!cb.cancel());
        assert!(!hooked.get());
    }
}
