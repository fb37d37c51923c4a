//! Call targets for CALL, CPS and FORK.

use core::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::processor::{Callback, Runtime};
use crate::saga::Saga;
use crate::types::{Resume, Value};

/// What invoking a [`Func`] produced.
pub enum CallResult {
    /// A plain value. [`Value::Pending`] is awaited by CALL.
    Value(Value),
    /// A computation to drive in place of a value.
    Saga(Box<dyn Saga>),
}

impl From<Value> for CallResult {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl fmt::Debug for CallResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Saga(s) => f.debug_tuple("Saga").field(&s.name()).finish(),
        }
    }
}

/// The context a function is invoked in.
#[derive(Debug, Clone)]
pub struct CallScope {
    this: Value,
    runtime: Runtime,
}

impl CallScope {
    pub(crate) fn new(this: Value, runtime: Runtime) -> Self {
        Self { this, runtime }
    }

    /// The call context given to [`apply`](crate::effect::apply).
    #[must_use]
    pub const fn this(&self) -> &Value {
        &self.this
    }

    /// The runtime interpreting the call.
    #[must_use]
    pub const fn runtime(&self) -> &Runtime {
        &self.runtime
    }
}

type FuncBody = dyn Fn(&CallScope, Vec<Value>) -> Result<CallResult>;

/// A named function a computation can CALL or FORK.
#[derive(Clone)]
pub struct Func {
    name: Rc<str>,
    body: Rc<FuncBody>,
}

impl Func {
    /// A plain function of its arguments.
    pub fn new(name: &str, f: impl Fn(Vec<Value>) -> Result<Value> + 'static) -> Self {
        Self::scoped(name, move |_, args| f(args).map(CallResult::Value))
    }

    /// A function that also sees the call context and may produce a saga.
    pub fn scoped(
        name: &str,
        f: impl Fn(&CallScope, Vec<Value>) -> Result<CallResult> + 'static,
    ) -> Self {
        Self {
            name: Rc::from(name),
            body: Rc::new(f),
        }
    }

    /// A function that builds a fresh saga from its arguments.
    pub fn saga<S: Saga + 'static>(name: &str, f: impl Fn(Vec<Value>) -> S + 'static) -> Self {
        Self::scoped(name, move |_, args| Ok(CallResult::Saga(Box::new(f(args)))))
    }

    /// The function's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invokes the function.
    pub fn invoke(&self, scope: &CallScope, args: Vec<Value>) -> Result<CallResult> {
        (self.body)(scope, args)
    }
}

impl fmt::Debug for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Func({})", self.name)
    }
}

/// Completion handle passed to a [`CpsFunc`].
///
/// Only the first [`CpsCallback::done`] counts.
#[derive(Clone)]
pub struct CpsCallback {
    inner: Callback,
}

impl CpsCallback {
    pub(crate) fn new(inner: Callback) -> Self {
        Self { inner }
    }

    /// Completes the call with a value or an error.
    pub fn done(&self, result: Result<Value>) {
        self.inner.settle(match result {
            Ok(value) => Resume::Value(value),
            Err(err) => Resume::Error(err),
        });
    }

    /// Runs `hook` if the call is cancelled before completing.
    pub fn on_cancel(&self, hook: impl FnOnce() + 'static) {
        self.inner.set_cancel(hook);
    }

    /// Returns true once completed or cancelled.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.inner.is_settled()
    }
}

impl fmt::Debug for CpsCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpsCallback")
            .field("settled", &self.inner.is_settled())
            .finish()
    }
}

type CpsBody = dyn Fn(&CallScope, Vec<Value>, CpsCallback) -> Result<()>;

/// A function completing through a callback instead of its return value.
///
/// Returning `Err` synchronously fails the call, unless the callback
/// already completed it.
#[derive(Clone)]
pub struct CpsFunc {
    name: Rc<str>,
    body: Rc<CpsBody>,
}

impl CpsFunc {
    /// Wraps a callback-style function.
    pub fn new(
        name: &str,
        f: impl Fn(&CallScope, Vec<Value>, CpsCallback) -> Result<()> + 'static,
    ) -> Self {
        Self {
            name: Rc::from(name),
            body: Rc::new(f),
        }
    }

    /// The function's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn invoke(&self, scope: &CallScope, args: Vec<Value>, done: CpsCallback) -> Result<()> {
        (self.body)(scope, args, done)
    }
}

impl fmt::Debug for CpsFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CpsFunc({})", self.name)
    }
}

/// Projects hub state for SELECT: `(state, args) -> value`.
pub type Selector = Rc<dyn Fn(&Value, &[Value]) -> Result<Value>>;

/// What a CALL or FORK invokes.
pub enum CallTarget {
    /// A function, invoked with the descriptor's context and arguments.
    Func(Func),
    /// An already-built computation, driven as is.
    Saga(Box<dyn Saga>),
}

impl fmt::Debug for CallTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Func(func) => fmt::Debug::fmt(func, f),
            Self::Saga(saga) => write!(f, "Saga({})", saga.name()),
        }
    }
}

/// Payload of CALL and FORK.
#[derive(Debug)]
pub struct CallDescriptor {
    /// Call context.
    pub this: Value,
    /// What to invoke.
    pub target: CallTarget,
    /// Arguments.
    pub args: Vec<Value>,
}

impl CallDescriptor {
    /// Name of the target, used for task names and labels.
    #[must_use]
    pub fn name(&self) -> &str {
        match &self.target {
            CallTarget::Func(func) => func.name(),
            CallTarget::Saga(saga) => saga.name(),
        }
    }
}

/// Payload of CPS.
#[derive(Debug)]
pub struct CpsDescriptor {
    /// Call context.
    pub this: Value,
    /// What to invoke.
    pub func: CpsFunc,
    /// Arguments.
    pub args: Vec<Value>,
}

/// The built-in delay: resolves with `true` after `args[0]` milliseconds of
/// virtual time.
#[must_use]
pub fn delay_fn() -> Func {
    Func::scoped("delay", |scope, args| {
        let millis = args
            .first()
            .and_then(Value::as_i64)
            .and_then(|ms| u64::try_from(ms).ok())
            .ok_or_else(|| {
                Error::invalid_argument("delay expects a non-negative millisecond count")
            })?;
        let timer = scope.runtime().timer();
        Ok(CallResult::Value(Value::Pending(
            timer.delay(Duration::from_millis(millis)),
        )))
    })
}
