//! Turns any call target into a saga.
//!
//! Forked tasks and nested saga calls are driven through the step protocol
//! whatever their target produced:
//!
//! - an already-built saga is used as is
//! - a function is invoked now; if it fails, the failure is captured in a
//!   saga that fails on its first step, so the caller's own flow never sees
//!   it synchronously
//! - a function producing a saga yields that saga
//! - a function producing a plain value yields a two-step saga that
//!   resolves the value (awaiting it if pending) and finishes with it

use super::{Saga, Step};
use crate::effect::{self, CallDescriptor, CallResult, CallScope, CallTarget, Func};
use crate::error::{Error, Result};
use crate::processor::Runtime;
use crate::types::{Resume, Value};

pub(crate) fn task_saga(call: CallDescriptor, runtime: &Runtime) -> Box<dyn Saga> {
    let name = call.name().to_owned();
    let func = match call.target {
        CallTarget::Saga(saga) => return saga,
        CallTarget::Func(func) => func,
    };
    let scope = CallScope::new(call.this, runtime.clone());
    match func.invoke(&scope, call.args) {
        Err(error) => Box::new(FailedSaga {
            name,
            error: Some(error),
        }),
        Ok(CallResult::Saga(saga)) => saga,
        Ok(CallResult::Value(value)) => Box::new(ValueSaga {
            name,
            value: Some(value),
        }),
    }
}

struct FailedSaga {
    name: String,
    error: Option<Error>,
}

impl Saga for FailedSaga {
    fn step(&mut self, _input: Resume) -> Result<Step> {
        Err(self
            .error
            .take()
            .unwrap_or_else(|| Error::internal("failed saga stepped twice")))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

struct ValueSaga {
    name: String,
    value: Option<Value>,
}

impl Saga for ValueSaga {
    fn step(&mut self, input: Resume) -> Result<Step> {
        if let Some(value) = self.value.take() {
            let resolve = Func::new(&self.name, move |_| Ok(value.clone()));
            return Ok(Step::Yield(effect::call(resolve, Vec::new())));
        }
        match input {
            Resume::Value(value) => Ok(Step::Done(value)),
            Resume::Error(err) => Err(err),
            Resume::Cancel | Resume::Close => Ok(Step::Done(Value::Unit)),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::EffectKind;
    use crate::error::ErrorKind;
    use crate::saga;
    use crate::test_utils::test_runtime;

    fn desc(target: CallTarget) -> CallDescriptor {
        CallDescriptor {
            this: Value::Unit,
            target,
            args: vec![Value::from(2)],
        }
    }

    #[test]
    fn synchronous_failure_is_deferred_to_first_step() {
        let (rt, _hub) = test_runtime();
        let failing = Func::new("boom", |_| Err(Error::user("boom")));
        let mut s = task_saga(desc(CallTarget::Func(failing)), &rt);
        assert_eq!(s.name(), "boom");
        let err = s.step(Resume::Value(Value::Unit)).expect_err("fails on step");
        assert_eq!(err.kind(), ErrorKind::User);
    }

    #[test]
    fn plain_value_yields_once_then_finishes() {
        let (rt, _hub) = test_runtime();
        let double = Func::new("double", |args| {
            Ok(Value::from(args[0].as_i64().unwrap_or(0) * 2))
        });
        let mut s = task_saga(desc(CallTarget::Func(double)), &rt);
        let Ok(Step::Yield(e)) = s.step(Resume::Value(Value::Unit)) else {
            unreachable!("value saga yields first");
        };
        assert_eq!(e.kind(), EffectKind::Call);
        let Ok(Step::Done(v)) = s.step(Resume::Value(Value::from(4))) else {
            unreachable!("value saga finishes second");
        };
        assert_eq!(v, Value::from(4));
    }

    #[test]
    fn saga_targets_pass_through() {
        let (rt, _hub) = test_runtime();
        let inner = saga::from_fn("inner", |_| Ok(Step::Done(Value::from(1))));
        let s = task_saga(desc(CallTarget::Saga(Box::new(inner))), &rt);
        assert_eq!(s.name(), "inner");
        let maker = Func::saga("maker", |_| {
            saga::from_fn("made", |_| Ok(Step::Done(Value::Unit)))
        });
        let s = task_saga(desc(CallTarget::Func(maker)), &rt);
        assert_eq!(s.name(), "made");
    }
}
