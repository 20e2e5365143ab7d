//! The per-step result protocol.
//!
//! Every resumption of a task body produces exactly one [`TaskContract`]
//! alongside its [`StepState`](super::task::StepState). The contract tells the
//! scheduler what the body wants next: suspend, resume immediately, hand the
//! lane to a child, end the lane, or simply publish a value.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::handle::TaskHandle;
use super::task::Task;

/// Primitive payload carried by [`TaskContract::Value`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Int(v as i64)
    }
}

impl From<u64> for Scalar {
    fn from(v: u64) -> Self {
        Scalar::UInt(v)
    }
}

impl From<usize> for Scalar {
    fn from(v: usize) -> Self {
        Scalar::UInt(v as u64)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl Scalar {
    /// Integer view of the payload, if it is integral.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Scalar::Int(v) => Some(v),
            Scalar::UInt(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }
}

/// How a `Break` contract terminates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakMode {
    /// End the current occupant only; its parent resumes normally.
    It,
    /// End the current occupant and mark its immediate parent for termination.
    AndStop,
}

/// Tagged result of one resumption step. Exactly one variant is active.
pub enum TaskContract {
    /// Suspend; resume on the next tick.
    Yield,
    /// Resume again within the same tick without suspending.
    Continue,
    /// Surrender the remainder of this tick's budget (honoured by `TimeSliced`).
    Surrender,
    /// Primitive payload.
    Value(Scalar),
    /// Opaque object payload.
    Reference(Arc<dyn Any + Send + Sync>),
    /// Error payload published by the body.
    Exception(Arc<anyhow::Error>),
    /// End the current occupant.
    Break(BreakMode),
    /// Run this body to completion in the same lane, then resume the caller.
    InlineChild(Box<dyn Task>),
    /// Dispatch this body as a new lane; the caller does not wait.
    FireAndForget(Box<dyn Task>),
    /// A handle to work dispatched elsewhere, pollable by whoever reads it.
    Handle(TaskHandle),
}

impl TaskContract {
    /// Wrap a primitive value.
    #[inline]
    pub fn value(v: impl Into<Scalar>) -> Self {
        TaskContract::Value(v.into())
    }

    /// Wrap an object reference.
    #[inline]
    pub fn reference<T: Any + Send + Sync>(v: T) -> Self {
        TaskContract::Reference(Arc::new(v))
    }

    /// Wrap an error payload.
    #[inline]
    pub fn exception(err: impl Into<anyhow::Error>) -> Self {
        TaskContract::Exception(Arc::new(err.into()))
    }

    /// Delegate to a child body in the same lane.
    #[inline]
    pub fn inline_child(task: impl Task + 'static) -> Self {
        TaskContract::InlineChild(Box::new(task))
    }

    /// Dispatch a child body without waiting for it.
    #[inline]
    pub fn fire_and_forget(task: impl Task + 'static) -> Self {
        TaskContract::FireAndForget(Box::new(task))
    }

    pub fn is_yield(&self) -> bool {
        matches!(self, TaskContract::Yield)
    }

    pub fn is_break(&self) -> bool {
        matches!(self, TaskContract::Break(_))
    }

    /// Break mode, if this is a `Break` contract.
    pub fn break_mode(&self) -> Option<BreakMode> {
        match self {
            TaskContract::Break(mode) => Some(*mode),
            _ => None,
        }
    }

    /// Primitive payload, if this is a `Value` contract.
    pub fn as_value(&self) -> Option<Scalar> {
        match self {
            TaskContract::Value(v) => Some(*v),
            _ => None,
        }
    }

    /// Typed view of a `Reference` payload.
    pub fn as_reference<T: Any + Send + Sync>(&self) -> Option<&T> {
        match self {
            TaskContract::Reference(r) => r.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Error payload, if this is an `Exception` contract.
    pub fn as_exception(&self) -> Option<&anyhow::Error> {
        match self {
            TaskContract::Exception(e) => Some(&**e),
            _ => None,
        }
    }

    /// The handle, if this is a `Handle` contract.
    pub fn as_handle(&self) -> Option<&TaskHandle> {
        match self {
            TaskContract::Handle(h) => Some(h),
            _ => None,
        }
    }

    /// Short variant name, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TaskContract::Yield => "Yield",
            TaskContract::Continue => "Continue",
            TaskContract::Surrender => "Surrender",
            TaskContract::Value(_) => "Value",
            TaskContract::Reference(_) => "Reference",
            TaskContract::Exception(_) => "Exception",
            TaskContract::Break(BreakMode::It) => "Break.It",
            TaskContract::Break(BreakMode::AndStop) => "Break.AndStop",
            TaskContract::InlineChild(_) => "InlineChild",
            TaskContract::FireAndForget(_) => "FireAndForget",
            TaskContract::Handle(_) => "Handle",
        }
    }
}

impl fmt::Debug for TaskContract {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            TaskContract::Value(v) => f.debug_tuple("Value").field(v).finish(),
            TaskContract::Exception(e) => f.debug_tuple("Exception").field(&e.to_string()).finish(),
            TaskContract::InlineChild(t) => f.debug_tuple("InlineChild").field(&t.name()).finish(),
            TaskContract::FireAndForget(t) => {
                f.debug_tuple("FireAndForget").field(&t.name()).finish()
            }
            TaskContract::Handle(h) => f.debug_tuple("Handle").field(&h.state()).finish(),
            other => f.write_str(other.kind()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_accessors() {
        let c = TaskContract::value(42i64);
        assert_eq!(c.as_value(), Some(Scalar::Int(42)));
        assert_eq!(c.as_value().and_then(|v| v.as_i64()), Some(42));
        assert!(c.as_exception().is_none());
        assert!(!c.is_break());
    }

    #[test]
    fn test_reference_downcast() {
        let c = TaskContract::reference(String::from("payload"));
        assert_eq!(c.as_reference::<String>().map(|s| s.as_str()), Some("payload"));
        assert!(c.as_reference::<u32>().is_none());
    }

    #[test]
    fn test_break_modes() {
        assert_eq!(TaskContract::Break(BreakMode::It).break_mode(), Some(BreakMode::It));
        assert_eq!(TaskContract::Break(BreakMode::AndStop).kind(), "Break.AndStop");
        assert_eq!(TaskContract::Yield.break_mode(), None);
    }

    #[test]
    fn test_exception_display() {
        let c = TaskContract::exception(anyhow::anyhow!("boom"));
        assert_eq!(c.as_exception().map(|e| e.to_string()), Some("boom".to_string()));
        assert_eq!(format!("{:?}", c), "Exception(\"boom\")");
    }
}
