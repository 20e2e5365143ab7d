//! Scheduler errors

use std::time::Duration;
use thiserror::Error;

/// Scheduler result
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Errors raised synchronously at the call site of a runner or collection.
///
/// Task bodies never produce these: a faulting body is reported to the
/// diagnostics sink as a [`TaskFault`] and its lane is torn down.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("runner '{runner}' has been killed")]
    Killed { runner: String },

    #[error("collection '{name}' has already been started")]
    AlreadyStarted { name: String },

    #[error("collection '{name}' has no work to start")]
    NothingToStart { name: String },

    #[error("runner '{runner}' did not drain within {timeout:?}")]
    Timeout { runner: String, timeout: Duration },

    #[error("runner '{runner}' thread panicked: {message}")]
    RunnerPanicked { runner: String, message: String },

    #[error("failed to spawn thread for runner '{runner}'")]
    Spawn {
        runner: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid pool size: {0}")]
    InvalidPoolSize(usize),
}

impl SchedulerError {
    #[inline]
    pub(crate) fn killed(runner: &str) -> Self {
        SchedulerError::Killed {
            runner: runner.to_string(),
        }
    }
}

/// A fault raised by a task body, caught at the scheduler boundary.
#[derive(Debug, Clone, Error)]
pub enum TaskFault {
    /// The body returned `StepState::Faulted`.
    #[error("task '{task}' faulted: {message}")]
    Faulted { task: String, message: String },

    /// The body panicked inside `step`.
    #[error("task '{task}' panicked: {message}")]
    Panicked { task: String, message: String },
}

impl TaskFault {
    /// Name of the task that faulted.
    pub fn task(&self) -> &str {
        match self {
            TaskFault::Faulted { task, .. } | TaskFault::Panicked { task, .. } => task,
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
