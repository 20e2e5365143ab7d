//! Task definitions for the scheduler.
//!
//! A task is any resumable body exposing `step`. Each call advances the body
//! to its next suspension point and reports a [`Step`]: the
//! [`TaskContract`] it produced plus its [`StepState`].

use std::fmt;

use super::contract::{BreakMode, TaskContract};

/// Per-step state reported by a task body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    /// The body has more work and should be resumed.
    Running,
    /// The body has more work but surrenders the rest of this tick's budget.
    Waiting,
    /// The body finished normally.
    Completed,
    /// The body failed.
    Faulted,
}

impl StepState {
    /// Convert from u8 (for atomic storage).
    #[inline]
    pub fn from_u8(val: u8) -> Self {
        match val {
            0 => StepState::Running,
            1 => StepState::Waiting,
            2 => StepState::Completed,
            3 => StepState::Faulted,
            _ => StepState::Running,
        }
    }

    /// Convert to u8 (for atomic storage).
    #[inline]
    pub fn as_u8(&self) -> u8 {
        match self {
            StepState::Running => 0,
            StepState::Waiting => 1,
            StepState::Completed => 2,
            StepState::Faulted => 3,
        }
    }

    /// Whether the body will not be resumed again.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepState::Completed | StepState::Faulted)
    }
}

/// Outcome of one resumption.
#[derive(Debug)]
pub struct Step {
    pub contract: TaskContract,
    pub state: StepState,
}

impl Step {
    #[inline]
    pub fn new(
        contract: TaskContract,
        state: StepState,
    ) -> Self {
        Self { contract, state }
    }

    /// Suspend until the next tick.
    #[inline]
    pub fn yield_now() -> Self {
        Self::new(TaskContract::Yield, StepState::Running)
    }

    /// Resume again in the same tick.
    #[inline]
    pub fn continue_now() -> Self {
        Self::new(TaskContract::Continue, StepState::Running)
    }

    /// Suspend and give up the remaining per-tick budget.
    #[inline]
    pub fn wait() -> Self {
        Self::new(TaskContract::Surrender, StepState::Waiting)
    }

    /// Publish a value and keep running.
    #[inline]
    pub fn emit(contract: TaskContract) -> Self {
        Self::new(contract, StepState::Running)
    }

    #[inline]
    pub fn complete() -> Self {
        Self::new(TaskContract::Yield, StepState::Completed)
    }

    /// Finish, leaving `contract` as the body's final result.
    #[inline]
    pub fn complete_with(contract: TaskContract) -> Self {
        Self::new(contract, StepState::Completed)
    }

    /// Fail with an error payload.
    #[inline]
    pub fn fault(err: impl Into<anyhow::Error>) -> Self {
        Self::new(TaskContract::exception(err), StepState::Faulted)
    }

    /// End this occupant only.
    #[inline]
    pub fn break_it() -> Self {
        Self::new(TaskContract::Break(BreakMode::It), StepState::Completed)
    }

    /// End this occupant and its immediate caller.
    #[inline]
    pub fn break_and_stop() -> Self {
        Self::new(TaskContract::Break(BreakMode::AndStop), StepState::Completed)
    }

    /// Hand the lane to `child` until it finishes.
    #[inline]
    pub fn child(child: impl Task + 'static) -> Self {
        Self::new(TaskContract::inline_child(child), StepState::Running)
    }

    /// Dispatch `child` as a sibling lane and keep running.
    #[inline]
    pub fn detach(child: impl Task + 'static) -> Self {
        Self::new(TaskContract::fire_and_forget(child), StepState::Running)
    }

    /// Whether the occupant that produced this step ends with it.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal() || self.contract.is_break()
    }
}

/// What the scheduler tells a body when resuming it.
#[derive(Debug)]
pub struct StepContext<'a> {
    runner: &'a str,
    stop_requested: bool,
    child_result: Option<TaskContract>,
}

impl<'a> StepContext<'a> {
    pub(crate) fn new(
        runner: &'a str,
        stop_requested: bool,
        child_result: Option<TaskContract>,
    ) -> Self {
        Self {
            runner,
            stop_requested,
            child_result,
        }
    }

    /// Context for driving a body by hand, outside any runner.
    pub fn detached() -> StepContext<'static> {
        StepContext {
            runner: "detached",
            stop_requested: false,
            child_result: None,
        }
    }

    /// Name of the runner resuming this body.
    #[inline]
    pub fn runner_name(&self) -> &str {
        self.runner
    }

    /// Whether the runner is tearing this occupant down.
    #[inline]
    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    /// Final contract of the inline child that just finished in this lane.
    #[inline]
    pub fn take_child_result(&mut self) -> Option<TaskContract> {
        self.child_result.take()
    }
}

/// A resumable unit of work.
pub trait Task: Send {
    /// Advance to the next suspension point.
    fn step(
        &mut self,
        cx: &mut StepContext<'_>,
    ) -> Step;

    /// Release resources. Called exactly once when the task leaves its runner,
    /// whether it completed, faulted, was stopped, or was reset.
    fn dispose(&mut self) {}

    /// Name used in logs and diagnostics.
    fn name(&self) -> &str {
        "task"
    }
}

impl<T: Task + ?Sized> Task for Box<T> {
    fn step(
        &mut self,
        cx: &mut StepContext<'_>,
    ) -> Step {
        (**self).step(cx)
    }

    fn dispose(&mut self) {
        (**self).dispose()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

type DisposeHook = Box<dyn FnOnce() + Send>;

/// A task whose body is a closure.
pub struct FnTask<F> {
    name: String,
    body: F,
    on_dispose: Option<DisposeHook>,
}

impl<F> fmt::Debug for FnTask<F> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("FnTask")
            .field("name", &self.name)
            .field("has_dispose_hook", &self.on_dispose.is_some())
            .finish()
    }
}

impl<F> Task for FnTask<F>
where
    F: FnMut(&mut StepContext<'_>) -> Step + Send,
{
    fn step(
        &mut self,
        cx: &mut StepContext<'_>,
    ) -> Step {
        (self.body)(cx)
    }

    fn dispose(&mut self) {
        if let Some(hook) = self.on_dispose.take() {
            hook();
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Build a task from a closure.
pub fn from_fn<F>(
    name: impl Into<String>,
    body: F,
) -> FnTask<F>
where
    F: FnMut(&mut StepContext<'_>) -> Step + Send,
{
    TaskBuilder::new().name(name).build(body)
}

/// Task builder for closure bodies.
#[derive(Default)]
pub struct TaskBuilder {
    name: Option<String>,
    on_dispose: Option<DisposeHook>,
}

impl fmt::Debug for TaskBuilder {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("TaskBuilder")
            .field("name", &self.name)
            .finish()
    }
}

impl TaskBuilder {
    /// Create a new task builder.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the task name.
    #[inline]
    pub fn name(
        mut self,
        name: impl Into<String>,
    ) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Run `hook` when the task is disposed.
    #[inline]
    pub fn on_dispose(
        mut self,
        hook: impl FnOnce() + Send + 'static,
    ) -> Self {
        self.on_dispose = Some(Box::new(hook));
        self
    }

    /// Build the task around `body`.
    pub fn build<F>(
        self,
        body: F,
    ) -> FnTask<F>
    where
        F: FnMut(&mut StepContext<'_>) -> Step + Send,
    {
        FnTask {
            name: self.name.unwrap_or_else(|| "task".to_string()),
            body,
            on_dispose: self.on_dispose,
        }
    }
}

/// A body that yields `n` times and then completes.
#[derive(Debug, Clone)]
pub struct YieldN {
    remaining: usize,
}

impl YieldN {
    pub fn new(n: usize) -> Self {
        Self { remaining: n }
    }
}

impl Task for YieldN {
    fn step(
        &mut self,
        _cx: &mut StepContext<'_>,
    ) -> Step {
        if self.remaining == 0 {
            return Step::complete();
        }
        self.remaining -= 1;
        Step::yield_now()
    }

    fn name(&self) -> &str {
        "yield-n"
    }
}
