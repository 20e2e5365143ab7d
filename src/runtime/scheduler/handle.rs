//! Pollable and awaitable handles to dispatched work.
//!
//! `Runner::run` wraps a body in [`Tracked`], which publishes the body's
//! terminal state and final contract into a shared cell. The returned
//! [`TaskHandle`] can be polled from anywhere, blocked on from a foreign
//! thread, or turned into a [`Continuation`] task that another lane uses to
//! wait for the work without blocking its runner.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::contract::TaskContract;
use super::task::{Step, StepContext, StepState, Task};

/// Lifecycle of work behind a [`TaskHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Submitted, not stepped yet.
    Pending,
    /// Stepped at least once.
    Running,
    Completed,
    Faulted,
    /// Disposed before reaching a terminal state (stop, reset or kill).
    Cancelled,
}

impl HandleState {
    #[inline]
    fn from_u8(val: u8) -> Self {
        match val {
            0 => HandleState::Pending,
            1 => HandleState::Running,
            2 => HandleState::Completed,
            3 => HandleState::Faulted,
            _ => HandleState::Cancelled,
        }
    }

    #[inline]
    fn as_u8(&self) -> u8 {
        match self {
            HandleState::Pending => 0,
            HandleState::Running => 1,
            HandleState::Completed => 2,
            HandleState::Faulted => 3,
            HandleState::Cancelled => 4,
        }
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        matches!(
            self,
            HandleState::Completed | HandleState::Faulted | HandleState::Cancelled
        )
    }
}

struct HandleCell {
    task: String,
    state: AtomicU8,
    result: Mutex<Option<TaskContract>>,
    done: Condvar,
}

impl HandleCell {
    fn publish(
        &self,
        state: HandleState,
        result: Option<TaskContract>,
    ) {
        let mut slot = self.result.lock();
        if HandleState::from_u8(self.state.load(Ordering::Acquire)).is_done() {
            return;
        }
        *slot = result;
        self.state.store(state.as_u8(), Ordering::Release);
        self.done.notify_all();
    }
}

/// Shared, cloneable view of dispatched work.
#[derive(Clone)]
pub struct TaskHandle {
    cell: Arc<HandleCell>,
}

impl fmt::Debug for TaskHandle {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("task", &self.cell.task)
            .field("state", &self.state())
            .finish()
    }
}

impl TaskHandle {
    /// Wrap `task` so its outcome is published to the returned handle.
    pub fn track<T: Task + 'static>(task: T) -> (Tracked, TaskHandle) {
        let cell = Arc::new(HandleCell {
            task: task.name().to_string(),
            state: AtomicU8::new(HandleState::Pending.as_u8()),
            result: Mutex::new(None),
            done: Condvar::new(),
        });
        let tracked = Tracked {
            inner: Box::new(task),
            cell: cell.clone(),
            stepping: false,
        };
        (tracked, TaskHandle { cell })
    }

    /// Name of the tracked task.
    #[inline]
    pub fn task_name(&self) -> &str {
        &self.cell.task
    }

    #[inline]
    pub fn state(&self) -> HandleState {
        HandleState::from_u8(self.cell.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.state().is_done()
    }

    /// Take the final contract. Yields it once; later calls return `None`.
    pub fn take_result(&self) -> Option<TaskContract> {
        if !self.is_done() {
            return None;
        }
        self.cell.result.lock().take()
    }

    /// Block until the work is done or `timeout` elapses.
    ///
    /// Never call this from the thread of the runner that executes the work.
    pub fn wait(
        &self,
        timeout: Duration,
    ) -> Option<HandleState> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.cell.result.lock();
        loop {
            let state = self.state();
            if state.is_done() {
                return Some(state);
            }
            if self.cell.done.wait_until(&mut guard, deadline).timed_out() {
                let state = self.state();
                return state.is_done().then_some(state);
            }
        }
    }

    /// A task that stays running until this handle is done, then completes
    /// with the tracked work's final contract.
    pub fn continuation(&self) -> Continuation {
        Continuation {
            handle: self.clone(),
        }
    }
}

/// Runner-side wrapper publishing a body's outcome.
pub struct Tracked {
    inner: Box<dyn Task>,
    cell: Arc<HandleCell>,
    stepping: bool,
}

impl fmt::Debug for Tracked {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Tracked")
            .field("task", &self.cell.task)
            .finish()
    }
}

impl Task for Tracked {
    fn step(
        &mut self,
        cx: &mut StepContext<'_>,
    ) -> Step {
        if self.stepping {
            // A previous step unwound; keep reporting the fault.
            return Step::fault(anyhow::anyhow!("task '{}' previously panicked", self.cell.task));
        }
        self.cell
            .state
            .compare_exchange(
                HandleState::Pending.as_u8(),
                HandleState::Running.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok();

        self.stepping = true;
        let step = self.inner.step(cx);
        self.stepping = false;

        if step.is_terminal() {
            let state = match step.state {
                StepState::Faulted => HandleState::Faulted,
                _ => HandleState::Completed,
            };
            self.cell.publish(state, step.contract.try_clone());
        }
        step
    }

    fn dispose(&mut self) {
        if self.stepping {
            self.cell.publish(
                HandleState::Faulted,
                Some(TaskContract::exception(anyhow::anyhow!(
                    "task '{}' panicked",
                    self.cell.task
                ))),
            );
        } else {
            self.cell.publish(HandleState::Cancelled, None);
        }
        self.inner.dispose();
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Waits on a [`TaskHandle`] from inside another runner's lane.
#[derive(Debug, Clone)]
pub struct Continuation {
    handle: TaskHandle,
}

impl Task for Continuation {
    fn step(
        &mut self,
        _cx: &mut StepContext<'_>,
    ) -> Step {
        if !self.handle.is_done() {
            return Step::yield_now();
        }
        match self.handle.take_result() {
            Some(result) => Step::complete_with(result),
            None => Step::complete(),
        }
    }

    fn name(&self) -> &str {
        "continuation"
    }
}

impl TaskContract {
    /// Copy of the contract, for variants that can be shared.
    ///
    /// Returns `None` for `InlineChild` and `FireAndForget`, which own a body.
    pub fn try_clone(&self) -> Option<TaskContract> {
        Some(match self {
            TaskContract::Yield => TaskContract::Yield,
            TaskContract::Continue => TaskContract::Continue,
            TaskContract::Surrender => TaskContract::Surrender,
            TaskContract::Value(v) => TaskContract::Value(*v),
            TaskContract::Reference(r) => TaskContract::Reference(r.clone()),
            TaskContract::Exception(e) => TaskContract::Exception(e.clone()),
            TaskContract::Break(mode) => TaskContract::Break(*mode),
            TaskContract::Handle(h) => TaskContract::Handle(h.clone()),
            TaskContract::InlineChild(_) | TaskContract::FireAndForget(_) => return None,
        })
    }
}
