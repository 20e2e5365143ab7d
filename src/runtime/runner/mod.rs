//! Runner front-ends
//!
//! Every runner wraps one scheduling [`Process`](crate::runtime::scheduler::Process)
//! and differs only in who calls `tick`:
//!
//! - [`SteppableRunner`]: the caller, explicitly.
//! - [`MultiThreadRunner`]: a dedicated background thread.
//! - [`SyncRunner`]: a blocking drain loop on the caller's thread.
//!
//! Submission and lifecycle calls go through the runner's
//! [`RunnerShared`] half and are safe from any thread.

pub mod multi_thread;
pub mod steppable;
pub mod sync;

pub use multi_thread::{MultiThreadRunner, MultiThreadRunnerBuilder};
pub use steppable::SteppableRunner;
pub use sync::SyncRunner;

use std::sync::Arc;

use crate::runtime::scheduler::{
    RunnerShared, SchedulerResult, StatsSnapshot, Task, TaskHandle,
};

/// Operations shared by every runner.
pub trait Runner {
    /// Thread-safe half of the runner.
    fn shared(&self) -> &Arc<RunnerShared>;

    /// Kill the runner and release its resources.
    ///
    /// Disposing an already-killed runner is not an error.
    fn dispose(&mut self) -> SchedulerResult<()>;

    fn name(&self) -> &str {
        self.shared().name()
    }

    /// Queue a root task.
    fn submit(
        &self,
        task: Box<dyn Task>,
    ) -> SchedulerResult<()> {
        self.shared().submit(task)
    }

    /// Queue a root task.
    fn add<T: Task + 'static>(
        &self,
        task: T,
    ) -> SchedulerResult<()>
    where
        Self: Sized,
    {
        self.submit(Box::new(task))
    }

    /// Queue a root task and get a handle publishing its outcome.
    fn run<T: Task + 'static>(
        &self,
        task: T,
    ) -> SchedulerResult<TaskHandle>
    where
        Self: Sized,
    {
        self.shared().run(task)
    }

    fn has_tasks(&self) -> bool {
        self.shared().has_tasks()
    }

    fn pause(&self) -> SchedulerResult<()> {
        self.shared().pause()
    }

    fn resume(&self) -> SchedulerResult<()> {
        self.shared().resume()
    }

    /// Give each lane a last step as the flow modifier reaches it; queued
    /// submissions run once the stop completes.
    fn stop(&self) -> SchedulerResult<()> {
        self.shared().stop()
    }

    /// Stop and clear everything, queued submissions included, without
    /// running any more user code.
    fn flush(&self) -> SchedulerResult<()> {
        self.shared().flush()
    }

    fn is_paused(&self) -> bool {
        self.shared().is_paused()
    }

    fn is_killed(&self) -> bool {
        self.shared().is_killed()
    }

    fn stats(&self) -> StatsSnapshot {
        self.shared().stats()
    }
}
