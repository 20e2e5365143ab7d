//! Blocking runner.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::utils::Backoff;
use tracing::{debug, warn};

use super::{Runner, SteppableRunner};
use crate::runtime::scheduler::{
    FlowModifier, RunnerShared, SchedulerError, SchedulerResult, Task, TaskContract,
};
use crate::util::config::SyncConfig;

/// A [`SteppableRunner`] drained to completion on the caller's thread.
#[derive(Debug)]
pub struct SyncRunner {
    inner: SteppableRunner,
    config: SyncConfig,
}

impl SyncRunner {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, SyncConfig::default())
    }

    pub fn with_config(
        name: impl Into<String>,
        config: SyncConfig,
    ) -> Self {
        Self {
            inner: SteppableRunner::new(name),
            config,
        }
    }

    pub fn set_flow_modifier(
        &mut self,
        flow: Box<dyn FlowModifier>,
    ) {
        self.inner.set_flow_modifier(flow);
    }

    /// The wrapped runner, for callers that want to tick by hand.
    pub fn steppable(&mut self) -> &mut SteppableRunner {
        &mut self.inner
    }

    /// Tick until no lane or queued submission remains.
    ///
    /// Fails with [`SchedulerError::Timeout`] if work is still left after
    /// `timeout`; whatever remains stays scheduled.
    pub fn drain(
        &mut self,
        timeout: Duration,
    ) -> SchedulerResult<()> {
        let deadline = Instant::now() + timeout;
        let backoff = Backoff::new();
        let mut ticks = 0usize;

        loop {
            let busy_before = self.stats().busy_ticks;
            self.inner.tick();
            ticks += 1;

            if !self.inner.has_tasks() {
                debug!("runner '{}': drained in {} ticks", self.name(), ticks);
                return Ok(());
            }
            if Instant::now() >= deadline {
                warn!("runner '{}': drain timed out after {} ticks", self.name(), ticks);
                return Err(SchedulerError::Timeout {
                    runner: self.name().to_string(),
                    timeout,
                });
            }

            if self.stats().busy_ticks > busy_before {
                backoff.reset();
            } else {
                backoff.snooze();
            }
        }
    }

    /// [`drain`](Self::drain) with the configured timeout.
    pub fn drain_default(&mut self) -> SchedulerResult<()> {
        self.drain(self.config.timeout())
    }

    /// Submit `task`, drain, and return its final contract.
    pub fn run_blocking<T: Task + 'static>(
        &mut self,
        task: T,
    ) -> SchedulerResult<Option<TaskContract>> {
        let handle = self.run(task)?;
        self.drain_default()?;
        Ok(handle.take_result())
    }
}

impl Runner for SyncRunner {
    fn shared(&self) -> &Arc<RunnerShared> {
        self.inner.shared()
    }

    fn has_tasks(&self) -> bool {
        self.inner.has_tasks()
    }

    fn dispose(&mut self) -> SchedulerResult<()> {
        self.inner.dispose()
    }
}
