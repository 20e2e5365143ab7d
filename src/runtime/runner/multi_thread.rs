//! Runner that owns a dedicated background thread.
//!
//! The thread is the only one touching the registry, run list and flow
//! modifier. It loops `tick`, and when there is nothing to do it escalates
//! from spinning to yielding to parking; submissions and lifecycle calls
//! unpark it through the runner's wake signal.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::utils::Backoff;
use tracing::{debug, error};

use super::Runner;
use crate::runtime::scheduler::error::panic_message;
use crate::runtime::scheduler::{
    DiagnosticsSink, FlowModifier, Process, RunnerShared, SchedulerError, SchedulerResult,
    Standard, TracingSink,
};
use crate::util::config::MultiThreadConfig;

/// Builder for [`MultiThreadRunner`].
#[derive(Debug)]
pub struct MultiThreadRunnerBuilder {
    name: String,
    flow: Option<Box<dyn FlowModifier>>,
    sink: Option<Arc<dyn DiagnosticsSink>>,
    config: MultiThreadConfig,
}

impl MultiThreadRunnerBuilder {
    /// Flow modifier for the runner thread. Overrides `config.flow`.
    pub fn flow(
        mut self,
        flow: Box<dyn FlowModifier>,
    ) -> Self {
        self.flow = Some(flow);
        self
    }

    pub fn sink(
        mut self,
        sink: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(
        mut self,
        config: MultiThreadConfig,
    ) -> Self {
        self.config = config;
        self
    }

    pub fn park_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.config.park_timeout_ms = timeout.as_millis().max(1) as u64;
        self
    }

    /// Spawn the runner thread.
    pub fn spawn(self) -> SchedulerResult<MultiThreadRunner> {
        let flow = match self.flow {
            Some(flow) => flow,
            None => parse_configured_flow(&self.config),
        };
        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingSink));
        let shared = Arc::new(RunnerShared::new(self.name.clone()));
        let process = Process::with_parts(shared.clone(), flow, sink);
        let park_timeout = self.config.park_timeout();

        let mut builder = thread::Builder::new().name(format!("coflow-{}", self.name));
        if let Some(stack_size) = self.config.stack_size {
            builder = builder.stack_size(stack_size);
        }
        let thread = builder
            .spawn(move || run_loop(process, park_timeout))
            .map_err(|source| SchedulerError::Spawn {
                runner: self.name.clone(),
                source,
            })?;

        debug!("runner '{}': thread started", self.name);
        Ok(MultiThreadRunner {
            shared,
            thread: Some(thread),
        })
    }
}

fn parse_configured_flow(config: &MultiThreadConfig) -> Box<dyn FlowModifier> {
    match config.flow_modifier() {
        Ok(flow) => flow,
        Err(err) => {
            error!("{}; using standard flow", err);
            Box::new(Standard)
        }
    }
}

/// Owning thread's loop. Exits once the runner is killed and drained.
fn run_loop(
    mut process: Process,
    park_timeout: Duration,
) {
    let shared = process.shared().clone();
    shared.signal.register_current();
    let backoff = Backoff::new();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| loop {
        if !process.tick() {
            break;
        }
        let idle = !process.has_tasks() || shared.flushing.is_paused();
        if !idle {
            backoff.reset();
            continue;
        }
        if backoff.is_completed() {
            shared.signal.wait(park_timeout);
            backoff.reset();
        } else {
            backoff.snooze();
        }
    }));

    match outcome {
        Ok(()) => debug!("runner '{}': thread exiting", shared.name()),
        Err(payload) => {
            error!(
                "runner '{}': scheduler loop panicked: {}",
                shared.name(),
                panic_message(&*payload)
            );
            shared.kill().ok();
            drop(process);
            panic::resume_unwind(payload);
        }
    }
}

/// A runner ticking on its own thread.
#[derive(Debug)]
pub struct MultiThreadRunner {
    shared: Arc<RunnerShared>,
    thread: Option<JoinHandle<()>>,
}

impl MultiThreadRunner {
    pub fn builder(name: impl Into<String>) -> MultiThreadRunnerBuilder {
        MultiThreadRunnerBuilder {
            name: name.into(),
            flow: None,
            sink: None,
            config: MultiThreadConfig::default(),
        }
    }

    /// Spawn with the standard flow and default settings.
    pub fn spawn(name: impl Into<String>) -> SchedulerResult<Self> {
        Self::builder(name).flow(Box::new(Standard)).spawn()
    }

    /// Whether the runner thread is still alive.
    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .map(|t| !t.is_finished())
            .unwrap_or(false)
    }

    fn join(&mut self) -> SchedulerResult<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        thread.join().map_err(|payload| SchedulerError::RunnerPanicked {
            runner: self.shared.name().to_string(),
            message: panic_message(&*payload),
        })
    }
}

impl Runner for MultiThreadRunner {
    fn shared(&self) -> &Arc<RunnerShared> {
        &self.shared
    }

    /// Kill the runner and join its thread.
    ///
    /// Returns [`SchedulerError::RunnerPanicked`] if the loop died of a
    /// non-task panic.
    fn dispose(&mut self) -> SchedulerResult<()> {
        self.shared.kill().ok();
        self.join()
    }
}

impl Drop for MultiThreadRunner {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.shared.kill().ok();
            if let Err(err) = self.join() {
                error!("{}", err);
            }
        }
    }
}
