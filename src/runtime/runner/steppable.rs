//! Caller-driven runner.

use std::sync::Arc;

use tracing::debug;

use super::Runner;
use crate::runtime::scheduler::{
    DiagnosticsSink, FlowModifier, LaneInfo, Process, RunnerShared, SchedulerResult, Standard,
    TracingSink,
};

/// A runner ticked explicitly by its owner, typically once per host frame.
///
/// Single-threaded: `tick` must be called from the thread that owns the
/// runner. Other threads may still submit through [`Runner::shared`].
#[derive(Debug)]
pub struct SteppableRunner {
    process: Process,
}

impl SteppableRunner {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_flow(name, Box::new(Standard))
    }

    pub fn with_flow(
        name: impl Into<String>,
        flow: Box<dyn FlowModifier>,
    ) -> Self {
        Self::with_parts(name, flow, Arc::new(TracingSink))
    }

    pub fn with_parts(
        name: impl Into<String>,
        flow: Box<dyn FlowModifier>,
        sink: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        let shared = Arc::new(RunnerShared::new(name));
        Self {
            process: Process::with_parts(shared, flow, sink),
        }
    }

    /// Run one tick. Returns `false` once killed and drained.
    #[inline]
    pub fn tick(&mut self) -> bool {
        self.process.tick()
    }

    pub fn set_flow_modifier(
        &mut self,
        flow: Box<dyn FlowModifier>,
    ) {
        self.process.set_flow_modifier(flow);
    }

    pub fn set_diagnostics_sink(
        &mut self,
        sink: Arc<dyn DiagnosticsSink>,
    ) {
        self.process.set_diagnostics_sink(sink);
    }

    #[inline]
    pub fn lane_count(&self) -> usize {
        self.process.lane_count()
    }

    pub fn lanes(&self) -> Vec<LaneInfo> {
        self.process.lanes()
    }

    #[inline]
    pub fn flow_name(&self) -> &'static str {
        self.process.flow_name()
    }
}

impl Runner for SteppableRunner {
    fn shared(&self) -> &Arc<RunnerShared> {
        self.process.shared()
    }

    fn has_tasks(&self) -> bool {
        self.process.has_tasks()
    }

    fn dispose(&mut self) -> SchedulerResult<()> {
        // Already killed is fine here.
        self.shared().kill().ok();
        let mut ticks = 0;
        while self.process.tick() {
            ticks += 1;
        }
        debug!("runner '{}': disposed after {} ticks", self.name(), ticks);
        Ok(())
    }
}
