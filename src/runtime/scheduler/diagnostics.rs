//! Diagnostics sink for task faults.
//!
//! The scheduler never lets a task fault escape `tick`; it hands the fault to
//! the runner's sink instead and tears the lane down.

use std::fmt;

use parking_lot::Mutex;
use tracing::error;

use super::error::TaskFault;

/// Receives every task fault caught by a runner.
pub trait DiagnosticsSink: Send + Sync + fmt::Debug {
    fn report(
        &self,
        fault: &TaskFault,
        message: &str,
    );
}

/// Default sink: logs through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn report(
        &self,
        fault: &TaskFault,
        message: &str,
    ) {
        error!(task = fault.task(), "{}: {}", message, fault);
    }
}

/// Sink that keeps every report, for inspection in tests and tools.
#[derive(Debug, Default)]
pub struct CollectingSink {
    reports: Mutex<Vec<(TaskFault, String)>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }

    /// Copy of everything reported so far.
    pub fn reports(&self) -> Vec<(TaskFault, String)> {
        self.reports.lock().clone()
    }
}

impl DiagnosticsSink for CollectingSink {
    fn report(
        &self,
        fault: &TaskFault,
        message: &str,
    ) {
        self.reports.lock().push((fault.clone(), message.to_string()));
    }
}
