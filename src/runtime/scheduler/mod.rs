//! Cooperative task scheduler
//!
//! Tasks are resumable bodies stepped one at a time by a runner. Each step
//! returns a [`Step`]: a [`TaskContract`] saying what the task wants next and a
//! [`StepState`] saying where it is in its life. The runner keeps every live
//! task in a [`Registry`] and every independent chain of work in a lane of the
//! run list; a [`FlowModifier`] decides how many lanes one tick covers.
//!
//! Execution contexts (steppable, dedicated thread, blocking) live in
//! [`crate::runtime::runner`]; this module is the engine they share.

pub mod contract;
pub mod diagnostics;
pub mod error;
pub mod flow;
pub mod flushing;
pub mod handle;
pub mod inbox;
pub mod process;
pub mod registry;
pub mod run_list;
pub mod stats;
pub mod task;

#[cfg(test)]
mod tests;

pub use contract::{BreakMode, Scalar, TaskContract};
pub use diagnostics::{CollectingSink, DiagnosticsSink, TracingSink};
pub use error::{SchedulerError, SchedulerResult, TaskFault};
pub use flow::{
    parse_flow, FlowModifier, LaneOutcome, Serial, Staggered, Standard, TimeBound, TimeSliced,
};
pub use flushing::FlushingOperation;
pub use handle::{Continuation, HandleState, TaskHandle, Tracked};
pub use inbox::{Inbox, WakeSignal};
pub use process::{LaneInfo, Process, RunnerShared};
pub use registry::{Registry, SlotHandle};
pub use run_list::RunList;
pub use stats::{RunnerStats, StatsSnapshot};
pub use task::{from_fn, FnTask, Step, StepContext, StepState, Task, TaskBuilder, YieldN};
