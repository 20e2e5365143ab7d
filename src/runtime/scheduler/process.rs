//! Scheduler core: one tick over the run list.
//!
//! A [`Process`] owns the registry, the run list and the flow modifier. Only
//! the thread driving `tick` touches them; everything other threads may use
//! lives in [`RunnerShared`] (submission inbox, lifecycle flags, wake signal,
//! counters).

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::contract::{BreakMode, TaskContract};
use super::diagnostics::{DiagnosticsSink, TracingSink};
use super::error::{panic_message, SchedulerError, SchedulerResult, TaskFault};
use super::flow::{FlowModifier, LaneOutcome, Standard};
use super::flushing::FlushingOperation;
use super::handle::TaskHandle;
use super::inbox::{Inbox, WakeSignal};
use super::registry::{Registry, SlotHandle};
use super::run_list::RunList;
use super::stats::{RunnerStats, StatsSnapshot};
use super::task::{StepContext, StepState, Task};

/// Runner state that is safe to touch from any thread.
#[derive(Debug)]
pub struct RunnerShared {
    name: String,
    pub(crate) inbox: Inbox,
    pub(crate) flushing: FlushingOperation,
    pub(crate) signal: WakeSignal,
    pub(crate) stats: RunnerStats,
    /// Lane count as of the end of the last tick.
    lanes: AtomicUsize,
}

impl RunnerShared {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            flushing: FlushingOperation::new(name.clone()),
            name,
            inbox: Inbox::new(),
            signal: WakeSignal::new(),
            stats: RunnerStats::default(),
            lanes: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a root task. The only operation meant for foreign threads.
    pub fn submit(
        &self,
        task: Box<dyn Task>,
    ) -> SchedulerResult<()> {
        if self.flushing.is_killed() {
            warn!("runner '{}': rejected '{}' after kill", self.name, task.name());
            return Err(SchedulerError::killed(&self.name));
        }
        trace!("runner '{}': queued '{}'", self.name, task.name());
        self.inbox.push(task);
        self.signal.notify();
        Ok(())
    }

    /// Queue `task` and return a handle publishing its outcome.
    pub fn run<T: Task + 'static>(
        &self,
        task: T,
    ) -> SchedulerResult<TaskHandle> {
        let (tracked, handle) = TaskHandle::track(task);
        self.submit(Box::new(tracked))?;
        Ok(handle)
    }

    /// Whether any lane or queued submission remains.
    #[inline]
    pub fn has_tasks(&self) -> bool {
        self.lanes.load(Ordering::Acquire) > 0 || !self.inbox.is_empty()
    }

    #[inline]
    pub fn lane_count(&self) -> usize {
        self.lanes.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.flushing.is_paused()
    }

    #[inline]
    pub fn is_killed(&self) -> bool {
        self.flushing.is_killed()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn pause(&self) -> SchedulerResult<()> {
        self.lifecycle(FlushingOperation::pause)
    }

    pub fn resume(&self) -> SchedulerResult<()> {
        self.lifecycle(FlushingOperation::resume)
    }

    pub fn stop(&self) -> SchedulerResult<()> {
        self.lifecycle(FlushingOperation::stop)
    }

    pub fn flush(&self) -> SchedulerResult<()> {
        self.lifecycle(FlushingOperation::stop_and_reset)
    }

    pub fn kill(&self) -> SchedulerResult<()> {
        self.lifecycle(FlushingOperation::kill)
    }

    fn lifecycle(
        &self,
        op: fn(&FlushingOperation) -> SchedulerResult<()>,
    ) -> SchedulerResult<()> {
        op(&self.flushing)?;
        self.signal.notify();
        Ok(())
    }
}

/// A registry entry: one occupant of a lane.
struct SpawnedTask {
    task: Box<dyn Task>,
    /// Caller waiting on this occupant; `None` for a root task.
    parent: Option<SlotHandle>,
    /// Set by a child's `Break.AndStop`: finish without stepping the body again.
    terminate: bool,
    /// Final contract of the inline child that last finished in this lane.
    child_result: Option<TaskContract>,
}

impl SpawnedTask {
    fn new(
        task: Box<dyn Task>,
        parent: Option<SlotHandle>,
    ) -> Self {
        Self {
            task,
            parent,
            terminate: false,
            child_result: None,
        }
    }
}

/// How an occupant left its lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Finish {
    Completed,
    BreakAndStop,
    Faulted,
    Cancelled,
}

/// Result of stepping a lane's occupant once.
#[derive(Debug, Clone, Copy)]
enum LaneStep {
    /// The lane must be stepped again this tick (new inline child, or `Continue`).
    Again,
    Done(LaneOutcome),
}

const FINISHED: LaneStep = LaneStep::Done(LaneOutcome {
    completed: true,
    surrendered: false,
});

/// Read-only view of one lane, for introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneInfo {
    /// Registry handle of the current occupant.
    pub occupant: SlotHandle,
    /// Name of the current occupant.
    pub task: String,
    /// Number of callers waiting above the occupant (0 for a root task).
    pub depth: usize,
}

/// The scheduling engine behind every runner.
pub struct Process {
    shared: Arc<RunnerShared>,
    registry: Registry<SpawnedTask>,
    run_list: RunList,
    flow: Box<dyn FlowModifier>,
    sink: Arc<dyn DiagnosticsSink>,
    /// Where the last tick stopped early.
    cursor: usize,
}

impl fmt::Debug for Process {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Process")
            .field("runner", &self.shared.name)
            .field("lanes", &self.run_list.len())
            .field("live_slots", &self.registry.len())
            .field("flow", &self.flow)
            .field("cursor", &self.cursor)
            .finish()
    }
}

impl Process {
    /// Create a process with the standard flow and the tracing sink.
    pub fn new(shared: Arc<RunnerShared>) -> Self {
        Self::with_parts(shared, Box::new(Standard), Arc::new(TracingSink))
    }

    pub fn with_parts(
        shared: Arc<RunnerShared>,
        flow: Box<dyn FlowModifier>,
        sink: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        Self {
            shared,
            registry: Registry::new(),
            run_list: RunList::new(),
            flow,
            sink,
            cursor: 0,
        }
    }

    #[inline]
    pub fn shared(&self) -> &Arc<RunnerShared> {
        &self.shared
    }

    pub fn set_flow_modifier(
        &mut self,
        flow: Box<dyn FlowModifier>,
    ) {
        debug!("runner '{}': flow modifier -> {}", self.shared.name, flow.name());
        self.flow = flow;
        self.cursor = 0;
    }

    pub fn set_diagnostics_sink(
        &mut self,
        sink: Arc<dyn DiagnosticsSink>,
    ) {
        self.sink = sink;
    }

    #[inline]
    pub fn flow_name(&self) -> &'static str {
        self.flow.name()
    }

    /// Whether any lane or queued submission remains.
    #[inline]
    pub fn has_tasks(&self) -> bool {
        !self.run_list.is_empty() || !self.shared.inbox.is_empty()
    }

    /// Number of lanes.
    #[inline]
    pub fn lane_count(&self) -> usize {
        self.run_list.len()
    }

    /// Number of live registry slots (lanes plus waiting callers).
    #[inline]
    pub fn live_slots(&self) -> usize {
        self.registry.len()
    }

    /// Current lanes in run-list order.
    pub fn lanes(&self) -> Vec<LaneInfo> {
        self.run_list
            .iter()
            .filter_map(|occupant| {
                let slot = self.registry.get(occupant)?;
                let mut depth = 0;
                let mut parent = slot.parent;
                while let Some(p) = parent {
                    depth += 1;
                    parent = self.registry.get(p).and_then(|s| s.parent);
                }
                Some(LaneInfo {
                    occupant,
                    task: slot.task.name().to_string(),
                    depth,
                })
            })
            .collect()
    }

    /// Run one tick. Returns `false` once the runner is killed and drained.
    pub fn tick(&mut self) -> bool {
        let shared = Arc::clone(&self.shared);
        let flushing = &shared.flushing;
        RunnerStats::bump(&shared.stats.ticks);

        if flushing.is_resetting() {
            self.reset();
            flushing.finish_reset();
            self.publish_lane_count();
            return !flushing.is_killed();
        }

        if !shared.inbox.is_empty() && flushing.accepts_submissions() {
            self.admit();
        }

        if flushing.is_stopping() && self.run_list.is_empty() && !flushing.is_killed() {
            debug!("runner '{}': drained after stop", shared.name);
            flushing.finish_stopping();
        }

        if self.run_list.is_empty() {
            self.publish_lane_count();
            if flushing.is_killed() {
                let dropped = shared.inbox.clear();
                if dropped > 0 {
                    debug!("runner '{}': dropped {} queued tasks on kill", shared.name, dropped);
                }
                return false;
            }
            return true;
        }

        if flushing.is_paused() && !flushing.is_stopping() {
            return true;
        }

        RunnerStats::bump(&shared.stats.busy_ticks);
        self.run_lanes(flushing.is_stopping());
        self.publish_lane_count();
        true
    }

    fn publish_lane_count(&self) {
        self.shared.lanes.store(self.run_list.len(), Ordering::Release);
    }

    /// Turn every queued submission into a root lane.
    fn admit(&mut self) {
        // Cover the queued tasks before popping them so `has_tasks` never
        // sees an empty inbox and no lanes in between.
        self.shared
            .lanes
            .store(self.run_list.len() + self.shared.inbox.len(), Ordering::Release);
        let mut admitted = 0;
        while let Some(task) = self.shared.inbox.pop() {
            trace!("runner '{}': admitted '{}'", self.shared.name, task.name());
            let handle = self.registry.add(SpawnedTask::new(task, None));
            self.run_list.push(handle);
            admitted += 1;
        }
        RunnerStats::add(&self.shared.stats.admitted, admitted);
        self.shared.stats.update_peak_lanes(self.run_list.len());
        self.publish_lane_count();
    }

    /// Dispose every slot and queued task without running user code.
    fn reset(&mut self) {
        let mut disposed = 0;
        let sink = Arc::clone(&self.sink);
        let runner = self.shared.name.clone();
        self.registry.drain_with(|_, mut slot| {
            dispose_guarded(&mut slot.task, &*sink, &runner);
            disposed += 1;
        });
        self.run_list.clear();
        self.cursor = 0;
        let dropped = self.shared.inbox.clear();
        RunnerStats::add(&self.shared.stats.cancelled, disposed);
        debug!(
            "runner '{}': reset, disposed {} slots and {} queued tasks",
            self.shared.name, disposed, dropped
        );
    }

    /// Iterate lanes under the flow modifier.
    ///
    /// While `stopping`, every occupant reached gets a stop-requested step
    /// that is its last; a caller whose child is torn down this way gets its
    /// own last step the next time the lane is scheduled.
    fn run_lanes(
        &mut self,
        stopping: bool,
    ) {
        let positions = self.run_list.positions();
        self.flow.begin_tick();
        let mut index = self.flow.first_lane(self.cursor, positions);
        if index >= positions {
            index = 0;
        }

        let mut next_cursor = 0;
        let mut visited = 0;
        'lanes: while visited < positions {
            if self.run_list.get(index).is_some() {
                let outcome = loop {
                    if !self.flow.can_process_lane(index) {
                        next_cursor = index;
                        break 'lanes;
                    }
                    match self.step_lane(index, stopping) {
                        LaneStep::Again => continue,
                        LaneStep::Done(outcome) => break outcome,
                    }
                };

                let next = (index + 1) % positions;
                if !self.flow.can_advance(index, self.run_list.len(), outcome) {
                    next_cursor = next;
                    break 'lanes;
                }
                index = next;
            } else {
                index = (index + 1) % positions;
            }
            visited += 1;
        }

        self.cursor = self.run_list.compact(next_cursor);
        self.shared.stats.update_peak_lanes(self.run_list.len());
    }

    /// Step the occupant of lane `index` once.
    fn step_lane(
        &mut self,
        index: usize,
        stopping: bool,
    ) -> LaneStep {
        let Some(handle) = self.run_list.get(index) else {
            return FINISHED;
        };
        let shared = Arc::clone(&self.shared);

        let Some(slot) = self.registry.get_mut(handle) else {
            warn!("runner '{}': lane {} points at freed {}", shared.name, index, handle);
            self.run_list.vacate(index);
            return FINISHED;
        };

        if slot.terminate {
            trace!("runner '{}': '{}' ended by its child", shared.name, slot.task.name());
            self.finish_occupant(index, handle, Finish::Cancelled, None);
            return FINISHED;
        }

        let mut cx = StepContext::new(&shared.name, stopping, slot.child_result.take());
        let stepped = panic::catch_unwind(AssertUnwindSafe(|| slot.task.step(&mut cx)));

        let step = match stepped {
            Ok(step) => step,
            Err(payload) => {
                let fault = TaskFault::Panicked {
                    task: self.task_name(handle),
                    message: panic_message(&*payload),
                };
                self.report(&fault);
                let result = TaskContract::exception(anyhow::anyhow!(fault.to_string()));
                self.finish_occupant(index, handle, Finish::Faulted, Some(result));
                return FINISHED;
            }
        };

        if step.state == StepState::Faulted {
            let message = step
                .contract
                .as_exception()
                .map(|e| e.to_string())
                .unwrap_or_else(|| format!("faulted with {}", step.contract.kind()));
            let fault = TaskFault::Faulted {
                task: self.task_name(handle),
                message,
            };
            self.report(&fault);
            let result = match step.contract {
                c @ TaskContract::Exception(_) => c,
                other => {
                    discard_bodies(other);
                    TaskContract::exception(anyhow::anyhow!(fault.to_string()))
                }
            };
            self.finish_occupant(index, handle, Finish::Faulted, Some(result));
            return FINISHED;
        }

        if stopping {
            let finish = match step.contract.break_mode() {
                Some(BreakMode::AndStop) => Finish::BreakAndStop,
                Some(BreakMode::It) => Finish::Completed,
                None if step.state == StepState::Completed => Finish::Completed,
                None => Finish::Cancelled,
            };
            let result = match step.contract {
                body @ (TaskContract::InlineChild(_) | TaskContract::FireAndForget(_)) => {
                    discard_bodies(body);
                    None
                }
                _ if finish == Finish::Cancelled => None,
                other => Some(other),
            };
            trace!("runner '{}': lane {} stopped", shared.name, index);
            self.finish_occupant(index, handle, finish, result);
            return FINISHED;
        }

        let contract = match step.contract {
            TaskContract::InlineChild(child) => {
                trace!("runner '{}': lane {} delegates to '{}'", shared.name, index, child.name());
                let child_handle = self.registry.add(SpawnedTask::new(child, Some(handle)));
                self.run_list.set(index, child_handle);
                RunnerStats::bump(&shared.stats.inline_children);
                return LaneStep::Again;
            }
            TaskContract::FireAndForget(child) => {
                trace!("runner '{}': detached '{}'", shared.name, child.name());
                let child_handle = self.registry.add(SpawnedTask::new(child, None));
                self.run_list.push(child_handle);
                self.publish_lane_count();
                RunnerStats::bump(&shared.stats.detached);
                TaskContract::Yield
            }
            other => other,
        };

        let surrendered =
            step.state == StepState::Waiting || matches!(contract, TaskContract::Surrender);

        if step.state == StepState::Completed || contract.is_break() {
            let finish = match contract.break_mode() {
                Some(BreakMode::AndStop) => Finish::BreakAndStop,
                _ => Finish::Completed,
            };
            self.finish_occupant(index, handle, finish, Some(contract));
            return LaneStep::Done(LaneOutcome {
                completed: true,
                surrendered,
            });
        }

        if matches!(contract, TaskContract::Continue) {
            return LaneStep::Again;
        }

        LaneStep::Done(LaneOutcome {
            completed: false,
            surrendered,
        })
    }

    /// Free an occupant's slot and hand its lane back to the caller, or
    /// vacate the lane if it was a root task.
    fn finish_occupant(
        &mut self,
        index: usize,
        handle: SlotHandle,
        finish: Finish,
        result: Option<TaskContract>,
    ) {
        let Some(mut slot) = self.registry.remove_at(handle) else {
            return;
        };
        // Counters first: a dispose hook may be what another thread waits on.
        let stats = &self.shared.stats;
        match finish {
            Finish::Completed | Finish::BreakAndStop => RunnerStats::bump(&stats.completed),
            Finish::Faulted => RunnerStats::bump(&stats.faulted),
            Finish::Cancelled => RunnerStats::bump(&stats.cancelled),
        }
        dispose_guarded(&mut slot.task, &*self.sink, &self.shared.name);

        match slot.parent {
            None => self.run_list.vacate(index),
            Some(parent) => {
                self.run_list.set(index, parent);
                if let Some(caller) = self.registry.get_mut(parent) {
                    caller.child_result = result;
                    if finish == Finish::BreakAndStop {
                        caller.terminate = true;
                    }
                }
            }
        }
    }

    fn task_name(
        &self,
        handle: SlotHandle,
    ) -> String {
        self.registry
            .get(handle)
            .map(|slot| slot.task.name().to_string())
            .unwrap_or_else(|| handle.to_string())
    }

    fn report(
        &self,
        fault: &TaskFault,
    ) {
        self.sink
            .report(fault, &format!("runner '{}'", self.shared.name));
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        if !self.registry.is_empty() || !self.shared.inbox.is_empty() {
            self.reset();
            self.publish_lane_count();
        }
    }
}

/// Dispose a body, reporting a panicking `dispose` instead of unwinding.
fn dispose_guarded(
    task: &mut Box<dyn Task>,
    sink: &dyn DiagnosticsSink,
    runner: &str,
) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task.dispose())) {
        let fault = TaskFault::Panicked {
            task: task.name().to_string(),
            message: format!("dispose: {}", panic_message(&*payload)),
        };
        sink.report(&fault, &format!("runner '{}'", runner));
    }
}

/// Dispose bodies carried by a contract that will never be scheduled.
fn discard_bodies(contract: TaskContract) {
    match contract {
        TaskContract::InlineChild(mut body) | TaskContract::FireAndForget(mut body) => {
            body.dispose();
        }
        _ => {}
    }
}
