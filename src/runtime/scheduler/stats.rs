//! Per-runner counters.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

/// Runner statistics, updated by the owning thread and readable from anywhere.
#[derive(Debug, Default)]
pub struct RunnerStats {
    /// Ticks that ran at least one lane.
    pub busy_ticks: AtomicUsize,
    /// Ticks in total.
    pub ticks: AtomicUsize,
    /// Root tasks admitted from the submission queue.
    pub admitted: AtomicUsize,
    /// Occupants that completed normally.
    pub completed: AtomicUsize,
    /// Occupants that faulted.
    pub faulted: AtomicUsize,
    /// Occupants torn down by stop, reset or kill.
    pub cancelled: AtomicUsize,
    /// Inline children spliced into a lane.
    pub inline_children: AtomicUsize,
    /// Fire-and-forget children dispatched as new lanes.
    pub detached: AtomicUsize,
    /// Peak number of lanes.
    pub peak_lanes: AtomicUsize,
}

impl RunnerStats {
    #[inline]
    pub(crate) fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add(
        counter: &AtomicUsize,
        n: usize,
    ) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Update peak lane count.
    #[inline]
    pub(crate) fn update_peak_lanes(
        &self,
        current: usize,
    ) {
        self.peak_lanes.fetch_max(current, Ordering::Relaxed);
    }

    /// Plain copy of every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |c: &AtomicUsize| c.load(Ordering::Relaxed);
        StatsSnapshot {
            ticks: load(&self.ticks),
            busy_ticks: load(&self.busy_ticks),
            admitted: load(&self.admitted),
            completed: load(&self.completed),
            faulted: load(&self.faulted),
            cancelled: load(&self.cancelled),
            inline_children: load(&self.inline_children),
            detached: load(&self.detached),
            peak_lanes: load(&self.peak_lanes),
        }
    }
}

/// Serializable copy of [`RunnerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub ticks: usize,
    pub busy_ticks: usize,
    pub admitted: usize,
    pub completed: usize,
    pub faulted: usize,
    pub cancelled: usize,
    pub inline_children: usize,
    pub detached: usize,
    pub peak_lanes: usize,
}
