//! One job body split by iteration index across a pool.

use std::ops::Range;
use std::sync::Arc;

use tracing::debug;

use super::collection::{CollectionTask, ParallelTaskCollection};
use super::pool::RunnerPool;
use crate::runtime::scheduler::{SchedulerError, SchedulerResult, Step, StepContext, Task};

/// Work addressed by iteration index. Called concurrently from pool threads.
pub trait ParallelJob: Send + Sync + 'static {
    fn update(
        &self,
        index: usize,
    );
}

impl<F> ParallelJob for F
where
    F: Fn(usize) + Send + Sync + 'static,
{
    fn update(
        &self,
        index: usize,
    ) {
        self(index)
    }
}

const DEFAULT_BATCH: usize = 64;

/// Runs `job.update(i)` for every `i` in `0..iterations`, spread over a pool.
///
/// The range is cut into one equal slice per runner plus a remainder slice;
/// each slice runs `batch` iterations per step so its runner stays
/// responsive to other lanes.
pub struct DataParallelCollection<J> {
    name: String,
    job: Arc<J>,
    iterations: usize,
    batch: usize,
    started: bool,
}

impl<J: ParallelJob> DataParallelCollection<J> {
    pub fn new(
        name: impl Into<String>,
        job: J,
        iterations: usize,
    ) -> Self {
        Self {
            name: name.into(),
            job: Arc::new(job),
            iterations,
            batch: DEFAULT_BATCH,
            started: false,
        }
    }

    /// Iterations per step, at least one.
    pub fn with_batch(
        mut self,
        batch: usize,
    ) -> Self {
        self.batch = batch.max(1);
        self
    }

    #[inline]
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    #[inline]
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Split `0..iterations` into `lanes` equal ranges plus the remainder.
    pub fn slices(
        iterations: usize,
        lanes: usize,
    ) -> Vec<Range<usize>> {
        let lanes = lanes.max(1);
        let per_lane = iterations / lanes;
        let mut slices = Vec::with_capacity(lanes + 1);
        if per_lane > 0 {
            slices.extend((0..lanes).map(|i| i * per_lane..(i + 1) * per_lane));
        }
        let covered = per_lane * lanes;
        if covered < iterations {
            slices.push(covered..iterations);
        }
        slices
    }

    pub fn start(
        &mut self,
        pool: &RunnerPool,
        on_complete: impl FnOnce() + Send + 'static,
    ) -> SchedulerResult<CollectionTask> {
        if self.started {
            return Err(SchedulerError::AlreadyStarted {
                name: self.name.clone(),
            });
        }
        if self.iterations == 0 {
            return Err(SchedulerError::NothingToStart {
                name: self.name.clone(),
            });
        }
        self.started = true;

        let slices = Self::slices(self.iterations, pool.len());
        debug!(
            "data-parallel '{}': {} iterations in {} slices",
            self.name,
            self.iterations,
            slices.len()
        );

        let mut collection = ParallelTaskCollection::new(self.name.clone());
        for range in slices {
            collection.add(JobSlice {
                job: self.job.clone(),
                range,
                batch: self.batch,
            })?;
        }
        collection.start(pool, on_complete)
    }
}

/// One slice of a data-parallel job.
struct JobSlice<J> {
    job: Arc<J>,
    range: Range<usize>,
    batch: usize,
}

impl<J: ParallelJob> Task for JobSlice<J> {
    fn step(
        &mut self,
        _cx: &mut StepContext<'_>,
    ) -> Step {
        let end = (self.range.start + self.batch).min(self.range.end);
        for index in self.range.start..end {
            self.job.update(index);
        }
        self.range.start = end;

        if self.range.is_empty() {
            Step::complete()
        } else {
            Step::yield_now()
        }
    }

    fn name(&self) -> &str {
        "job-slice"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Noop = fn(usize);

    #[test]
    fn test_slices_even_split() {
        let slices = DataParallelCollection::<Noop>::slices(12, 4);
        assert_eq!(slices, vec![0..3, 3..6, 6..9, 9..12]);
    }

    #[test]
    fn test_slices_remainder_lane() {
        let slices = DataParallelCollection::<Noop>::slices(10, 4);
        assert_eq!(slices, vec![0..2, 2..4, 4..6, 6..8, 8..10]);
    }

    #[test]
    fn test_slices_fewer_iterations_than_lanes() {
        let slices = DataParallelCollection::<Noop>::slices(3, 8);
        assert_eq!(slices, vec![0..3]);
    }

    #[test]
    fn test_job_slice_runs_in_batches() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let job = move |_i: usize| {
            counter.fetch_add(1, Ordering::SeqCst);
        };
        let mut slice = JobSlice {
            job: Arc::new(job),
            range: 0..5,
            batch: 2,
        };
        let mut cx = StepContext::detached();

        assert_eq!(slice.step(&mut cx).state, crate::runtime::scheduler::StepState::Running);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        slice.step(&mut cx);
        let last = slice.step(&mut cx);
        assert_eq!(last.state, crate::runtime::scheduler::StepState::Completed);
        assert_eq!(hits.load(Ordering::SeqCst), 5);
    }
}
