//! Independent bodies fanned out across a pool.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::debug;

use super::pool::RunnerPool;
use crate::runtime::runner::Runner;
use crate::runtime::scheduler::{SchedulerError, SchedulerResult, Step, StepContext, Task};

type CompletionHook = Box<dyn FnOnce() + Send>;

/// Bodies added before `start`, dispatched round-robin over a pool.
pub struct ParallelTaskCollection {
    name: String,
    bodies: Vec<Box<dyn Task>>,
    remaining: Option<Arc<AtomicUsize>>,
}

impl fmt::Debug for ParallelTaskCollection {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ParallelTaskCollection")
            .field("name", &self.name)
            .field("queued", &self.bodies.len())
            .field("pending", &self.pending())
            .finish()
    }
}

impl ParallelTaskCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bodies: Vec::new(),
            remaining: None,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_started(&self) -> bool {
        self.remaining.is_some()
    }

    /// Add a body. Rejected once the collection has started.
    pub fn add<T: Task + 'static>(
        &mut self,
        task: T,
    ) -> SchedulerResult<()> {
        self.add_boxed(Box::new(task))
    }

    pub fn add_boxed(
        &mut self,
        task: Box<dyn Task>,
    ) -> SchedulerResult<()> {
        if self.is_started() {
            return Err(SchedulerError::AlreadyStarted {
                name: self.name.clone(),
            });
        }
        self.bodies.push(task);
        Ok(())
    }

    /// Bodies not yet finished. Before `start`, the number added.
    pub fn pending(&self) -> usize {
        match &self.remaining {
            Some(remaining) => remaining.load(Ordering::Acquire),
            None => self.bodies.len(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.remaining
            .as_ref()
            .map(|r| r.load(Ordering::Acquire) == 0)
            .unwrap_or(false)
    }

    /// Dispatch every body, the `n`-th to runner `n % pool.len()`.
    ///
    /// The returned task stays running until every body has left its runner
    /// (completed, faulted or cancelled), then calls `on_complete` once and
    /// completes.
    pub fn start(
        &mut self,
        pool: &RunnerPool,
        on_complete: impl FnOnce() + Send + 'static,
    ) -> SchedulerResult<CollectionTask> {
        if self.is_started() {
            return Err(SchedulerError::AlreadyStarted {
                name: self.name.clone(),
            });
        }
        if self.bodies.is_empty() {
            return Err(SchedulerError::NothingToStart {
                name: self.name.clone(),
            });
        }

        let remaining = Arc::new(AtomicUsize::new(self.bodies.len()));
        self.remaining = Some(remaining.clone());
        debug!(
            "collection '{}': dispatching {} bodies over {} runners",
            self.name,
            self.bodies.len(),
            pool.len()
        );

        // Wrap everything first so bodies left over after a failed submit
        // still count out when dropped.
        let counted: Vec<Counted> = self
            .bodies
            .drain(..)
            .map(|inner| Counted {
                inner,
                remaining: remaining.clone(),
                counted: false,
            })
            .collect();
        for (n, body) in counted.into_iter().enumerate() {
            pool.runner_for(n).submit(Box::new(body))?;
        }

        Ok(CollectionTask::new(
            self.name.clone(),
            remaining,
            Box::new(on_complete),
        ))
    }
}

/// Wrapper that counts a body out when it leaves its runner.
struct Counted {
    inner: Box<dyn Task>,
    remaining: Arc<AtomicUsize>,
    counted: bool,
}

impl Counted {
    fn count_out(&mut self) {
        if !self.counted {
            self.counted = true;
            self.remaining.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

impl Task for Counted {
    fn step(
        &mut self,
        cx: &mut StepContext<'_>,
    ) -> Step {
        self.inner.step(cx)
    }

    fn dispose(&mut self) {
        self.inner.dispose();
        self.count_out();
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

impl Drop for Counted {
    // A body rejected at submission is dropped without being disposed.
    fn drop(&mut self) {
        self.count_out();
    }
}

/// Aggregate of a started collection.
///
/// Run it on any runner (or step it by hand); it completes once every body
/// has finished.
pub struct CollectionTask {
    name: String,
    remaining: Arc<AtomicUsize>,
    on_complete: Option<CompletionHook>,
}

impl fmt::Debug for CollectionTask {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("CollectionTask")
            .field("name", &self.name)
            .field("pending", &self.pending())
            .finish()
    }
}

impl CollectionTask {
    pub(crate) fn new(
        name: String,
        remaining: Arc<AtomicUsize>,
        on_complete: CompletionHook,
    ) -> Self {
        Self {
            name,
            remaining,
            on_complete: Some(on_complete),
        }
    }

    #[inline]
    pub fn pending(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.pending() == 0
    }
}

impl Task for CollectionTask {
    fn step(
        &mut self,
        _cx: &mut StepContext<'_>,
    ) -> Step {
        if !self.is_complete() {
            return Step::yield_now();
        }
        if let Some(hook) = self.on_complete.take() {
            debug!("collection '{}': complete", self.name);
            hook();
        }
        Step::complete()
    }

    fn name(&self) -> &str {
        &self.name
    }
}
