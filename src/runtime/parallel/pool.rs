//! Fixed pool of dedicated-thread runners.

use tracing::debug;

use crate::runtime::runner::{MultiThreadRunner, Runner};
use crate::runtime::scheduler::{SchedulerError, SchedulerResult, StatsSnapshot};
use crate::util::config::{MultiThreadConfig, PoolConfig};

#[derive(Debug)]
pub struct RunnerPool {
    name: String,
    runners: Vec<MultiThreadRunner>,
}

impl RunnerPool {
    /// Spawn `size` runners named `{name}-{i}`.
    pub fn new(
        name: impl Into<String>,
        size: usize,
        config: &MultiThreadConfig,
    ) -> SchedulerResult<Self> {
        if size == 0 {
            return Err(SchedulerError::InvalidPoolSize(size));
        }
        let name = name.into();
        let runners = (0..size)
            .map(|i| {
                MultiThreadRunner::builder(format!("{}-{}", name, i))
                    .config(config.clone())
                    .spawn()
            })
            .collect::<SchedulerResult<Vec<_>>>()?;
        debug!("pool '{}': {} runners", name, size);
        Ok(Self { name, runners })
    }

    /// Size from `pool`, or available parallelism.
    pub fn from_config(
        name: impl Into<String>,
        pool: &PoolConfig,
        runner: &MultiThreadConfig,
    ) -> SchedulerResult<Self> {
        Self::new(name, pool.resolved_size(), runner)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.runners.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }

    #[inline]
    pub fn get(
        &self,
        index: usize,
    ) -> Option<&MultiThreadRunner> {
        self.runners.get(index)
    }

    /// Runner for the `n`-th piece of work, round-robin.
    #[inline]
    pub fn runner_for(
        &self,
        n: usize,
    ) -> &MultiThreadRunner {
        &self.runners[n % self.runners.len()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &MultiThreadRunner> {
        self.runners.iter()
    }

    /// Whether any runner still has work.
    pub fn has_tasks(&self) -> bool {
        self.runners.iter().any(|r| r.has_tasks())
    }

    pub fn stats(&self) -> Vec<StatsSnapshot> {
        self.runners.iter().map(|r| r.stats()).collect()
    }

    /// Dispose every runner. Returns the first failure after trying all.
    pub fn dispose(&mut self) -> SchedulerResult<()> {
        let mut first_err = None;
        for runner in &mut self.runners {
            if let Err(err) = runner.dispose() {
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}
