//! coflow: a cooperative task scheduler
//!
//! Many small resumable tasks multiplexed over a few threads, with a bounded
//! per-tick cost, stable lane ordering and safe cross-thread submission.
//!
//! # Example
//!
//! ```rust
//! use coflow::{from_fn, Runner, SteppableRunner, Step};
//!
//! let mut runner = SteppableRunner::new("frame");
//! let mut frames = 0;
//! runner
//!     .add(from_fn("countdown", move |_cx| {
//!         frames += 1;
//!         if frames == 3 { Step::complete() } else { Step::yield_now() }
//!     }))
//!     .unwrap();
//!
//! while runner.has_tasks() {
//!     runner.tick();
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/coflow")]
#![warn(rust_2018_idioms)]

pub mod runtime;
pub mod util;

pub use anyhow::{Context, Result};

pub use runtime::parallel::{
    CollectionTask, DataParallelCollection, ParallelJob, ParallelTaskCollection, RunnerPool,
};
pub use runtime::runner::{MultiThreadRunner, Runner, SteppableRunner, SyncRunner};
pub use runtime::scheduler::{
    from_fn, parse_flow, BreakMode, CollectingSink, DiagnosticsSink, FlowModifier, HandleState,
    Scalar, SchedulerError, SchedulerResult, Serial, Staggered, Standard, StatsSnapshot, Step,
    StepContext, StepState, Task, TaskBuilder, TaskContract, TaskFault, TaskHandle, TimeBound,
    TimeSliced, YieldN,
};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use crate::util::config::CoflowConfig;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = "coflow";

/// Outcome of [`run_demo`].
#[derive(Debug, Clone, Serialize)]
pub struct DemoReport {
    pub flow: String,
    pub tasks: usize,
    pub steps: usize,
    pub ticks: usize,
    pub stats: StatsSnapshot,
}

/// Drive `tasks` root tasks of `steps` steps each on a steppable runner
/// until it is empty. Every other task delegates half its work to an inline
/// child.
///
/// # Example
///
/// ```
/// let report = coflow::run_demo("staggered:2", 8, 1).unwrap();
/// assert_eq!(report.ticks, 4);
/// ```
pub fn run_demo(
    flow: &str,
    tasks: usize,
    steps: usize,
) -> Result<DemoReport> {
    let modifier = parse_flow(flow).with_context(|| format!("unknown flow modifier '{}'", flow))?;
    let mut runner = SteppableRunner::with_flow("demo", modifier);
    let steps = steps.max(1);

    for i in 0..tasks {
        let mut taken = 0;
        let delegate = i % 2 == 1 && steps > 1;
        runner.add(from_fn(format!("task-{}", i), move |_cx| {
            taken += 1;
            if delegate && taken == 1 {
                return Step::child(YieldN::new(steps / 2));
            }
            if taken >= steps {
                Step::complete()
            } else {
                Step::yield_now()
            }
        }))?;
    }

    let mut ticks = 0;
    while runner.has_tasks() {
        runner.tick();
        ticks += 1;
    }
    debug!("demo finished in {} ticks", ticks);

    Ok(DemoReport {
        flow: runner.flow_name().to_string(),
        tasks,
        steps,
        ticks,
        stats: runner.stats(),
    })
}

/// Outcome of [`run_parallel`].
#[derive(Debug, Clone, Serialize)]
pub struct ParallelReport {
    pub iterations: usize,
    pub runners: usize,
    pub sum: u64,
    pub expected: u64,
    pub elapsed_ms: u128,
    pub runner_stats: Vec<StatsSnapshot>,
}

/// Sum `0..iterations` with a data-parallel job over a runner pool, waiting
/// for the aggregate on a blocking runner.
pub fn run_parallel(
    config: &CoflowConfig,
    iterations: usize,
) -> Result<ParallelReport> {
    let started = Instant::now();
    let mut pool = RunnerPool::from_config("pool", &config.pool, &config.runner)?;

    let sum = Arc::new(AtomicU64::new(0));
    let acc = sum.clone();
    let mut job = DataParallelCollection::new(
        "sum",
        move |i: usize| {
            acc.fetch_add(i as u64, Ordering::Relaxed);
        },
        iterations,
    )
    .with_batch(config.pool.batch);
    let aggregate = job.start(&pool, || info!("data-parallel sum complete"))?;

    let mut waiter = SyncRunner::with_config("main", config.sync.clone());
    waiter.run_blocking(aggregate)?;
    let runner_stats = pool.stats();
    let runners = pool.len();
    pool.dispose()?;

    let n = iterations as u64;
    Ok(ParallelReport {
        iterations,
        runners,
        sum: sum.load(Ordering::Relaxed),
        expected: n.saturating_sub(1) * n / 2,
        elapsed_ms: started.elapsed().as_millis(),
        runner_stats,
    })
}
