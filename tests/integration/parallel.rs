use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use coflow::util::config::{CoflowConfig, MultiThreadConfig};
use coflow::{
    from_fn, DataParallelCollection, ParallelTaskCollection, RunnerPool, SchedulerError, Step,
    SyncRunner, YieldN,
};

fn pool(size: usize) -> RunnerPool {
    RunnerPool::new("test-pool", size, &MultiThreadConfig::default()).unwrap()
}

#[test]
fn test_pool_rejects_zero_runners() {
    let err = RunnerPool::new("empty", 0, &MultiThreadConfig::default()).unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidPoolSize(0)));
}

#[test]
fn test_pool_names_runners_by_index() {
    let mut pool = pool(3);
    let names: Vec<_> = pool.iter().map(|r| coflow::Runner::name(r).to_string()).collect();
    assert_eq!(names, vec!["test-pool-0", "test-pool-1", "test-pool-2"]);
    assert_eq!(
        coflow::Runner::name(pool.runner_for(4)),
        "test-pool-1"
    );
    pool.dispose().unwrap();
}

#[test]
fn test_collection_completes_after_every_body() {
    let mut pool = pool(2);
    let finished = Arc::new(AtomicUsize::new(0));
    let callback = Arc::new(AtomicBool::new(false));

    let mut collection = ParallelTaskCollection::new("bodies");
    for i in 0..6 {
        let finished = finished.clone();
        let mut left = i;
        collection
            .add(from_fn(format!("body-{}", i), move |_cx| {
                if left == 0 {
                    finished.fetch_add(1, Ordering::SeqCst);
                    return Step::complete();
                }
                left -= 1;
                Step::yield_now()
            }))
            .unwrap();
    }
    assert_eq!(collection.pending(), 6);

    let hook = callback.clone();
    let aggregate = collection
        .start(&pool, move || hook.store(true, Ordering::SeqCst))
        .unwrap();
    assert!(collection.is_started());

    let mut main = SyncRunner::new("main");
    main.run_blocking(aggregate).unwrap();

    assert_eq!(finished.load(Ordering::SeqCst), 6);
    assert!(callback.load(Ordering::SeqCst));
    assert!(collection.is_complete());
    pool.dispose().unwrap();
}

#[test]
fn test_collection_counts_faulted_bodies() {
    let mut pool = pool(2);
    let mut collection = ParallelTaskCollection::new("mixed");
    collection.add(YieldN::new(2)).unwrap();
    collection
        .add(from_fn("bad", |_cx| Step::fault(anyhow::anyhow!("nope"))))
        .unwrap();
    collection
        .add(from_fn("worse", |_cx| -> Step { panic!("boom") }))
        .unwrap();

    let aggregate = collection.start(&pool, || {}).unwrap();
    SyncRunner::new("main").run_blocking(aggregate).unwrap();

    assert_eq!(collection.pending(), 0);
    let faulted: usize = pool.stats().iter().map(|s| s.faulted).sum();
    assert_eq!(faulted, 2);
    pool.dispose().unwrap();
}

#[test]
fn test_collection_rejects_restart_and_late_adds() {
    let mut pool = pool(1);
    let mut collection = ParallelTaskCollection::new("once");

    assert!(matches!(
        collection.start(&pool, || {}),
        Err(SchedulerError::NothingToStart { .. })
    ));

    collection.add(YieldN::new(1)).unwrap();
    let aggregate = collection.start(&pool, || {}).unwrap();

    assert!(matches!(
        collection.start(&pool, || {}),
        Err(SchedulerError::AlreadyStarted { .. })
    ));
    assert!(matches!(
        collection.add(YieldN::new(1)),
        Err(SchedulerError::AlreadyStarted { .. })
    ));

    SyncRunner::new("main").run_blocking(aggregate).unwrap();
    pool.dispose().unwrap();
}

#[test]
fn test_data_parallel_visits_every_index_once() {
    let mut pool = pool(3);
    let sum = Arc::new(AtomicU64::new(0));
    let hits = Arc::new(AtomicUsize::new(0));

    let (acc, count) = (sum.clone(), hits.clone());
    let mut job = DataParallelCollection::new(
        "sum",
        move |i: usize| {
            acc.fetch_add(i as u64, Ordering::Relaxed);
            count.fetch_add(1, Ordering::Relaxed);
        },
        10_001,
    )
    .with_batch(100);

    let aggregate = job.start(&pool, || {}).unwrap();
    let mut main = SyncRunner::new("main");
    coflow::Runner::add(&main, aggregate).unwrap();
    main.drain(Duration::from_secs(10)).unwrap();

    assert_eq!(hits.load(Ordering::Relaxed), 10_001);
    assert_eq!(sum.load(Ordering::Relaxed), 10_000 * 10_001 / 2);
    assert!(matches!(
        job.start(&pool, || {}),
        Err(SchedulerError::AlreadyStarted { .. })
    ));
    pool.dispose().unwrap();
}

#[test]
fn test_run_parallel_report() {
    let mut config = CoflowConfig::default();
    config.pool.size = Some(2);
    config.pool.batch = 512;

    let report = coflow::run_parallel(&config, 50_000).unwrap();
    assert_eq!(report.runners, 2);
    assert_eq!(report.sum, report.expected);
    assert_eq!(report.runner_stats.len(), 2);
}

#[test]
fn test_run_demo_drains() {
    let report = coflow::run_demo("standard", 4, 3).unwrap();
    assert!(report.ticks >= 3);
    assert_eq!(report.stats.completed, 6);
    assert_eq!(report.stats.inline_children, 2);

    assert!(coflow::run_demo("sideways", 1, 1).is_err());
}
