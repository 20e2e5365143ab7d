use std::time::Duration;

use coflow::util::config::SyncConfig;
use coflow::{
    from_fn, MultiThreadRunner, Runner, Scalar, SchedulerError, Step, SyncRunner, TaskContract,
    YieldN,
};

#[test]
fn test_run_blocking_returns_final_contract() {
    let mut runner = SyncRunner::new("main");
    let mut n = 0i64;
    let result = runner
        .run_blocking(from_fn("sum", move |_cx| {
            n += 1;
            if n == 4 {
                Step::complete_with(TaskContract::value(n * 10))
            } else {
                Step::yield_now()
            }
        }))
        .unwrap();

    let value = result.and_then(|c| c.as_value());
    assert_eq!(value, Some(Scalar::from(40i64)));
    assert!(!runner.has_tasks());
}

#[test]
fn test_drain_times_out_and_keeps_work() {
    let mut runner = SyncRunner::new("stuck");
    runner
        .add(from_fn("forever", |_cx| Step::yield_now()))
        .unwrap();

    let err = runner.drain(Duration::from_millis(20)).unwrap_err();
    match err {
        SchedulerError::Timeout { runner: name, timeout } => {
            assert_eq!(name, "stuck");
            assert_eq!(timeout, Duration::from_millis(20));
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert!(runner.has_tasks());

    runner.flush().unwrap();
    runner.drain(Duration::from_secs(1)).unwrap();
    assert!(!runner.has_tasks());
}

#[test]
fn test_drain_uses_configured_timeout() {
    let mut runner = SyncRunner::with_config("short", SyncConfig { timeout_ms: 10 });
    runner
        .add(from_fn("forever", |_cx| Step::yield_now()))
        .unwrap();

    assert!(matches!(
        runner.drain_default(),
        Err(SchedulerError::Timeout { .. })
    ));
}

#[test]
fn test_waits_on_work_from_another_runner() {
    let mut worker = MultiThreadRunner::spawn("worker").unwrap();
    let handle = worker
        .run(from_fn("answer", |_cx| {
            Step::complete_with(TaskContract::value(42i64))
        }))
        .unwrap();

    let mut main = SyncRunner::new("main");
    let result = main.run_blocking(handle.continuation()).unwrap();
    assert_eq!(result.and_then(|c| c.as_value()), Some(Scalar::from(42i64)));

    worker.dispose().unwrap();
}

#[test]
fn test_dispose_rejects_further_work() {
    let mut runner = SyncRunner::new("gone");
    runner.add(YieldN::new(10)).unwrap();
    runner.dispose().unwrap();

    assert!(!runner.has_tasks());
    assert!(matches!(
        runner.add(YieldN::new(1)),
        Err(SchedulerError::Killed { .. })
    ));
}
