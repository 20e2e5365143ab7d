use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use coflow::runtime::scheduler::LaneOutcome;
use coflow::{
    from_fn, FlowModifier, HandleState, MultiThreadRunner, Runner, SchedulerError, Step,
};

#[test]
fn test_runs_submitted_work() {
    let mut runner = MultiThreadRunner::spawn("worker").unwrap();
    let handle = runner.run(coflow::YieldN::new(5)).unwrap();

    assert_eq!(
        handle.wait(Duration::from_secs(5)),
        Some(HandleState::Completed)
    );
    runner.dispose().unwrap();
    assert!(!runner.is_running());
}

#[test]
fn test_parked_runner_wakes_on_submit() {
    // A park timeout far longer than the test only passes if submit unparks.
    let mut runner = MultiThreadRunner::builder("sleeper")
        .park_timeout(Duration::from_secs(30))
        .spawn()
        .unwrap();
    thread::sleep(Duration::from_millis(100));

    let started = Instant::now();
    let handle = runner
        .run(from_fn("ping", |_cx| Step::complete()))
        .unwrap();
    assert_eq!(
        handle.wait(Duration::from_secs(5)),
        Some(HandleState::Completed)
    );
    assert!(started.elapsed() < Duration::from_secs(5));

    runner.dispose().unwrap();
}

#[test]
fn test_has_tasks_during_a_slow_step() {
    let mut runner = MultiThreadRunner::spawn("slow").unwrap();
    let handle = runner
        .run(from_fn("sleepy", |_cx| {
            thread::sleep(Duration::from_millis(300));
            Step::complete()
        }))
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while handle.state() == HandleState::Pending && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(handle.state(), HandleState::Running);
    assert!(runner.has_tasks());

    assert_eq!(
        handle.wait(Duration::from_secs(5)),
        Some(HandleState::Completed)
    );
    runner.dispose().unwrap();
}

#[test]
fn test_submissions_from_many_threads() {
    let runner = Arc::new(MultiThreadRunner::spawn("shared").unwrap());
    let done = Arc::new(AtomicUsize::new(0));

    let producers: Vec<_> = (0..4)
        .map(|_| {
            let runner = runner.clone();
            let done = done.clone();
            thread::spawn(move || {
                for _ in 0..25 {
                    let done = done.clone();
                    runner
                        .add(from_fn("count", move |_cx| {
                            done.fetch_add(1, Ordering::SeqCst);
                            Step::complete()
                        }))
                        .unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    while runner.stats().completed < 100 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(runner.stats().completed, 100);
    assert_eq!(done.load(Ordering::SeqCst), 100);
}

#[test]
fn test_submit_after_dispose_is_rejected() {
    let mut runner = MultiThreadRunner::spawn("closed").unwrap();
    runner.dispose().unwrap();

    assert!(runner.is_killed());
    let err = runner
        .add(from_fn("late", |_cx| Step::complete()))
        .unwrap_err();
    assert!(matches!(err, SchedulerError::Killed { .. }));

    // Disposing twice is fine.
    runner.dispose().unwrap();
}

#[test]
fn test_dispose_cancels_running_work() {
    let mut runner = MultiThreadRunner::spawn("endless").unwrap();
    let handle = runner
        .run(from_fn("spin", |_cx| Step::yield_now()))
        .unwrap();
    thread::sleep(Duration::from_millis(20));

    runner.dispose().unwrap();
    assert_eq!(handle.state(), HandleState::Cancelled);
}

#[test]
fn test_pause_and_resume() {
    let mut runner = MultiThreadRunner::spawn("pausable").unwrap();
    let steps = Arc::new(AtomicUsize::new(0));
    let counter = steps.clone();
    runner.pause().unwrap();
    runner
        .add(from_fn("tick", move |_cx| {
            counter.fetch_add(1, Ordering::SeqCst);
            Step::yield_now()
        }))
        .unwrap();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(steps.load(Ordering::SeqCst), 0);

    runner.resume().unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while steps.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    assert!(steps.load(Ordering::SeqCst) > 0);
    runner.dispose().unwrap();
}

#[derive(Debug)]
struct Exploding;

impl FlowModifier for Exploding {
    fn can_process_lane(
        &mut self,
        _index: usize,
    ) -> bool {
        panic!("flow modifier exploded");
    }

    fn can_advance(
        &mut self,
        _index: usize,
        _lane_count: usize,
        _outcome: LaneOutcome,
    ) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "exploding"
    }
}

#[test]
fn test_loop_panic_surfaces_on_dispose() {
    let mut runner = MultiThreadRunner::builder("doomed")
        .flow(Box::new(Exploding))
        .spawn()
        .unwrap();
    runner.add(coflow::YieldN::new(1)).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while runner.is_running() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert!(runner.is_killed());

    match runner.dispose() {
        Err(SchedulerError::RunnerPanicked { runner, message }) => {
            assert_eq!(runner, "doomed");
            assert!(message.contains("exploded"));
        }
        other => panic!("expected RunnerPanicked, got {:?}", other),
    }
}
