//! Lifecycle flag tests

use crate::runtime::scheduler::error::SchedulerError;
use crate::runtime::scheduler::flushing::FlushingOperation;
use quickcheck::{quickcheck, TestResult};

#[test]
fn test_pause_resume() {
    let op = FlushingOperation::new("main");
    assert!(op.accepts_submissions());
    op.pause().unwrap();
    assert!(op.is_paused());
    assert!(!op.accepts_submissions());
    op.resume().unwrap();
    assert!(!op.is_paused());
    assert!(op.accepts_submissions());
}

#[test]
fn test_stop_clears_pause() {
    let op = FlushingOperation::new("main");
    op.pause().unwrap();
    op.stop().unwrap();
    assert!(op.is_stopping());
    assert!(!op.is_paused());

    op.finish_stopping();
    assert!(!op.is_stopping());
    assert!(op.accepts_submissions());
}

#[test]
fn test_kill_is_terminal() {
    let op = FlushingOperation::new("main");
    op.kill().unwrap();
    assert!(op.is_killed());
    assert!(op.is_stopping());

    op.finish_stopping();
    assert!(op.is_stopping());
    assert!(matches!(op.resume(), Err(SchedulerError::Killed { .. })));
    assert!(matches!(op.kill(), Err(SchedulerError::Killed { .. })));
}

#[test]
fn test_reset_finishes_stop() {
    let op = FlushingOperation::new("main");
    op.stop_and_reset().unwrap();
    assert!(op.is_resetting());
    assert!(op.is_stopping());

    op.finish_reset();
    assert!(!op.is_resetting());
    assert!(!op.is_stopping());
}

/// Apply an arbitrary sequence of lifecycle calls and check the invariants
/// after each one.
fn lifecycle_invariants_hold(ops: Vec<u8>) -> TestResult {
    let op = FlushingOperation::new("prop");
    let mut killed = false;

    for code in ops {
        let result = match code % 7 {
            0 => op.pause(),
            1 => op.resume(),
            2 => op.stop(),
            3 => op.stop_and_reset(),
            4 => op.kill(),
            5 => {
                op.finish_stopping();
                Ok(())
            }
            _ => {
                op.finish_reset();
                Ok(())
            }
        };

        if killed && code % 7 < 5 && result.is_ok() {
            return TestResult::failed();
        }
        if op.is_killed() {
            killed = true;
        }
        if op.is_killed() && !op.is_stopping() {
            return TestResult::failed();
        }
        if op.accepts_submissions() && (op.is_paused() || op.is_stopping() || op.is_killed()) {
            return TestResult::failed();
        }
    }
    TestResult::passed()
}

#[test]
fn quickcheck_lifecycle_invariants() {
    quickcheck(lifecycle_invariants_hold as fn(Vec<u8>) -> TestResult);
}
