//! Runner lifecycle state machine.
//!
//! Four flags packed into one atomic byte so lifecycle calls from any thread
//! are observed by the owning thread without locks. Invariants:
//! `killed => stopping`, nothing succeeds once killed, and submissions are
//! admitted only while no flag but `resetting` is set.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::debug;

use super::error::{SchedulerError, SchedulerResult};

const PAUSED: u8 = 1 << 0;
const STOPPING: u8 = 1 << 1;
const KILLED: u8 = 1 << 2;
const RESETTING: u8 = 1 << 3;

/// Shared lifecycle state of one runner.
pub struct FlushingOperation {
    runner: String,
    bits: AtomicU8,
}

impl fmt::Debug for FlushingOperation {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("FlushingOperation")
            .field("runner", &self.runner)
            .field("paused", &self.is_paused())
            .field("stopping", &self.is_stopping())
            .field("killed", &self.is_killed())
            .field("resetting", &self.is_resetting())
            .finish()
    }
}

impl FlushingOperation {
    pub fn new(runner: impl Into<String>) -> Self {
        Self {
            runner: runner.into(),
            bits: AtomicU8::new(0),
        }
    }

    /// Apply `f` to the flags unless the operation is already killed.
    fn transition(
        &self,
        op: &str,
        f: impl Fn(u8) -> u8,
    ) -> SchedulerResult<()> {
        let mut current = self.bits.load(Ordering::Acquire);
        loop {
            if current & KILLED != 0 {
                return Err(SchedulerError::killed(&self.runner));
            }
            match self.bits.compare_exchange_weak(
                current,
                f(current),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    debug!("runner '{}': {}", self.runner, op);
                    return Ok(());
                }
                Err(actual) => current = actual,
            }
        }
    }

    pub fn pause(&self) -> SchedulerResult<()> {
        self.transition("pause", |b| b | PAUSED)
    }

    pub fn resume(&self) -> SchedulerResult<()> {
        self.transition("resume", |b| b & !PAUSED)
    }

    /// Request that every lane be torn down. Queued submissions are kept.
    pub fn stop(&self) -> SchedulerResult<()> {
        self.transition("stop", |b| (b | STOPPING) & !PAUSED)
    }

    /// Stop and hard-clear all runner state on the next tick.
    pub fn stop_and_reset(&self) -> SchedulerResult<()> {
        self.transition("stop and reset", |b| (b | STOPPING | RESETTING) & !PAUSED)
    }

    /// Terminal: stop and refuse everything from now on.
    pub fn kill(&self) -> SchedulerResult<()> {
        self.transition("kill", |b| (b | STOPPING | KILLED) & !PAUSED)
    }

    /// The run list drained after a stop; accept work again.
    pub(crate) fn finish_stopping(&self) {
        let _ = self
            .bits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |b| {
                if b & KILLED != 0 {
                    None
                } else {
                    Some(b & !STOPPING)
                }
            });
    }

    /// A reset was carried out.
    pub(crate) fn finish_reset(&self) {
        let _ = self
            .bits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |b| {
                if b & KILLED != 0 {
                    Some(b & !RESETTING)
                } else {
                    Some(b & !(RESETTING | STOPPING))
                }
            });
    }

    #[inline]
    fn flags(&self) -> u8 {
        self.bits.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.flags() & PAUSED != 0
    }

    #[inline]
    pub fn is_stopping(&self) -> bool {
        self.flags() & STOPPING != 0
    }

    #[inline]
    pub fn is_killed(&self) -> bool {
        self.flags() & KILLED != 0
    }

    #[inline]
    pub fn is_resetting(&self) -> bool {
        self.flags() & RESETTING != 0
    }

    /// Whether queued submissions may be admitted now.
    #[inline]
    pub fn accepts_submissions(&self) -> bool {
        self.flags() & (PAUSED | STOPPING | KILLED) == 0
    }

    #[inline]
    pub fn runner(&self) -> &str {
        &self.runner
    }
}
