//! Cross-thread submission queue.
//!
//! Any number of producers push boxed task bodies; the runner's owning thread
//! is the only consumer. Pushing releases a wake signal so a parked runner
//! thread resumes promptly.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, Thread};
use std::time::Duration;

use crossbeam::queue::SegQueue;
use once_cell::sync::OnceCell;

use super::task::Task;

/// Lock-free multi-producer hand-off of new root tasks.
pub struct Inbox {
    queue: SegQueue<Box<dyn Task>>,
    pushed: AtomicUsize,
}

impl fmt::Debug for Inbox {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Inbox")
            .field("len", &self.queue.len())
            .field("pushed", &self.pushed.load(Ordering::Relaxed))
            .finish()
    }
}

impl Inbox {
    #[inline]
    pub fn new() -> Self {
        Self {
            queue: SegQueue::new(),
            pushed: AtomicUsize::new(0),
        }
    }

    /// Enqueue a task. Safe from any thread.
    #[inline]
    pub fn push(
        &self,
        task: Box<dyn Task>,
    ) {
        self.queue.push(task);
        self.pushed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn pop(&self) -> Option<Box<dyn Task>> {
        self.queue.pop()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Total tasks ever pushed.
    #[inline]
    pub fn pushed(&self) -> usize {
        self.pushed.load(Ordering::Relaxed)
    }

    /// Drop every queued task, disposing each. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut dropped = 0;
        while let Some(mut task) = self.queue.pop() {
            task.dispose();
            dropped += 1;
        }
        dropped
    }
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new()
    }
}

/// Release-style wake-up for a parked runner thread.
///
/// The flag is set before unparking, and the sleeper clears it before
/// checking for work, so a notification between the check and the park is
/// never lost: `park` returns immediately on a pending unpark token.
#[derive(Debug, Default)]
pub struct WakeSignal {
    notified: AtomicBool,
    sleeper: OnceCell<Thread>,
}

impl WakeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the calling thread as the one to wake. First caller wins.
    pub fn register_current(&self) {
        let _ = self.sleeper.set(thread::current());
    }

    /// Wake the sleeper, if any.
    pub fn notify(&self) {
        if !self.notified.swap(true, Ordering::Release) {
            if let Some(sleeper) = self.sleeper.get() {
                sleeper.unpark();
            }
        }
    }

    /// Consume a pending notification.
    #[inline]
    pub fn take(&self) -> bool {
        self.notified.swap(false, Ordering::Acquire)
    }

    /// Park for at most `timeout` unless a notification is already pending.
    /// Returns whether a notification was consumed.
    pub fn wait(
        &self,
        timeout: Duration,
    ) -> bool {
        if self.take() {
            return true;
        }
        thread::park_timeout(timeout);
        self.take()
    }
}
