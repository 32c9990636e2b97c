//! Live progress counters shared between a group and its tasks.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Atomic counters updated by running tasks; read by progress reporters.
#[derive(Debug, Default)]
pub struct GroupStats {
    submitted: AtomicUsize,
    running: AtomicUsize,
    finished: AtomicUsize,
}

/// Point-in-time copy of [`GroupStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub submitted: usize,
    pub running: usize,
    pub finished: usize,
}

impl StatsSnapshot {
    /// Tasks submitted but not yet admitted to run.
    pub fn queued(&self) -> usize {
        self.submitted
            .saturating_sub(self.running)
            .saturating_sub(self.finished)
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} finished, {} running, {} queued",
            self.finished,
            self.submitted,
            self.running,
            self.queued()
        )
    }
}

impl GroupStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            running: self.running.load(Ordering::Relaxed),
            finished: self.finished.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn on_submit(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_start(&self) {
        self.running.fetch_add(1, Ordering::Relaxed);
    }

    /// A task left its body, however it got there.
    pub(crate) fn on_exit(&self, was_running: bool) {
        if was_running {
            self.running.fetch_sub(1, Ordering::Relaxed);
        }
        self.finished.fetch_add(1, Ordering::Relaxed);
    }
}
