//! OS-thread baseline: one platform thread per task.
//!
//! Kept for comparison with the lightweight-task runner. Thread creation is a
//! scarce resource here, so counts should stay in the thousands.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::{RunnerError, Wake};

/// Cancellation flag the spawned threads wait on.
#[derive(Debug, Clone, Default)]
pub struct ThreadCancel {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl ThreadCancel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake every waiting thread and make later waits return immediately.
    pub fn cancel(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block the current thread for `duration` or until cancelled.
    pub fn wait(&self, duration: Duration) -> Wake {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = cvar
            .wait_timeout_while(guard, duration, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        if *guard {
            Wake::Interrupted
        } else {
            Wake::Elapsed
        }
    }
}

/// Result of an OS-thread run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadReport {
    pub spawned: usize,
    pub joined: usize,
    pub interrupted: usize,
    pub panicked: usize,
    pub elapsed: Duration,
}

/// Spawn `count` named threads (`platform-1` ...) that each wait for `sleep`,
/// then join them in order.
///
/// If a spawn fails, the threads already running are cancelled and joined
/// before the error is returned.
pub fn spawn_and_join(
    count: usize,
    sleep: Duration,
    cancel: &ThreadCancel,
) -> Result<ThreadReport, RunnerError> {
    let start = Instant::now();
    let mut handles = Vec::with_capacity(count);

    info!(threads = count, "Creating threads");
    for n in 1..=count {
        let waiter = cancel.clone();
        let spawned = thread::Builder::new()
            .name(format!("platform-{n}"))
            .spawn(move || waiter.wait(sleep));

        match spawned {
            Ok(handle) => handles.push(handle),
            Err(err) => {
                warn!(spawned = handles.len(), error = %err, "Thread spawn failed; cancelling");
                cancel.cancel();
                for handle in handles {
                    let _ = handle.join();
                }
                return Err(RunnerError::ThreadSpawn(err));
            }
        }
    }

    info!(threads = handles.len(), "Waiting for threads");
    let mut report = ThreadReport {
        spawned: handles.len(),
        ..ThreadReport::default()
    };
    for handle in handles {
        match handle.join() {
            Ok(Wake::Elapsed) => report.joined += 1,
            Ok(Wake::Interrupted) => {
                report.joined += 1;
                report.interrupted += 1;
            }
            Err(_) => report.panicked += 1,
        }
    }
    report.elapsed = start.elapsed();

    info!(
        joined = report.joined,
        interrupted = report.interrupted,
        panicked = report.panicked,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Threads finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_and_join_runs_concurrently() {
        let cancel = ThreadCancel::new();
        let report = spawn_and_join(64, Duration::from_millis(50), &cancel).unwrap();

        assert_eq!(report.spawned, 64);
        assert_eq!(report.joined, 64);
        assert_eq!(report.interrupted, 0);
        // 64 serial waits would take over three seconds.
        assert!(report.elapsed < Duration::from_secs(3));
    }

    #[test]
    fn test_zero_threads() {
        let report = spawn_and_join(0, Duration::from_secs(10), &ThreadCancel::new()).unwrap();
        assert_eq!(report.spawned, 0);
        assert_eq!(report.joined, 0);
    }

    #[test]
    fn test_cancel_wakes_waiting_threads() {
        let cancel = ThreadCancel::new();
        let trigger = cancel.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            trigger.cancel();
        });

        let report = spawn_and_join(8, Duration::from_secs(3600), &cancel).unwrap();
        canceller.join().unwrap();

        assert_eq!(report.joined, 8);
        assert_eq!(report.interrupted, 8);
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn test_wait_after_cancel_returns_immediately() {
        let cancel = ThreadCancel::new();
        cancel.cancel();
        assert_eq!(cancel.wait(Duration::from_secs(3600)), Wake::Interrupted);
    }
}
