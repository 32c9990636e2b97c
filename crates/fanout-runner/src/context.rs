//! Per-task context: identity plus the cooperative cancellation signal.

use std::time::Duration;

use fanout_core::{TaskError, TaskId};
use tokio_util::sync::CancellationToken;

/// How a [`TaskContext::sleep`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// The full duration elapsed.
    Elapsed,
    /// Cancellation was requested before or during the wait.
    Interrupted,
}

/// Handed to every task body by its group.
///
/// Cancellation is cooperative: the group only sets the token, and the task
/// notices it at its next [`sleep`](Self::sleep) or
/// [`checkpoint`](Self::checkpoint).
#[derive(Debug)]
pub struct TaskContext {
    id: TaskId,
    cancel: CancellationToken,
    interrupted: bool,
}

impl TaskContext {
    pub fn new(id: TaskId, cancel: CancellationToken) -> Self {
        Self {
            id,
            cancel,
            interrupted: false,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Whether this task has already swallowed an interruption.
    pub fn interrupted(&self) -> bool {
        self.interrupted
    }

    /// Whether cancellation has been requested for this task.
    pub fn is_cancelled(&self) -> bool {
        self.interrupted || self.cancel.is_cancelled()
    }

    /// Suspend for `duration`, waking early if the group is cancelled.
    ///
    /// An interruption never fails the task; it is recorded in
    /// [`interrupted`](Self::interrupted) for the body to act on.
    pub async fn sleep(&mut self, duration: Duration) -> Wake {
        if self.is_cancelled() {
            self.interrupted = true;
            return Wake::Interrupted;
        }

        let cancelled = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => true,
            _ = tokio::time::sleep(duration) => false,
        };

        if cancelled {
            self.interrupted = true;
            Wake::Interrupted
        } else {
            Wake::Elapsed
        }
    }

    /// Fail with [`TaskError::Cancelled`] if cancellation was requested.
    pub fn checkpoint(&mut self) -> Result<(), TaskError> {
        if self.is_cancelled() {
            self.interrupted = true;
            return Err(TaskError::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sleep_elapses_without_cancellation() {
        let mut ctx = TaskContext::new(TaskId::new(0), CancellationToken::new());
        let start = tokio::time::Instant::now();

        assert_eq!(ctx.sleep(Duration::from_millis(100)).await, Wake::Elapsed);
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert!(!ctx.interrupted());
        assert!(ctx.checkpoint().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_sleep_sets_flag() {
        let token = CancellationToken::new();
        let mut ctx = TaskContext::new(TaskId::new(3), token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });

        let start = tokio::time::Instant::now();
        assert_eq!(ctx.sleep(Duration::from_secs(10)).await, Wake::Interrupted);
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(ctx.interrupted());
        assert_eq!(ctx.checkpoint(), Err(TaskError::Cancelled));
        canceller.await.unwrap();
    }

    #[tokio::test]
    async fn test_sleep_after_cancel_returns_immediately() {
        let token = CancellationToken::new();
        token.cancel();
        let mut ctx = TaskContext::new(TaskId::new(0), token);

        assert_eq!(ctx.sleep(Duration::from_secs(3600)).await, Wake::Interrupted);
        assert!(ctx.is_cancelled());
    }
}
