//! Benchmark task bodies.
//!
//! Both bodies swallow an interruption into the context flag rather than
//! failing, so a cancelled group drains without errors.

use std::time::Duration;

use fanout_core::TaskError;
use tracing::trace;

use crate::{TaskContext, Wake};

/// Sleep for `duration`, then finish.
pub async fn sleep_task(mut ctx: TaskContext, duration: Duration) -> Result<(), TaskError> {
    if ctx.sleep(duration).await == Wake::Interrupted {
        trace!(task_id = %ctx.id(), "Sleep interrupted");
    }
    Ok(())
}

/// Stand-in for an expensive computation: sleep, then return 1.
pub async fn heavy_computation(mut ctx: TaskContext, duration: Duration) -> Result<u64, TaskError> {
    if ctx.sleep(duration).await == Wake::Interrupted {
        trace!(task_id = %ctx.id(), "Computation interrupted");
    }
    Ok(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanout_core::TaskId;
    use tokio_util::sync::CancellationToken;

    #[tokio::test(start_paused = true)]
    async fn test_heavy_computation_returns_one() {
        let ctx = TaskContext::new(TaskId::new(0), CancellationToken::new());
        assert_eq!(heavy_computation(ctx, Duration::from_millis(100)).await, Ok(1));
    }

    #[tokio::test]
    async fn test_interrupted_sleep_is_not_an_error() {
        let token = CancellationToken::new();
        token.cancel();

        let ctx = TaskContext::new(TaskId::new(0), token.clone());
        assert_eq!(sleep_task(ctx, Duration::from_secs(3600)).await, Ok(()));

        let ctx = TaskContext::new(TaskId::new(1), token);
        assert_eq!(heavy_computation(ctx, Duration::from_secs(3600)).await, Ok(1));
    }
}
