//! Fan-out / fan-in task runner.
//!
//! Submits large numbers of lightweight tokio tasks into an explicitly
//! constructed [`TaskGroup`], then joins them all behind one barrier with
//! either fail-fast ([`FailurePolicy::Strict`]) or per-task
//! ([`FailurePolicy::Resilient`]) failure handling.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use fanout_runner::{workload, RunnerConfig};
//!
//! async fn count() -> Result<u64, fanout_runner::RunnerError> {
//!     fanout_runner::sum(&RunnerConfig::default(), 1_000_000, |ctx| {
//!         workload::heavy_computation(ctx, Duration::from_millis(100))
//!     })
//!     .await
//! }
//! ```

mod config;
mod context;
mod error;
mod group;
pub mod memory;
mod stats;
pub mod threads;
pub mod workload;

use std::future::Future;

pub use config::RunnerConfig;
pub use context::{TaskContext, Wake};
pub use error::RunnerError;
pub use group::{GroupResults, TaskGroup};
pub use stats::{GroupStats, StatsSnapshot};

// Re-export the domain types callers need alongside the runner.
pub use fanout_core::{
    FailurePolicy, GroupId, GroupStatus, GroupSummary, TaskError, TaskId, TaskOutcome, TaskStatus,
};

/// Fan out `count` tasks and collect the values of those that completed, in
/// submission order.
pub async fn collect<T, F, Fut>(
    config: &RunnerConfig,
    count: usize,
    factory: F,
) -> Result<Vec<T>, RunnerError>
where
    T: Send + 'static,
    F: Fn(TaskContext) -> Fut,
    Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
{
    let mut group = TaskGroup::new(config.clone())?;
    group.spawn_n(count, factory);
    Ok(group.join().await?.into_values())
}

/// Fan out `count` tasks and add up the values of those that completed.
///
/// Zero tasks sum to zero without blocking.
pub async fn sum<F, Fut>(config: &RunnerConfig, count: usize, factory: F) -> Result<u64, RunnerError>
where
    F: Fn(TaskContext) -> Fut,
    Fut: Future<Output = Result<u64, TaskError>> + Send + 'static,
{
    let mut group = TaskGroup::new(config.clone())?;
    group.spawn_n(count, factory);
    Ok(group.join().await?.sum())
}
