//! Errors surfaced by the runner at the group boundary.

use std::time::Duration;

use fanout_core::{CoreError, TaskError, TaskId};
use thiserror::Error;

/// Errors returned from joining a task group or running a baseline.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// A task failed under the strict policy.
    #[error("{task_id} failed: {source}")]
    TaskFailed {
        task_id: TaskId,
        #[source]
        source: TaskError,
    },

    /// The join deadline passed before every task finished.
    #[error("Join deadline of {deadline:?} exceeded with {pending} task(s) unfinished")]
    Timeout { deadline: Duration, pending: usize },

    /// The caller asked to shut down while waiting for the group.
    #[error("Join interrupted: {completed} task(s) completed, {cancelled} cancelled")]
    Interrupted { completed: usize, cancelled: usize },

    /// An OS thread could not be created.
    #[error("Failed to spawn OS thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Domain rule violated.
    #[error(transparent)]
    Core(#[from] CoreError),
}
