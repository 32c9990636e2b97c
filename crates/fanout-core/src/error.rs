//! Core domain errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core domain errors for fanout.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid state transition.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Failure produced by a single task.
///
/// Cloneable so the first failure of a group can be kept aside while the
/// task's own result slot still receives it.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum TaskError {
    /// The task observed cancellation and gave up.
    #[error("Task cancelled")]
    Cancelled,

    /// The task panicked.
    #[error("Task panicked: {0}")]
    Panicked(String),

    /// The task reported a failure.
    #[error("Task failed: {0}")]
    Failed(String),
}

impl TaskError {
    /// Build a [`TaskError::Failed`] from any message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Returns true for cooperative cancellation, which is not a failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
