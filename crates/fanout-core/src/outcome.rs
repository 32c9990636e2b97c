//! Terminal outcome of one task.

use crate::{TaskError, TaskStatus};

/// What a joined task ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome<T> {
    /// The task produced a value.
    Completed(T),
    /// The task failed or panicked.
    Failed(TaskError),
    /// The task was cancelled (cooperatively or by abort).
    Cancelled,
}

impl<T> TaskOutcome<T> {
    /// Classify a task's own result. Cooperative cancellation is not a failure.
    pub fn from_result(result: Result<T, TaskError>) -> Self {
        match result {
            Ok(value) => Self::Completed(value),
            Err(TaskError::Cancelled) => Self::Cancelled,
            Err(err) => Self::Failed(err),
        }
    }

    /// Terminal status of this outcome.
    pub fn status(&self) -> TaskStatus {
        match self {
            Self::Completed(_) => TaskStatus::Completed,
            Self::Failed(_) => TaskStatus::Failed,
            Self::Cancelled => TaskStatus::Cancelled,
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Completed(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&TaskError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}
