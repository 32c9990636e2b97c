//! Status enums for tasks and task groups.

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Lifecycle of a single task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Task submitted but not yet admitted to run.
    #[default]
    Created,
    /// Task body is executing (possibly suspended in a wait).
    Running,
    /// Task produced a value.
    Completed,
    /// Task produced a failure or panicked.
    Failed,
    /// Task was cancelled before producing a value.
    Cancelled,
}

impl TaskStatus {
    /// Returns true if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Lifecycle of a task group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupStatus {
    /// Group accepts new tasks.
    #[default]
    Open,
    /// Group is waiting for its tasks; no more tasks can be added.
    Joining,
    /// Every task has been joined.
    Closed,
}

impl GroupStatus {
    /// Advance to the next state, rejecting anything but Open -> Joining -> Closed.
    pub fn advance(self, to: GroupStatus) -> Result<GroupStatus, CoreError> {
        match (self, to) {
            (Self::Open, Self::Joining) | (Self::Joining, Self::Closed) => Ok(to),
            _ => Err(CoreError::InvalidStateTransition {
                from: format!("{self:?}"),
                to: format!("{to:?}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_terminal() {
        assert!(!TaskStatus::Created.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_group_status_transitions() {
        let joining = GroupStatus::Open.advance(GroupStatus::Joining).unwrap();
        let closed = joining.advance(GroupStatus::Closed).unwrap();
        assert_eq!(closed, GroupStatus::Closed);

        assert!(GroupStatus::Open.advance(GroupStatus::Closed).is_err());
        assert!(GroupStatus::Closed.advance(GroupStatus::Open).is_err());
    }
}
