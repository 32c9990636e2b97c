//! Group summary: counts and timing of one fan-out / fan-in run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{FailurePolicy, GroupId, GroupStatus, TaskStatus};

/// Summary of a task group, filled in as the group is joined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    /// Unique group identifier.
    pub group_id: GroupId,

    /// Failure policy the group ran under.
    pub policy: FailurePolicy,

    /// Current group status.
    pub status: GroupStatus,

    /// Number of tasks submitted.
    pub submitted: usize,

    /// Tasks that produced a value.
    pub completed: usize,

    /// Tasks that failed or panicked.
    pub failed: usize,

    /// Tasks that were cancelled.
    pub cancelled: usize,

    /// When the group was created.
    pub started_at: DateTime<Utc>,

    /// When the last task was joined.
    pub finished_at: Option<DateTime<Utc>>,
}

impl GroupSummary {
    /// Create a new, empty summary.
    pub fn new(group_id: GroupId, policy: FailurePolicy) -> Self {
        Self {
            group_id,
            policy,
            status: GroupStatus::Open,
            submitted: 0,
            completed: 0,
            failed: 0,
            cancelled: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Count one joined task by its terminal status.
    pub fn record(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Completed => self.completed += 1,
            TaskStatus::Failed => self.failed += 1,
            TaskStatus::Cancelled => self.cancelled += 1,
            TaskStatus::Created | TaskStatus::Running => {}
        }
    }

    /// Mark the group as closed.
    pub fn finish(&mut self) {
        self.status = GroupStatus::Closed;
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock time between creation and close, in milliseconds.
    pub fn elapsed_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_milliseconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_counts_terminal_only() {
        let mut summary = GroupSummary::new(GroupId::generate(), FailurePolicy::Resilient);
        summary.submitted = 4;
        summary.record(TaskStatus::Completed);
        summary.record(TaskStatus::Completed);
        summary.record(TaskStatus::Failed);
        summary.record(TaskStatus::Cancelled);
        summary.record(TaskStatus::Running);

        assert_eq!(summary.completed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.cancelled, 1);
        assert_eq!(
            summary.completed + summary.failed + summary.cancelled,
            summary.submitted
        );
    }

    #[test]
    fn test_finish_sets_closed() {
        let mut summary = GroupSummary::new(GroupId::generate(), FailurePolicy::Strict);
        assert!(summary.elapsed_ms().is_none());
        summary.finish();
        assert_eq!(summary.status, GroupStatus::Closed);
        assert!(summary.elapsed_ms().unwrap() >= 0);
    }
}
