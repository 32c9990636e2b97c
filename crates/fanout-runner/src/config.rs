//! Task group configuration.

use std::time::Duration;

use fanout_core::FailurePolicy;

use crate::RunnerError;

/// Task group configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// What a failing task does to the rest of the group.
    pub policy: FailurePolicy,

    /// Maximum number of task bodies running at once (`None` = unbounded).
    pub max_concurrency: Option<usize>,

    /// Overall deadline for the join, measured from when the join starts.
    pub join_deadline: Option<Duration>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            policy: FailurePolicy::Strict,
            max_concurrency: None,
            join_deadline: None,
        }
    }
}

impl RunnerConfig {
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit);
        self
    }

    pub fn with_join_deadline(mut self, deadline: Duration) -> Self {
        self.join_deadline = Some(deadline);
        self
    }

    /// Reject settings no group can run with.
    pub fn validate(&self) -> Result<(), RunnerError> {
        if self.max_concurrency == Some(0) {
            return Err(RunnerError::InvalidConfig(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.join_deadline == Some(Duration::ZERO) {
            return Err(RunnerError::InvalidConfig(
                "join_deadline must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_strict_and_unbounded() {
        let config = RunnerConfig::default();
        assert_eq!(config.policy, FailurePolicy::Strict);
        assert!(config.max_concurrency.is_none());
        assert!(config.join_deadline.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let config = RunnerConfig::default().with_max_concurrency(0);
        assert!(matches!(config.validate(), Err(RunnerError::InvalidConfig(_))));

        let config = RunnerConfig::default().with_join_deadline(Duration::ZERO);
        assert!(matches!(config.validate(), Err(RunnerError::InvalidConfig(_))));
    }
}
