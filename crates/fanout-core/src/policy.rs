//! Failure policy of a task group.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// How a task group reacts to a failing task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Fail fast: the first failure cancels the remaining tasks and is
    /// propagated from the join.
    #[default]
    Strict,
    /// Record failures per task and keep waiting for the rest.
    Resilient,
}

impl FailurePolicy {
    /// Returns true if the first failure should cancel the group.
    pub fn is_fail_fast(&self) -> bool {
        matches!(self, Self::Strict)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Resilient => "resilient",
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailurePolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" | "fail-fast" => Ok(Self::Strict),
            "resilient" => Ok(Self::Resilient),
            other => Err(CoreError::InvalidInput(format!(
                "unknown failure policy '{other}' (expected 'strict' or 'resilient')"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_parse() {
        assert_eq!("strict".parse::<FailurePolicy>().unwrap(), FailurePolicy::Strict);
        assert_eq!("fail-fast".parse::<FailurePolicy>().unwrap(), FailurePolicy::Strict);
        assert_eq!(" Resilient ".parse::<FailurePolicy>().unwrap(), FailurePolicy::Resilient);
        assert!("sometimes".parse::<FailurePolicy>().is_err());
    }

    #[test]
    fn test_policy_default_is_fail_fast() {
        assert!(FailurePolicy::default().is_fail_fast());
        assert!(!FailurePolicy::Resilient.is_fail_fast());
    }
}
