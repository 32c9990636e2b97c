//! fanout Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - An async runtime
//! - OS threads or synchronization
//!
//! All types here describe tasks, task groups and how their outcomes are
//! classified and summarised.

pub mod error;
pub mod ids;
pub mod outcome;
pub mod policy;
pub mod status;
pub mod summary;

// Re-export commonly used types
pub use error::{CoreError, TaskError};
pub use ids::{GroupId, TaskId};
pub use outcome::TaskOutcome;
pub use policy::FailurePolicy;
pub use status::{GroupStatus, TaskStatus};
pub use summary::GroupSummary;
