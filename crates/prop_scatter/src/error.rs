//! Failures of planning and running a placement.
//!
//! Input problems (configuration, terrain, rule sets) are reported by
//! [`crate::scatter::schedule::PartitionScheduler::plan`] before any worker starts. The remaining
//! variants come out of [`crate::scatter::schedule::ScheduledRun::wait`].
use thiserror::Error;

use crate::scatter::partition::PartitionId;

pub type Result<T> = std::result::Result<T, Error>;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid terrain: {0}")]
    InvalidTerrain(String),

    #[error("invalid rule set '{id}': {reason}")]
    InvalidRuleSet { id: String, reason: String },

    #[error("no enabled rule sets")]
    NoEnabledRuleSets,

    #[error("partition {partition} grid storage was already borrowed by a running worker")]
    ScheduleConflict { partition: PartitionId },

    #[error("placement worker for partition {partition} panicked")]
    WorkerPanicked { partition: PartitionId },

    #[error("placement run was cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error::Other(value)
    }
}

impl From<&str> for Error {
    fn from(value: &str) -> Self {
        Error::Other(value.to_owned())
    }
}
