//! Scheduler error types.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Config(#[from] plum_core::ConfigError),

    #[error("check not found: {0}")]
    CheckNotFound(String),

    #[error("tombstone captured at {captured} is too old to restore")]
    TombStoneStale { captured: DateTime<Utc> },

    #[error("tombstone store error: {0}")]
    State(#[from] plum_state::StateError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
