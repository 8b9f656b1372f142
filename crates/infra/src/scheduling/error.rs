//! Scheduler and worker lifecycle errors

use std::time::Duration;

use storesync_domain::StoreSyncError;
use thiserror::Error;
use tokio::task::JoinError;
use tokio::time::error::Elapsed;
use tokio_cron_scheduler::JobSchedulerError;

use crate::errors::InfraError;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Scheduler already running")]
    AlreadyRunning,

    #[error("Scheduler not running")]
    NotRunning,

    #[error("Failed to create scheduler: {source}")]
    CreationFailed { source: JobSchedulerError },

    #[error("Failed to start scheduler: {source}")]
    StartFailed { source: JobSchedulerError },

    #[error("Failed to stop scheduler: {source}")]
    StopFailed { source: JobSchedulerError },

    #[error("Failed to register job: {source}")]
    JobRegistrationFailed { source: JobSchedulerError },

    /// Lifecycle step did not finish in time
    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration, source: Elapsed },

    #[error("Invalid scheduler configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("Task join failed: {0}")]
    TaskJoinFailed(#[from] JoinError),
}

impl From<SchedulerError> for InfraError {
    fn from(err: SchedulerError) -> Self {
        let mapped = match err {
            SchedulerError::AlreadyRunning | SchedulerError::NotRunning => {
                StoreSyncError::Internal(err.to_string())
            }
            SchedulerError::Timeout { .. } => StoreSyncError::Timeout(err.to_string()),
            SchedulerError::CreationFailed { .. }
            | SchedulerError::JobRegistrationFailed { .. }
            | SchedulerError::InvalidConfiguration { .. } => {
                StoreSyncError::Config(err.to_string())
            }
            _ => StoreSyncError::Internal(err.to_string()),
        };
        InfraError(mapped)
    }
}

impl From<SchedulerError> for StoreSyncError {
    fn from(err: SchedulerError) -> Self {
        InfraError::from(err).into()
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
