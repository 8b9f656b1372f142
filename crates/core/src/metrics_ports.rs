//! Metrics port used by the job runtime and sync engine

use std::time::Duration;

use storesync_domain::EntityType;

/// Terminal outcome of one job execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobOutcome {
    Success,
    Failed,
}

impl JobOutcome {
    /// Label value for the `status` dimension
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

/// Sink for worker metrics.
///
/// Implementations must never fail the caller; recording problems are logged
/// and swallowed.
pub trait WorkerMetricsPort: Send + Sync {
    /// Count one finished job and observe its duration
    fn record_job(&self, job_name: &str, outcome: JobOutcome, duration: Duration);

    /// Seconds the (store, entity) data is behind upstream
    fn set_sync_lag(&self, store_id: &str, entity: EntityType, lag_seconds: f64);
}
