//! Port interfaces for the job runtime

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use storesync_domain::{Job, JobFailure, JobName, JobRequest, RecurringSchedule, Result};

/// Business logic for one job name
#[async_trait]
pub trait JobHandler: Send + Sync {
    fn name(&self) -> JobName;

    /// Run the job once. The returned value is logged as the job result.
    async fn handle(&self, job: &Job) -> Result<Value>;
}

/// Durable job queue
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue a job. Returns `None` when `dedupe_key` matches a job that is
    /// still waiting or active.
    async fn enqueue(&self, request: JobRequest) -> Result<Option<String>>;

    /// Claim the highest-priority due job and lease it for `lease`
    async fn claim_next(&self, now: DateTime<Utc>, lease: Duration) -> Result<Option<Job>>;

    /// Push the lease of a running delivery out to `until`.
    ///
    /// Returns false when `job` no longer holds the lease.
    async fn extend_lease(&self, job: &Job, until: DateTime<Utc>) -> Result<bool>;

    /// Finish a delivery; completed jobs are removed.
    ///
    /// Only the delivery that holds the lease can settle the job; for any
    /// other the call is a no-op returning false.
    async fn complete(&self, job: &Job) -> Result<bool>;

    /// Release a failed delivery: back to waiting at `retry_at`, or terminally
    /// failed when `retry_at` is `None`. Fenced like [`JobQueue::complete`].
    async fn fail(&self, job: &Job, error: &str, retry_at: Option<DateTime<Utc>>) -> Result<bool>;

    /// Return active jobs whose lease expired before `now` to waiting
    async fn recover_stalled(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Recurring schedules keyed by a stable id
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// Insert or update by id. An unchanged pattern keeps the stored
    /// `next_run_at`.
    async fn upsert_schedule(&self, schedule: &RecurringSchedule) -> Result<()>;

    async fn list_schedules(&self) -> Result<Vec<RecurringSchedule>>;

    /// Enabled schedules with `next_run_at <= now`
    async fn due_schedules(&self, now: DateTime<Utc>) -> Result<Vec<RecurringSchedule>>;

    async fn set_next_run(&self, id: &str, next_run_at: DateTime<Utc>) -> Result<()>;

    async fn remove_schedule(&self, id: &str) -> Result<bool>;
}

/// Dead-letter audit of exhausted jobs
#[async_trait]
pub trait JobFailureRepository: Send + Sync {
    async fn record_failure(&self, failure: &JobFailure) -> Result<()>;

    /// Most recent first
    async fn list_failures(&self, limit: u32) -> Result<Vec<JobFailure>>;
}
