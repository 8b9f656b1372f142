//! Job execution with in-process retry and failure audit
//!
//! [`JobRuntime::execute`] resolves the handler by name, retries retryable
//! errors with a linear delay, records a failure row once attempts are
//! exhausted and reports outcome metrics. Queue-level redelivery is decided by
//! the caller from the returned error.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use storesync_common::Clock;
use storesync_domain::{Job, JobFailure, Result, StoreSyncError, WorkerConfig};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::ports::{JobFailureRepository, JobHandler};
use crate::clock::utc_now;
use crate::metrics_ports::{JobOutcome, WorkerMetricsPort};

/// In-execution retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total handler invocations per execution, including the first
    pub max_attempts: u32,
    /// Base delay; attempt `n` waits `retry_delay * n` before attempt `n + 1`
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&WorkerConfig::default())
    }
}

impl From<&WorkerConfig> for RetryPolicy {
    fn from(config: &WorkerConfig) -> Self {
        Self { max_attempts: config.max_attempts.max(1), retry_delay: config.retry_delay() }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(attempt)
    }
}

/// Exponential queue redelivery delay: `base * 2^(delivery - 1)`
pub fn queue_backoff(base: Duration, delivery: u32) -> Duration {
    let exponent = delivery.saturating_sub(1).min(16);
    base.saturating_mul(1_u32 << exponent)
}

/// Handler registry plus the retry/audit wrapper around it
pub struct JobRuntime {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
    failures: Arc<dyn JobFailureRepository>,
    metrics: Arc<dyn WorkerMetricsPort>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
}

impl JobRuntime {
    pub fn new(
        failures: Arc<dyn JobFailureRepository>,
        metrics: Arc<dyn WorkerMetricsPort>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
    ) -> Self {
        Self { handlers: HashMap::new(), failures, metrics, clock, policy }
    }

    /// Register a handler under its job name, replacing any previous one
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn JobHandler>) -> Self {
        self.handlers.insert(handler.name().as_str().to_string(), handler);
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Registered job names, sorted
    pub fn job_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Run `job` to success or exhaustion.
    ///
    /// # Errors
    /// `UnknownJob` for an unregistered name (never retried); otherwise the
    /// last handler error after the failure audit row has been written.
    #[instrument(skip(self, job), fields(job_id = %job.id, job_name = %job.name, delivery = job.attempts))]
    pub async fn execute(&self, job: &Job) -> Result<Value> {
        let started = Instant::now();

        let Some(handler) = self.handlers.get(&job.name) else {
            let err = StoreSyncError::UnknownJob(job.name.clone());
            error!("No handler registered for job");
            self.record_exhausted(job, &err, 0, started).await;
            return Err(err);
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            match handler.handle(job).await {
                Ok(result) => {
                    let elapsed = started.elapsed();
                    self.metrics.record_job(&job.name, JobOutcome::Success, elapsed);
                    info!(attempt, duration_ms = elapsed.as_millis() as u64, "Job completed");
                    return Ok(result);
                }
                Err(err) if err.is_retryable() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay_after(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Job attempt failed, retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(err) => {
                    error!(attempt, error_kind = err.label(), error = %err, "Job failed");
                    self.record_exhausted(job, &err, attempt, started).await;
                    return Err(err);
                }
            }
        }
    }

    async fn record_exhausted(&self, job: &Job, err: &StoreSyncError, attempts: u32, started: Instant) {
        self.metrics.record_job(&job.name, JobOutcome::Failed, started.elapsed());

        let failure = JobFailure {
            id: Uuid::now_v7().to_string(),
            job_id: job.id.clone(),
            job_name: job.name.clone(),
            payload: job.data.clone(),
            error_kind: err.label().to_string(),
            error: err.to_string(),
            attempt_count: attempts,
            failed_at: utc_now(self.clock.as_ref()),
        };
        if let Err(record_err) = self.failures.record_failure(&failure).await {
            error!(error = %record_err, "Failed to record job failure");
        }
    }
}
