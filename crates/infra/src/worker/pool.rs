//! Bounded worker pool that drains the durable job queue.
//!
//! At most `concurrency` jobs run at once and at most `start_rate_per_sec`
//! jobs start per second. Each claimed job runs through [`JobRuntime`]; the
//! outcome is settled on the queue as complete, redelivery with exponential
//! backoff, or terminal failure. While a handler runs its lease is renewed
//! every `heartbeat_interval`, so stalled-job recovery only reclaims jobs
//! whose worker is gone. Stopping waits for in-flight jobs up to the
//! shutdown timeout, after which they are abandoned and their leases expire
//! into redelivery.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use storesync_common::{Clock, TokenBucket, TokenBucketConfig};
use storesync_core::clock::utc_now;
use storesync_core::jobs::queue_backoff;
use storesync_core::{JobQueue, JobRuntime};
use storesync_domain::constants::MAX_ERROR_LENGTH;
use storesync_domain::{Job, Result, StoreSyncError, WorkerConfig};
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct JobWorkerConfig {
    pub concurrency: usize,
    pub start_rate_per_sec: u64,
    /// Idle wait when the queue has nothing due
    pub poll_interval: Duration,
    pub lease: Duration,
    /// How often a running job's lease is pushed out by another `lease`
    pub heartbeat_interval: Duration,
    /// Base for the exponential redelivery delay
    pub queue_backoff: Duration,
    /// How often expired leases are swept back to waiting
    pub recover_interval: Duration,
    pub shutdown_timeout: Duration,
}

impl From<&WorkerConfig> for JobWorkerConfig {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            concurrency: config.concurrency.max(1),
            start_rate_per_sec: config.start_rate_per_sec.max(1),
            poll_interval: config.poll_interval(),
            lease: config.lease(),
            heartbeat_interval: (config.lease() / 3).max(MIN_HEARTBEAT_INTERVAL),
            queue_backoff: config.queue_backoff(),
            recover_interval: Duration::from_secs(30),
            shutdown_timeout: config.shutdown_timeout(),
        }
    }
}

impl Default for JobWorkerConfig {
    fn default() -> Self {
        Self::from(&WorkerConfig::default())
    }
}

/// Shared state for the poll loop and job tasks
#[derive(Clone)]
struct PoolContext {
    queue: Arc<dyn JobQueue>,
    runtime: Arc<JobRuntime>,
    clock: Arc<dyn Clock>,
    config: JobWorkerConfig,
}

pub struct JobWorker {
    context: PoolContext,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl JobWorker {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        runtime: Arc<JobRuntime>,
        clock: Arc<dyn Clock>,
        config: JobWorkerConfig,
    ) -> Self {
        Self {
            context: PoolContext { queue, runtime, clock, config },
            cancellation: CancellationToken::new(),
            task_handle: None,
        }
    }

    #[instrument(skip(self))]
    pub fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        let bucket = TokenBucket::new(TokenBucketConfig::per_interval(
            self.context.config.start_rate_per_sec,
            Duration::from_secs(1),
        ))
        .map_err(|err| SchedulerError::InvalidConfiguration { message: err.to_string() })?;

        self.cancellation = CancellationToken::new();
        let context = self.context.clone();
        let cancel = self.cancellation.clone();
        self.task_handle = Some(tokio::spawn(async move {
            Self::poll_loop(context, bucket, cancel).await;
        }));

        info!(
            concurrency = self.context.config.concurrency,
            start_rate_per_sec = self.context.config.start_rate_per_sec,
            "Job worker started"
        );
        Ok(())
    }

    /// Stop claiming jobs and wait for in-flight jobs to settle
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        let Some(mut handle) = self.task_handle.take() else {
            return Err(SchedulerError::NotRunning);
        };

        self.cancellation.cancel();

        let shutdown_timeout = self.context.config.shutdown_timeout;
        match tokio::time::timeout(shutdown_timeout, &mut handle).await {
            Ok(joined) => joined?,
            Err(source) => {
                warn!(
                    timeout_secs = shutdown_timeout.as_secs(),
                    "In-flight jobs did not finish; abandoning them for redelivery"
                );
                handle.abort();
                return Err(SchedulerError::Timeout { duration: shutdown_timeout, source });
            }
        }

        info!("Job worker stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.task_handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    async fn poll_loop(context: PoolContext, bucket: TokenBucket, cancel: CancellationToken) {
        let semaphore = Arc::new(Semaphore::new(context.config.concurrency));
        let mut in_flight = JoinSet::new();
        let mut last_recovery: Option<Instant> = None;

        loop {
            while let Some(joined) = in_flight.try_join_next() {
                if let Err(err) = joined {
                    error!(error = %err, "Job task panicked");
                }
            }

            if last_recovery.map_or(true, |at| at.elapsed() >= context.config.recover_interval) {
                Self::recover_stalled(&context).await;
                last_recovery = Some(Instant::now());
            }

            let permit = tokio::select! {
                _ = cancel.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let now = utc_now(context.clock.as_ref());
            match context.queue.claim_next(now, context.config.lease).await {
                Ok(Some(job)) => {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            Self::release_unstarted(&context, &job).await;
                            break;
                        }
                        _ = bucket.acquire() => {}
                    }
                    let context = context.clone();
                    in_flight.spawn(async move {
                        Self::process(&context, job).await;
                        drop(permit);
                    });
                }
                Ok(None) => {
                    drop(permit);
                    if Self::idle(&cancel, context.config.poll_interval).await {
                        break;
                    }
                }
                Err(err) => {
                    drop(permit);
                    warn!(error = %err, "Failed to claim job");
                    if Self::idle(&cancel, context.config.poll_interval).await {
                        break;
                    }
                }
            }
        }

        if !in_flight.is_empty() {
            info!(in_flight = in_flight.len(), "Waiting for in-flight jobs");
        }
        while let Some(joined) = in_flight.join_next().await {
            if let Err(err) = joined {
                error!(error = %err, "Job task panicked");
            }
        }
        debug!("Job worker poll loop exited");
    }

    /// Sleep for `wait`; true when cancelled first
    async fn idle(cancel: &CancellationToken, wait: Duration) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => true,
            _ = tokio::time::sleep(wait) => false,
        }
    }

    async fn recover_stalled(context: &PoolContext) {
        let now = utc_now(context.clock.as_ref());
        match context.queue.recover_stalled(now).await {
            Ok(0) => {}
            Ok(recovered) => warn!(recovered, "Returned stalled jobs to the queue"),
            Err(err) => warn!(error = %err, "Stalled job recovery failed"),
        }
    }

    /// Hand a claimed job straight back without counting it as a failure
    async fn release_unstarted(context: &PoolContext, job: &Job) {
        let now = utc_now(context.clock.as_ref());
        if let Err(err) = context.queue.fail(job, "worker shutting down", Some(now)).await {
            warn!(job_id = %job.id, error = %err, "Failed to release unstarted job");
        }
    }

    async fn process(context: &PoolContext, job: Job) {
        let outcome = Self::run_with_heartbeat(context, &job).await;
        match Self::settle(context, &job, outcome).await {
            Ok(true) => {}
            Ok(false) => warn!(
                job_id = %job.id,
                job_name = %job.name,
                delivery = job.attempts,
                "Lease lost before settling; outcome discarded"
            ),
            Err(err) => {
                error!(job_id = %job.id, job_name = %job.name, error = %err, "Failed to settle job")
            }
        }
    }

    /// Run the handler, renewing the lease until it returns
    async fn run_with_heartbeat(context: &PoolContext, job: &Job) -> Result<serde_json::Value> {
        let run = context.runtime.execute(job);
        tokio::pin!(run);

        let period = context.config.heartbeat_interval.max(MIN_HEARTBEAT_INTERVAL);
        let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                outcome = &mut run => return outcome,
                _ = heartbeat.tick() => Self::renew_lease(context, job).await,
            }
        }
    }

    async fn renew_lease(context: &PoolContext, job: &Job) {
        let now = utc_now(context.clock.as_ref());
        let Ok(lease) = chrono::Duration::from_std(context.config.lease) else {
            return;
        };
        match context.queue.extend_lease(job, now + lease).await {
            Ok(true) => debug!(job_id = %job.id, lease_until = %(now + lease), "Lease renewed"),
            Ok(false) => warn!(job_id = %job.id, delivery = job.attempts, "Lease no longer held"),
            Err(err) => warn!(job_id = %job.id, error = %err, "Failed to renew lease"),
        }
    }

    async fn settle(
        context: &PoolContext,
        job: &Job,
        outcome: Result<serde_json::Value>,
    ) -> Result<bool> {
        match outcome {
            Ok(result) => {
                debug!(job_id = %job.id, %result, "Job result");
                context.queue.complete(job).await
            }
            Err(err) => {
                let now = utc_now(context.clock.as_ref());
                let retry_at = redelivery_at(&err, job, now, context.config.queue_backoff);
                match retry_at {
                    Some(at) => warn!(
                        job_id = %job.id,
                        job_name = %job.name,
                        delivery = job.attempts,
                        retry_at = %at,
                        "Job failed; scheduled for redelivery"
                    ),
                    None => error!(
                        job_id = %job.id,
                        job_name = %job.name,
                        delivery = job.attempts,
                        kind = err.label(),
                        "Job failed permanently"
                    ),
                }
                context.queue.fail(job, &truncate(&err.to_string(), MAX_ERROR_LENGTH), retry_at).await
            }
        }
    }
}

impl Drop for JobWorker {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("JobWorker dropped while running; cancelling tasks");
            self.cancellation.cancel();
        }
    }
}

/// Next delivery time, or `None` when the job must fail terminally
pub(crate) fn redelivery_at(
    err: &StoreSyncError,
    job: &Job,
    now: DateTime<Utc>,
    backoff_base: Duration,
) -> Option<DateTime<Utc>> {
    if !err.is_redeliverable() || job.attempts >= job.max_attempts {
        return None;
    }
    let delay = chrono::Duration::from_std(queue_backoff(backoff_base, job.attempts)).ok()?;
    Some(now + delay)
}

fn truncate(message: &str, max: usize) -> String {
    if message.len() <= max {
        return message.to_string();
    }
    let mut end = max;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_string()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn job(attempts: u32, max_attempts: u32) -> Job {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        Job {
            id: "job-1".into(),
            name: "woo-sync-orders".into(),
            data: json!({ "storeId": "s1" }),
            attempts,
            max_attempts,
            priority: 0,
            schedule_id: None,
            run_at: at,
            created_at: at,
        }
    }

    #[test]
    fn transient_failure_backs_off_exponentially() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let err = StoreSyncError::Timeout("upstream".into());

        let first = redelivery_at(&err, &job(1, 3), now, Duration::from_secs(2)).unwrap();
        assert_eq!(first - now, chrono::Duration::seconds(2));

        let second = redelivery_at(&err, &job(2, 3), now, Duration::from_secs(2)).unwrap();
        assert_eq!(second - now, chrono::Duration::seconds(4));
    }

    #[test]
    fn exhausted_or_permanent_failures_are_terminal() {
        let now = Utc::now();
        let transient = StoreSyncError::Network("reset".into());
        assert!(redelivery_at(&transient, &job(3, 3), now, Duration::from_secs(2)).is_none());

        let permanent = StoreSyncError::UnknownJob("mystery".into());
        assert!(redelivery_at(&permanent, &job(1, 3), now, Duration::from_secs(2)).is_none());
    }

    #[test]
    fn truncates_on_char_boundary() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ağaç", 2), "a");
    }
}
