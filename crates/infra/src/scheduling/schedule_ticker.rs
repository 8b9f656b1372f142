//! Cron-driven ticker that turns due recurring schedules into queued jobs.
//!
//! Every tick calls [`RecurringCatalog::dispatch_due`]; the schedules
//! themselves live in the database so a restart resumes from the stored
//! `next_run_at` values. Lifecycle follows the usual rules: start and stop are
//! wrapped in timeouts and the monitor task handle is tracked.

use std::sync::Arc;
use std::time::{Duration, Instant};

use storesync_core::RecurringCatalog;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::scheduling::error::{SchedulerError, SchedulerResult};

#[derive(Debug, Clone)]
pub struct ScheduleTickerConfig {
    /// Six-field cron expression (with seconds)
    pub cron_expression: String,
    /// Upper bound for one dispatch pass
    pub tick_timeout: Duration,
    pub start_timeout: Duration,
    pub stop_timeout: Duration,
    pub join_timeout: Duration,
}

impl Default for ScheduleTickerConfig {
    fn default() -> Self {
        Self {
            cron_expression: storesync_domain::constants::DEFAULT_SCHEDULE_TICK.into(),
            tick_timeout: Duration::from_secs(30),
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(5),
        }
    }
}

pub struct ScheduleTicker {
    scheduler: Arc<RwLock<JobScheduler>>,
    config: ScheduleTickerConfig,
    job_id: Uuid,
    monitor_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
}

impl ScheduleTicker {
    pub async fn new(
        config: ScheduleTickerConfig,
        catalog: Arc<RecurringCatalog>,
    ) -> SchedulerResult<Self> {
        let raw_scheduler = JobScheduler::new()
            .await
            .map_err(|source| SchedulerError::CreationFailed { source })?;

        let mut ticker = Self {
            scheduler: Arc::new(RwLock::new(raw_scheduler)),
            config,
            job_id: Uuid::nil(),
            monitor_handle: None,
            cancellation: CancellationToken::new(),
        };
        ticker.job_id = ticker.register_tick(catalog).await?;
        Ok(ticker)
    }

    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();

        let scheduler = self.scheduler.clone();
        let start_timeout = self.config.start_timeout;
        tokio::time::timeout(start_timeout, async move {
            let guard = scheduler.write().await;
            guard.start().await
        })
        .await
        .map_err(|source| SchedulerError::Timeout { duration: start_timeout, source })?
        .map_err(|source| SchedulerError::StartFailed { source })?;

        let cancel = self.cancellation.clone();
        self.monitor_handle = Some(tokio::spawn(async move {
            cancel.cancelled().await;
            debug!("Schedule ticker monitor cancelled");
        }));

        info!(cron = %self.config.cron_expression, "Schedule ticker started");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        self.cancellation.cancel();

        let scheduler = self.scheduler.clone();
        let stop_timeout = self.config.stop_timeout;
        tokio::time::timeout(stop_timeout, async move {
            let mut guard = scheduler.write().await;
            guard.shutdown().await
        })
        .await
        .map_err(|source| SchedulerError::Timeout { duration: stop_timeout, source })?
        .map_err(|source| SchedulerError::StopFailed { source })?;

        if let Some(handle) = self.monitor_handle.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|source| SchedulerError::Timeout { duration: join_timeout, source })??;
        }

        info!("Schedule ticker stopped");
        Ok(())
    }

    /// Id of the registered tick job
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn is_running(&self) -> bool {
        self.monitor_handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    async fn register_tick(&self, catalog: Arc<RecurringCatalog>) -> SchedulerResult<Uuid> {
        let tick_timeout = self.config.tick_timeout;

        let job = Job::new_async(self.config.cron_expression.as_str(), move |_id, _lock| {
            let catalog = catalog.clone();
            Box::pin(async move {
                let started = Instant::now();
                match tokio::time::timeout(tick_timeout, catalog.dispatch_due()).await {
                    Ok(Ok(enqueued)) => {
                        debug!(enqueued, elapsed_ms = started.elapsed().as_millis() as u64, "Schedule tick finished");
                    }
                    Ok(Err(err)) => error!(error = %err, "Schedule tick failed"),
                    Err(_) => warn!(timeout_secs = tick_timeout.as_secs(), "Schedule tick timed out"),
                }
            })
        })
        .map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

        let job_id = job.guid();
        let scheduler = self.scheduler.write().await;
        scheduler.add(job).await.map_err(|source| SchedulerError::JobRegistrationFailed { source })?;

        debug!(cron = %self.config.cron_expression, %job_id, "Registered schedule tick");
        Ok(job_id)
    }
}

impl Drop for ScheduleTicker {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("ScheduleTicker dropped while running; cancelling tasks");
            self.cancellation.cancel();
        }
    }
}
