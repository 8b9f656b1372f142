//! Recurring job catalogue
//!
//! Schedules are stored under stable ids (the job name for fixed jobs,
//! `<job>:<storeId>` for per-store syncs) so re-registration after a restart
//! updates rows instead of adding new ones.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use storesync_common::{Clock, CronExpression};
use storesync_domain::constants::{
    CLEANUP_CACHE_PATTERN, CLEANUP_SESSIONS_PATTERN, ORDERS_SYNC_PATTERN, PRODUCTS_SYNC_PATTERN,
    WEBHOOK_EVENTS_PATTERN, WOO_SCHEDULE_PATTERN,
};
use storesync_domain::{JobName, JobRequest, RecurringSchedule, Result, StoreSyncError};
use tracing::{debug, error, info, instrument, warn};

use super::ports::{JobQueue, ScheduleRepository};
use crate::clock::utc_now;
use crate::sync::ports::StoreRepository;

/// A fixed recurring job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSpec {
    pub job: JobName,
    pub pattern: &'static str,
    pub priority: i32,
}

/// Jobs registered at startup regardless of stores
pub const FIXED_SCHEDULES: [ScheduleSpec; 4] = [
    ScheduleSpec { job: JobName::ProcessWebhookEvents, pattern: WEBHOOK_EVENTS_PATTERN, priority: 10 },
    ScheduleSpec { job: JobName::WooSchedule, pattern: WOO_SCHEDULE_PATTERN, priority: 5 },
    ScheduleSpec { job: JobName::CleanupCache, pattern: CLEANUP_CACHE_PATTERN, priority: 1 },
    ScheduleSpec { job: JobName::CleanupSessions, pattern: CLEANUP_SESSIONS_PATTERN, priority: 1 },
];

/// Per-store sync schedules
pub const STORE_SCHEDULES: [(JobName, &str); 2] = [
    (JobName::WooSyncOrders, ORDERS_SYNC_PATTERN),
    (JobName::WooSyncProducts, PRODUCTS_SYNC_PATTERN),
];

pub const STORE_SYNC_PRIORITY: i32 = 0;

/// Result of a per-store registration pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreScheduleReport {
    pub stores: usize,
    pub registered: usize,
    /// Schedules dropped because their store is gone or inactive
    pub removed: usize,
}

pub struct RecurringCatalog {
    schedules: Arc<dyn ScheduleRepository>,
    stores: Arc<dyn StoreRepository>,
    queue: Arc<dyn JobQueue>,
    clock: Arc<dyn Clock>,
}

impl RecurringCatalog {
    pub fn new(
        schedules: Arc<dyn ScheduleRepository>,
        stores: Arc<dyn StoreRepository>,
        queue: Arc<dyn JobQueue>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { schedules, stores, queue, clock }
    }

    /// Register every entry of [`FIXED_SCHEDULES`]
    #[instrument(skip(self))]
    pub async fn register_fixed(&self) -> Result<usize> {
        let now = utc_now(self.clock.as_ref());
        for spec in FIXED_SCHEDULES {
            let schedule = build_schedule(
                spec.job.as_str().to_string(),
                spec.job,
                json!({}),
                spec.pattern,
                spec.priority,
                now,
            )?;
            self.schedules.upsert_schedule(&schedule).await?;
        }
        info!(count = FIXED_SCHEDULES.len(), "Fixed schedules registered");
        Ok(FIXED_SCHEDULES.len())
    }

    /// Register order and product syncs for every active store and drop
    /// per-store schedules whose store is no longer active
    #[instrument(skip(self))]
    pub async fn register_store_schedules(&self) -> Result<StoreScheduleReport> {
        let now = utc_now(self.clock.as_ref());
        let stores = self.stores.list_active_stores().await?;
        let mut report = StoreScheduleReport { stores: stores.len(), ..StoreScheduleReport::default() };
        let mut wanted = HashSet::new();

        for store in &stores {
            for (job, pattern) in STORE_SCHEDULES {
                let id = job.store_schedule_id(&store.id);
                let schedule = build_schedule(
                    id.clone(),
                    job,
                    json!({ "storeId": store.id }),
                    pattern,
                    STORE_SYNC_PRIORITY,
                    now,
                )?;
                self.schedules.upsert_schedule(&schedule).await?;
                wanted.insert(id);
                report.registered += 1;
            }
        }

        for existing in self.schedules.list_schedules().await? {
            let per_store = STORE_SCHEDULES
                .iter()
                .any(|(job, _)| existing.id.starts_with(&format!("{}:", job.as_str())));
            if per_store && !wanted.contains(&existing.id) && self.schedules.remove_schedule(&existing.id).await? {
                debug!(schedule_id = %existing.id, "Removed schedule for inactive store");
                report.removed += 1;
            }
        }

        info!(
            stores = report.stores,
            registered = report.registered,
            removed = report.removed,
            "Store schedules registered"
        );
        Ok(report)
    }

    /// Enqueue every due schedule and move it to its next fire time.
    ///
    /// Returns the number of jobs enqueued; deduplicated fires count as
    /// skipped but still advance the schedule.
    #[instrument(skip(self))]
    pub async fn dispatch_due(&self) -> Result<usize> {
        let now = utc_now(self.clock.as_ref());
        let mut enqueued = 0;

        for schedule in self.schedules.due_schedules(now).await? {
            let next = match next_fire(&schedule.pattern, now) {
                Ok(next) => next,
                Err(err) => {
                    error!(schedule_id = %schedule.id, error = %err, "Unusable schedule pattern");
                    continue;
                }
            };

            let request = JobRequest {
                name: schedule.job_name.clone(),
                data: schedule.data.clone(),
                priority: schedule.priority,
                delay: std::time::Duration::ZERO,
                dedupe_key: Some(schedule.id.clone()),
            };
            match self.queue.enqueue(request).await? {
                Some(job_id) => {
                    debug!(schedule_id = %schedule.id, %job_id, "Scheduled job enqueued");
                    enqueued += 1;
                }
                None => warn!(schedule_id = %schedule.id, "Previous run still pending, skipping"),
            }
            self.schedules.set_next_run(&schedule.id, next).await?;
        }

        Ok(enqueued)
    }

    /// Enqueue a one-off run of `job` now, outside its schedule
    pub async fn trigger(&self, job: JobName, data: Value, priority: i32) -> Result<Option<String>> {
        self.queue
            .enqueue(JobRequest::new(job, data).with_priority(priority).with_dedupe_key(job.as_str()))
            .await
    }
}

fn build_schedule(
    id: String,
    job: JobName,
    data: Value,
    pattern: &str,
    priority: i32,
    now: DateTime<Utc>,
) -> Result<RecurringSchedule> {
    Ok(RecurringSchedule {
        id,
        job_name: job.as_str().to_string(),
        data,
        pattern: pattern.to_string(),
        priority,
        next_run_at: next_fire(pattern, now)?,
        enabled: true,
    })
}

/// Next fire strictly after `now`
pub fn next_fire(pattern: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let cron = CronExpression::parse(pattern)
        .map_err(|e| StoreSyncError::Config(format!("cron pattern '{pattern}': {e}")))?;
    cron.next_after(&now)
        .ok_or_else(|| StoreSyncError::Config(format!("cron pattern '{pattern}' never fires")))
}
