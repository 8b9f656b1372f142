//! Durable job queue on SQLite
//!
//! Claiming happens inside an immediate transaction, so two workers sharing
//! the database never lease the same row. Completed jobs are deleted;
//! terminally failed jobs stay for inspection.
//!
//! A delivery is identified by the row id plus its `attempts` value at claim
//! time. Lease renewal and settlement match on both, so a holder whose lease
//! expired and whose job was handed out again cannot touch the new delivery.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};
use storesync_common::Clock;
use storesync_core::clock::utc_now;
use storesync_core::JobQueue;
use storesync_domain::{Job, JobRequest, JobStatus, Result, StoreSyncError};
use tracing::{debug, info};
use uuid::Uuid;

use super::common::{from_millis, json_column, to_json_text, to_millis, u32_column, with_connection};
use super::manager::{map_sql_error, DbManager};

const JOB_COLUMNS: &str = "id, name, data, attempts, max_attempts, priority, dedupe_key, run_at, created_at";

/// Row counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub waiting: u64,
    pub active: u64,
    pub failed: u64,
}

pub struct SqliteJobQueue {
    db: Arc<DbManager>,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
}

impl SqliteJobQueue {
    /// `max_attempts` is the number of deliveries before a job is failed
    /// for good.
    pub fn new(db: Arc<DbManager>, clock: Arc<dyn Clock>, max_attempts: u32) -> Self {
        Self { db, clock, max_attempts: max_attempts.max(1) }
    }

    pub async fn counts(&self) -> Result<QueueCounts> {
        with_connection(&self.db, |conn| {
            let mut stmt = conn
                .prepare("SELECT status, COUNT(*) FROM jobs GROUP BY status")
                .map_err(map_sql_error)?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
                .map_err(map_sql_error)?;

            let mut counts = QueueCounts::default();
            for row in rows {
                let (status, count) = row.map_err(map_sql_error)?;
                let count = u64::try_from(count).unwrap_or_default();
                match status.parse::<JobStatus>() {
                    Ok(JobStatus::Waiting) => counts.waiting = count,
                    Ok(JobStatus::Active) => counts.active = count,
                    Ok(JobStatus::Failed) => counts.failed = count,
                    Ok(JobStatus::Completed) | Err(_) => {}
                }
            }
            Ok(counts)
        })
        .await
    }
}

fn to_chrono(duration: Duration) -> Result<chrono::Duration> {
    chrono::Duration::from_std(duration)
        .map_err(|e| StoreSyncError::Internal(format!("duration out of range: {e}")))
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    async fn enqueue(&self, request: JobRequest) -> Result<Option<String>> {
        let now = utc_now(self.clock.as_ref());
        let run_at = now + to_chrono(request.delay)?;
        let data = to_json_text(&request.data)?;
        let max_attempts = self.max_attempts;

        with_connection(&self.db, move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(map_sql_error)?;

            if let Some(key) = &request.dedupe_key {
                let pending: Option<String> = tx
                    .query_row(
                        "SELECT id FROM jobs WHERE dedupe_key = ?1 AND status IN ('waiting', 'active') LIMIT 1",
                        params![key],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(map_sql_error)?;
                if let Some(existing) = pending {
                    debug!(job_name = %request.name, dedupe_key = %key, existing_id = %existing, "job already pending");
                    return Ok(None);
                }
            }

            let id = Uuid::now_v7().to_string();
            tx.execute(
                "INSERT INTO jobs (id, name, data, priority, status, attempts, max_attempts, dedupe_key, run_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 'waiting', 0, ?5, ?6, ?7, ?8, ?8)",
                params![
                    id,
                    request.name,
                    data,
                    request.priority,
                    i64::from(max_attempts),
                    request.dedupe_key,
                    to_millis(run_at),
                    to_millis(now)
                ],
            )
            .map_err(map_sql_error)?;
            tx.commit().map_err(map_sql_error)?;

            debug!(job_id = %id, job_name = %request.name, priority = request.priority, "job enqueued");
            Ok(Some(id))
        })
        .await
    }

    async fn claim_next(&self, now: DateTime<Utc>, lease: Duration) -> Result<Option<Job>> {
        let lease_until = now + to_chrono(lease)?;

        with_connection(&self.db, move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(map_sql_error)?;

            let job = tx
                .query_row(
                    &format!(
                        "SELECT {JOB_COLUMNS} FROM jobs
                         WHERE status = 'waiting' AND run_at <= ?1
                         ORDER BY priority DESC, run_at ASC, created_at ASC
                         LIMIT 1"
                    ),
                    params![to_millis(now)],
                    map_job_row,
                )
                .optional()
                .map_err(map_sql_error)?;

            let Some(mut job) = job else {
                return Ok(None);
            };

            tx.execute(
                "UPDATE jobs SET status = 'active', attempts = attempts + 1, lease_until = ?1, updated_at = ?2
                 WHERE id = ?3",
                params![to_millis(lease_until), to_millis(now), job.id],
            )
            .map_err(map_sql_error)?;
            tx.commit().map_err(map_sql_error)?;

            job.attempts += 1;
            Ok(Some(job))
        })
        .await
    }

    async fn extend_lease(&self, job: &Job, until: DateTime<Utc>) -> Result<bool> {
        let (job_id, attempts) = (job.id.clone(), i64::from(job.attempts));
        let now = to_millis(utc_now(self.clock.as_ref()));

        with_connection(&self.db, move |conn| {
            let updated = conn
                .execute(
                    "UPDATE jobs SET lease_until = ?1, updated_at = ?2
                     WHERE id = ?3 AND status = 'active' AND attempts = ?4",
                    params![to_millis(until), now, job_id, attempts],
                )
                .map_err(map_sql_error)?;
            Ok(updated == 1)
        })
        .await
    }

    async fn complete(&self, job: &Job) -> Result<bool> {
        let (job_id, attempts) = (job.id.clone(), i64::from(job.attempts));
        with_connection(&self.db, move |conn| {
            let deleted = conn
                .execute(
                    "DELETE FROM jobs WHERE id = ?1 AND status = 'active' AND attempts = ?2",
                    params![job_id, attempts],
                )
                .map_err(map_sql_error)?;
            if deleted == 0 {
                debug!(job_id = %job_id, delivery = attempts, "completion ignored, lease not held");
            }
            Ok(deleted == 1)
        })
        .await
    }

    async fn fail(&self, job: &Job, error: &str, retry_at: Option<DateTime<Utc>>) -> Result<bool> {
        let (job_id, attempts) = (job.id.clone(), i64::from(job.attempts));
        let error = error.to_string();
        let now = to_millis(utc_now(self.clock.as_ref()));

        with_connection(&self.db, move |conn| {
            let updated = match retry_at {
                Some(at) => conn.execute(
                    "UPDATE jobs SET status = 'waiting', run_at = ?1, lease_until = NULL, last_error = ?2, updated_at = ?3
                     WHERE id = ?4 AND status = 'active' AND attempts = ?5",
                    params![to_millis(at), error, now, job_id, attempts],
                ),
                None => conn.execute(
                    "UPDATE jobs SET status = 'failed', lease_until = NULL, last_error = ?1, updated_at = ?2
                     WHERE id = ?3 AND status = 'active' AND attempts = ?4",
                    params![error, now, job_id, attempts],
                ),
            }
            .map_err(map_sql_error)?;
            if updated == 0 {
                debug!(job_id = %job_id, delivery = attempts, "failure ignored, lease not held");
            }
            Ok(updated == 1)
        })
        .await
    }

    async fn recover_stalled(&self, now: DateTime<Utc>) -> Result<u64> {
        with_connection(&self.db, move |conn| {
            let now = to_millis(now);
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(map_sql_error)?;

            let exhausted = tx
                .execute(
                    "UPDATE jobs SET status = 'failed', lease_until = NULL, last_error = 'job stalled', updated_at = ?1
                     WHERE status = 'active' AND lease_until < ?1 AND attempts >= max_attempts",
                    params![now],
                )
                .map_err(map_sql_error)?;
            let recovered = tx
                .execute(
                    "UPDATE jobs SET status = 'waiting', lease_until = NULL, run_at = ?1, updated_at = ?1
                     WHERE status = 'active' AND lease_until < ?1",
                    params![now],
                )
                .map_err(map_sql_error)?;
            tx.commit().map_err(map_sql_error)?;

            if recovered > 0 || exhausted > 0 {
                info!(recovered, exhausted, "stalled jobs released");
            }
            Ok(u64::try_from(recovered).unwrap_or_default())
        })
        .await
    }
}

fn map_job_row(row: &Row<'_>) -> rusqlite::Result<Job> {
    let data: String = row.get(2)?;
    Ok(Job {
        id: row.get(0)?,
        name: row.get(1)?,
        data: json_column(2, &data)?,
        attempts: u32_column(3, row.get(3)?)?,
        max_attempts: u32_column(4, row.get(4)?)?,
        priority: row.get(5)?,
        schedule_id: row.get(6)?,
        run_at: from_millis(7, row.get(7)?)?,
        created_at: from_millis(8, row.get(8)?)?,
    })
}
