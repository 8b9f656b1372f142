//! Recurring schedules keyed by a stable id

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use storesync_core::ScheduleRepository;
use storesync_domain::{RecurringSchedule, Result};

use super::common::{bool_to_int, from_millis, int_to_bool, json_column, to_json_text, to_millis, with_connection};
use super::manager::{map_sql_error, DbManager};

const SCHEDULE_COLUMNS: &str = "id, job_name, data, pattern, priority, next_run_at, enabled";

pub struct SqliteScheduleRepository {
    db: Arc<DbManager>,
}

impl SqliteScheduleRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    async fn query(&self, sql: String, now: Option<i64>) -> Result<Vec<RecurringSchedule>> {
        with_connection(&self.db, move |conn| {
            let mut stmt = conn.prepare(&sql).map_err(map_sql_error)?;
            let rows = match now {
                Some(now) => stmt.query_map(params![now], map_schedule_row),
                None => stmt.query_map([], map_schedule_row),
            }
            .map_err(map_sql_error)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
        })
        .await
    }
}

#[async_trait]
impl ScheduleRepository for SqliteScheduleRepository {
    async fn upsert_schedule(&self, schedule: &RecurringSchedule) -> Result<()> {
        let schedule = schedule.clone();
        let data = to_json_text(&schedule.data)?;
        with_connection(&self.db, move |conn| {
            // SET expressions see the pre-update row, so the CASE compares
            // against the stored pattern.
            conn.execute(
                &format!(
                    "INSERT INTO job_schedules ({SCHEDULE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(id) DO UPDATE SET
                        job_name = excluded.job_name,
                        data = excluded.data,
                        priority = excluded.priority,
                        enabled = excluded.enabled,
                        next_run_at = CASE WHEN job_schedules.pattern = excluded.pattern
                                           THEN job_schedules.next_run_at
                                           ELSE excluded.next_run_at END,
                        pattern = excluded.pattern"
                ),
                params![
                    schedule.id,
                    schedule.job_name,
                    data,
                    schedule.pattern,
                    schedule.priority,
                    to_millis(schedule.next_run_at),
                    bool_to_int(schedule.enabled)
                ],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
    }

    async fn list_schedules(&self) -> Result<Vec<RecurringSchedule>> {
        self.query(format!("SELECT {SCHEDULE_COLUMNS} FROM job_schedules ORDER BY id"), None).await
    }

    async fn due_schedules(&self, now: DateTime<Utc>) -> Result<Vec<RecurringSchedule>> {
        self.query(
            format!(
                "SELECT {SCHEDULE_COLUMNS} FROM job_schedules
                 WHERE enabled = 1 AND next_run_at <= ?1
                 ORDER BY priority DESC, id ASC"
            ),
            Some(to_millis(now)),
        )
        .await
    }

    async fn set_next_run(&self, id: &str, next_run_at: DateTime<Utc>) -> Result<()> {
        let id = id.to_string();
        with_connection(&self.db, move |conn| {
            conn.execute(
                "UPDATE job_schedules SET next_run_at = ?1 WHERE id = ?2",
                params![to_millis(next_run_at), id],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
    }

    async fn remove_schedule(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        with_connection(&self.db, move |conn| {
            let removed = conn
                .execute("DELETE FROM job_schedules WHERE id = ?1", params![id])
                .map_err(map_sql_error)?;
            Ok(removed > 0)
        })
        .await
    }
}

fn map_schedule_row(row: &Row<'_>) -> rusqlite::Result<RecurringSchedule> {
    let data: String = row.get(2)?;
    Ok(RecurringSchedule {
        id: row.get(0)?,
        job_name: row.get(1)?,
        data: json_column(2, &data)?,
        pattern: row.get(3)?,
        priority: row.get(4)?,
        next_run_at: from_millis(5, row.get(5)?)?,
        enabled: int_to_bool(row.get(6)?),
    })
}
