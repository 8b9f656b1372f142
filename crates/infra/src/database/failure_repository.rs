//! Dead-letter audit rows for exhausted jobs

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Row};
use storesync_core::JobFailureRepository;
use storesync_domain::{JobFailure, Result};

use super::common::{from_millis, json_column, to_json_text, to_millis, u32_column, with_connection};
use super::manager::{map_sql_error, DbManager};

pub struct SqliteJobFailureRepository {
    db: Arc<DbManager>,
}

impl SqliteJobFailureRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl JobFailureRepository for SqliteJobFailureRepository {
    async fn record_failure(&self, failure: &JobFailure) -> Result<()> {
        let failure = failure.clone();
        let payload = to_json_text(&failure.payload)?;
        with_connection(&self.db, move |conn| {
            conn.execute(
                "INSERT INTO job_failures (id, job_id, job_name, payload, error_kind, error, attempt_count, failed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    failure.id,
                    failure.job_id,
                    failure.job_name,
                    payload,
                    failure.error_kind,
                    failure.error,
                    i64::from(failure.attempt_count),
                    to_millis(failure.failed_at)
                ],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
    }

    async fn list_failures(&self, limit: u32) -> Result<Vec<JobFailure>> {
        with_connection(&self.db, move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, job_id, job_name, payload, error_kind, error, attempt_count, failed_at
                     FROM job_failures ORDER BY failed_at DESC, id DESC LIMIT ?1",
                )
                .map_err(map_sql_error)?;
            let rows = stmt.query_map(params![i64::from(limit)], map_failure_row).map_err(map_sql_error)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
        })
        .await
    }
}

fn map_failure_row(row: &Row<'_>) -> rusqlite::Result<JobFailure> {
    let payload: String = row.get(3)?;
    Ok(JobFailure {
        id: row.get(0)?,
        job_id: row.get(1)?,
        job_name: row.get(2)?,
        payload: json_column(3, &payload)?,
        error_kind: row.get(4)?,
        error: row.get(5)?,
        attempt_count: u32_column(6, row.get(6)?)?,
        failed_at: from_millis(7, row.get(7)?)?,
    })
}
