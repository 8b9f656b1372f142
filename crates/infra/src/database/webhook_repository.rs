//! SQLite implementation of the webhook event port
//!
//! Status only moves out of `received`; both transitions bump `attempts` in
//! the same statement.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use storesync_core::WebhookEventRepository;
use storesync_domain::{Result, WebhookEvent, WebhookStatus};
use tracing::{debug, warn};

use super::common::{from_millis, opt_from_millis, to_millis, u32_column, with_connection};
use super::manager::{map_sql_error, DbManager};

pub struct SqliteWebhookEventRepository {
    db: Arc<DbManager>,
}

impl SqliteWebhookEventRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Store an event as the external receiver would
    pub async fn record_event(&self, event: &WebhookEvent) -> Result<()> {
        let event = event.clone();
        with_connection(&self.db, move |conn| {
            conn.execute(
                "INSERT INTO webhook_events (id, provider, topic, store_id, payload, status, attempts, created_at, processed_at, error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    event.id,
                    event.provider,
                    event.topic,
                    event.store_id,
                    event.payload,
                    event.status.as_str(),
                    i64::from(event.attempts),
                    to_millis(event.created_at),
                    event.processed_at.map(to_millis),
                    event.error
                ],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
    }

    pub async fn find_event(&self, id: &str) -> Result<Option<WebhookEvent>> {
        let id = id.to_string();
        with_connection(&self.db, move |conn| {
            conn.query_row(
                "SELECT id, provider, topic, store_id, payload, status, attempts, created_at, processed_at, error
                 FROM webhook_events WHERE id = ?1",
                params![id],
                map_event_row,
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
    }

    async fn transition(&self, id: &str, sql: &'static str, value: rusqlite::types::Value) -> Result<()> {
        let id = id.to_string();
        with_connection(&self.db, move |conn| {
            let changed = conn.execute(sql, params![value, id]).map_err(map_sql_error)?;
            if changed == 0 {
                debug!(event_id = %id, "webhook event no longer in received state");
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl WebhookEventRepository for SqliteWebhookEventRepository {
    async fn fetch_received(&self, provider: &str, limit: u32) -> Result<Vec<WebhookEvent>> {
        let provider = provider.to_string();
        with_connection(&self.db, move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, provider, topic, store_id, payload, status, attempts, created_at, processed_at, error
                     FROM webhook_events
                     WHERE provider = ?1 AND status = 'received'
                     ORDER BY created_at ASC, id ASC
                     LIMIT ?2",
                )
                .map_err(map_sql_error)?;
            let rows = stmt
                .query_map(params![provider, i64::from(limit)], map_event_row)
                .map_err(map_sql_error)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
        })
        .await
    }

    async fn mark_processed(&self, id: &str, processed_at: DateTime<Utc>) -> Result<()> {
        self.transition(
            id,
            "UPDATE webhook_events
             SET status = 'processed', processed_at = ?1, error = NULL, attempts = attempts + 1
             WHERE id = ?2 AND status = 'received'",
            rusqlite::types::Value::Integer(to_millis(processed_at)),
        )
        .await
    }

    async fn mark_failed(&self, id: &str, error: &str) -> Result<()> {
        self.transition(
            id,
            "UPDATE webhook_events
             SET status = 'failed', error = ?1, attempts = attempts + 1
             WHERE id = ?2 AND status = 'received'",
            rusqlite::types::Value::Text(error.to_string()),
        )
        .await
    }
}

fn map_event_row(row: &Row<'_>) -> rusqlite::Result<WebhookEvent> {
    let id: String = row.get(0)?;
    let raw_status: String = row.get(5)?;
    let status = raw_status.parse::<WebhookStatus>().unwrap_or_else(|err| {
        warn!(event_id = %id, raw_status = %raw_status, error = %err, "invalid webhook status, treating as failed");
        WebhookStatus::Failed
    });

    Ok(WebhookEvent {
        id,
        provider: row.get(1)?,
        topic: row.get(2)?,
        store_id: row.get(3)?,
        payload: row.get(4)?,
        status,
        attempts: u32_column(6, row.get(6)?)?,
        created_at: from_millis(7, row.get(7)?)?,
        processed_at: opt_from_millis(8, row.get(8)?)?,
        error: row.get(9)?,
    })
}
