//! Change requests and the stock movements they produce

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};
use storesync_core::RequestRepository;
use storesync_domain::{ChangeRequest, RequestKind, RequestStatus, Result, StoreSyncError};
use tracing::{debug, warn};
use uuid::Uuid;

use super::common::{json_column, opt_from_millis, to_json_text, to_millis, with_connection};
use super::manager::{map_sql_error, DbManager};

const REQUEST_COLUMNS: &str =
    "id, tenant_id, kind, payload, status, reviewer_user_id, reviewed_at, applied_at";

pub struct SqliteRequestRepository {
    db: Arc<DbManager>,
}

impl SqliteRequestRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Store a request as the operator API would
    pub async fn save_request(&self, request: &ChangeRequest) -> Result<()> {
        let request = request.clone();
        let payload = to_json_text(&request.payload)?;
        with_connection(&self.db, move |conn| {
            conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO change_requests ({REQUEST_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
                ),
                params![
                    request.id,
                    request.tenant_id,
                    request.kind.code(),
                    payload,
                    request.status.as_str(),
                    request.reviewer_user_id,
                    request.reviewed_at.map(to_millis),
                    request.applied_at.map(to_millis)
                ],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl RequestRepository for SqliteRequestRepository {
    async fn find_request(&self, request_id: &str) -> Result<Option<ChangeRequest>> {
        let request_id = request_id.to_string();
        with_connection(&self.db, move |conn| {
            conn.query_row(
                &format!("SELECT {REQUEST_COLUMNS} FROM change_requests WHERE id = ?1"),
                params![request_id],
                map_request_row,
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
    }

    async fn update_status(
        &self,
        request_id: &str,
        status: RequestStatus,
        reviewer_user_id: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let request_id = request_id.to_string();
        let reviewer = reviewer_user_id.map(str::to_string);
        let sql = match status {
            RequestStatus::Applied => {
                "UPDATE change_requests SET status = ?1, reviewer_user_id = COALESCE(?2, reviewer_user_id), applied_at = ?3
                 WHERE id = ?4"
            }
            _ => {
                "UPDATE change_requests SET status = ?1, reviewer_user_id = COALESCE(?2, reviewer_user_id), reviewed_at = ?3
                 WHERE id = ?4"
            }
        };

        with_connection(&self.db, move |conn| {
            let changed = conn
                .execute(sql, params![status.as_str(), reviewer, to_millis(at), request_id])
                .map_err(map_sql_error)?;
            if changed == 0 {
                return Err(StoreSyncError::NotFound(format!("request {request_id}")));
            }
            Ok(())
        })
        .await
    }

    async fn apply_stock_adjustment(
        &self,
        request_id: &str,
        product_id: &str,
        quantity: i64,
        reason: Option<&str>,
    ) -> Result<()> {
        let request_id = request_id.to_string();
        let product_id = product_id.to_string();
        let reason = reason.map(str::to_string);

        with_connection(&self.db, move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(map_sql_error)?;

            // One movement per request; a redelivered approval is a no-op
            let inserted = tx
                .execute(
                    "INSERT OR IGNORE INTO stock_movements (id, request_id, product_id, quantity, reason, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        Uuid::now_v7().to_string(),
                        request_id,
                        product_id,
                        quantity,
                        reason,
                        to_millis(Utc::now())
                    ],
                )
                .map_err(map_sql_error)?;
            if inserted == 0 {
                debug!(request_id = %request_id, "stock movement already recorded");
                return Ok(());
            }

            let updated = tx
                .execute(
                    "UPDATE products SET stock = COALESCE(stock, 0) + ?1, updated_at = ?2 WHERE id = ?3",
                    params![quantity, to_millis(Utc::now()), product_id],
                )
                .map_err(map_sql_error)?;
            if updated == 0 {
                return Err(StoreSyncError::NotFound(format!("product {product_id}")));
            }

            tx.commit().map_err(map_sql_error)?;
            Ok(())
        })
        .await
    }
}

fn map_request_row(row: &Row<'_>) -> rusqlite::Result<ChangeRequest> {
    let id: String = row.get(0)?;
    let kind: String = row.get(2)?;
    let payload: String = row.get(3)?;
    let raw_status: String = row.get(4)?;
    let status = raw_status.parse::<RequestStatus>().unwrap_or_else(|err| {
        warn!(request_id = %id, raw_status = %raw_status, error = %err, "invalid request status, treating as pending");
        RequestStatus::Pending
    });

    Ok(ChangeRequest {
        id,
        tenant_id: row.get(1)?,
        kind: RequestKind::from_code(&kind),
        payload: json_column(3, &payload)?,
        status,
        reviewer_user_id: row.get(5)?,
        reviewed_at: opt_from_millis(6, row.get(6)?)?,
        applied_at: opt_from_millis(7, row.get(7)?)?,
    })
}
