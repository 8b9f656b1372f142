//! SQLite implementation of the store port, including cursor advance

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};
use storesync_core::StoreRepository;
use storesync_domain::{EntityType, Result, StoreSyncError, SyncCursor, WooStore};
use tracing::{debug, warn};

use super::common::{bool_to_int, int_to_bool, with_connection};
use super::manager::{map_sql_error, DbManager};

const STORE_COLUMNS: &str =
    "id, tenant_id, name, base_url, api_version, consumer_key, consumer_secret, active, last_sync";

pub struct SqliteStoreRepository {
    db: Arc<DbManager>,
}

impl SqliteStoreRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Insert or replace a store record. Used by provisioning and tests; the
    /// worker itself only reads stores and advances cursors.
    pub async fn save_store(&self, store: &WooStore) -> Result<()> {
        let store = store.clone();
        let cursor = store.last_sync.to_json()?;
        with_connection(&self.db, move |conn| {
            conn.execute(
                "INSERT INTO woo_stores (id, tenant_id, name, base_url, api_version, consumer_key, consumer_secret, active, last_sync)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(id) DO UPDATE SET
                    tenant_id = excluded.tenant_id,
                    name = excluded.name,
                    base_url = excluded.base_url,
                    api_version = excluded.api_version,
                    consumer_key = excluded.consumer_key,
                    consumer_secret = excluded.consumer_secret,
                    active = excluded.active,
                    last_sync = excluded.last_sync",
                params![
                    store.id,
                    store.tenant_id,
                    store.name,
                    store.base_url,
                    store.api_version,
                    store.consumer_key,
                    store.consumer_secret,
                    bool_to_int(store.active),
                    cursor,
                ],
            )
            .map_err(map_sql_error)?;
            Ok(())
        })
        .await
    }

    /// Oldest cursor among active stores, used for the health lag report.
    pub async fn oldest_cursor(&self) -> Result<Option<DateTime<Utc>>> {
        let stores = self.list_active_stores().await?;
        Ok(stores
            .iter()
            .flat_map(|store| [EntityType::Orders, EntityType::Products].map(|e| store.last_sync.get(e)))
            .flatten()
            .min())
    }
}

#[async_trait]
impl StoreRepository for SqliteStoreRepository {
    async fn find_store(&self, store_id: &str) -> Result<Option<WooStore>> {
        let store_id = store_id.to_string();
        with_connection(&self.db, move |conn| {
            conn.query_row(
                &format!("SELECT {STORE_COLUMNS} FROM woo_stores WHERE id = ?1"),
                params![store_id],
                map_store_row,
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
    }

    async fn list_active_stores(&self) -> Result<Vec<WooStore>> {
        with_connection(&self.db, |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {STORE_COLUMNS} FROM woo_stores WHERE active = 1 ORDER BY id"
                ))
                .map_err(map_sql_error)?;
            let rows = stmt.query_map([], map_store_row).map_err(map_sql_error)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
        })
        .await
    }

    async fn advance_cursor(
        &self,
        store_id: &str,
        entity: EntityType,
        to: DateTime<Utc>,
    ) -> Result<bool> {
        let store_id = store_id.to_string();
        with_connection(&self.db, move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(map_sql_error)?;

            let raw: Option<String> = tx
                .query_row(
                    "SELECT last_sync FROM woo_stores WHERE id = ?1",
                    params![store_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(map_sql_error)?
                .ok_or_else(|| StoreSyncError::NotFound(format!("store {store_id}")))?;

            let mut cursor = SyncCursor::from_json(raw.as_deref()).unwrap_or_else(|err| {
                warn!(store_id = %store_id, error = %err, "replacing unreadable sync cursor");
                SyncCursor::default()
            });
            if !cursor.advance(entity, to) {
                debug!(store_id = %store_id, entity = %entity, "cursor already at or past sweep start");
                return Ok(false);
            }

            tx.execute(
                "UPDATE woo_stores SET last_sync = ?1 WHERE id = ?2",
                params![cursor.to_json()?, store_id],
            )
            .map_err(map_sql_error)?;
            tx.commit().map_err(map_sql_error)?;
            Ok(true)
        })
        .await
    }
}

fn map_store_row(row: &Row<'_>) -> rusqlite::Result<WooStore> {
    let id: String = row.get(0)?;
    let raw_cursor: Option<String> = row.get(8)?;
    let last_sync = match SyncCursor::from_json(raw_cursor.as_deref()) {
        Ok(cursor) => cursor,
        Err(err) => {
            warn!(store_id = %id, error = %err, "unreadable sync cursor, treating store as never synced");
            SyncCursor::default()
        }
    };

    Ok(WooStore {
        id,
        tenant_id: row.get(1)?,
        name: row.get(2)?,
        base_url: row.get(3)?,
        api_version: row.get(4)?,
        consumer_key: row.get(5)?,
        consumer_secret: row.get(6)?,
        active: int_to_bool(row.get(7)?),
        last_sync,
    })
}
