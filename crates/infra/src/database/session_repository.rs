//! Expired session cleanup

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::params;
use storesync_core::SessionRepository;
use storesync_domain::Result;

use super::common::{to_millis, with_connection};
use super::manager::{map_sql_error, DbManager};

pub struct SqliteSessionRepository {
    db: Arc<DbManager>,
}

impl SqliteSessionRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionRepository for SqliteSessionRepository {
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        with_connection(&self.db, move |conn| {
            let deleted = conn
                .execute("DELETE FROM sessions WHERE expires_at < ?1", params![to_millis(now)])
                .map_err(map_sql_error)?;
            Ok(u64::try_from(deleted).unwrap_or_default())
        })
        .await
    }
}
