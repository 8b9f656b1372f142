//! Cache and session housekeeping handlers

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use storesync_common::Clock;
use storesync_domain::constants::{CACHE_DEFAULT_TTL_SECS, CACHE_KEY_PATTERN};
use storesync_domain::{Job, JobName, Result};
use tracing::info;

use crate::clock::utc_now;
use crate::jobs::ports::JobHandler;
use crate::maintenance::ports::{CacheJanitor, SessionRepository};

/// `cleanup-cache`
pub struct CleanupCacheHandler {
    janitor: Arc<dyn CacheJanitor>,
}

impl CleanupCacheHandler {
    pub fn new(janitor: Arc<dyn CacheJanitor>) -> Self {
        Self { janitor }
    }
}

#[async_trait]
impl JobHandler for CleanupCacheHandler {
    fn name(&self) -> JobName {
        JobName::CleanupCache
    }

    async fn handle(&self, _job: &Job) -> Result<Value> {
        let touched = self.janitor.expire_untimed_keys(CACHE_KEY_PATTERN, CACHE_DEFAULT_TTL_SECS).await?;
        info!(touched, "Cache keys given a TTL");
        Ok(json!({ "success": true, "keysExpired": touched }))
    }
}

/// `cleanup-sessions`
pub struct CleanupSessionsHandler {
    sessions: Arc<dyn SessionRepository>,
    clock: Arc<dyn Clock>,
}

impl CleanupSessionsHandler {
    pub fn new(sessions: Arc<dyn SessionRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { sessions, clock }
    }
}

#[async_trait]
impl JobHandler for CleanupSessionsHandler {
    fn name(&self) -> JobName {
        JobName::CleanupSessions
    }

    async fn handle(&self, _job: &Job) -> Result<Value> {
        let deleted = self.sessions.delete_expired_sessions(utc_now(self.clock.as_ref())).await?;
        info!(deleted, "Expired sessions removed");
        Ok(json!({ "success": true, "sessionsDeleted": deleted }))
    }
}
