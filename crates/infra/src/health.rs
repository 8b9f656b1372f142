//! Liveness probe: runtime alive, database reachable, rate-limit store
//! reachable. Cursor age, open circuits and queue depth are reported
//! alongside but do not affect liveness.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use storesync_common::{CircuitBreakerRegistry, Clock, SlidingWindowLimiter};
use storesync_core::clock::utc_now;
use tracing::warn;

use crate::database::{DbManager, SqliteJobQueue, SqliteStoreRepository};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Unavailable,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QueueDepth {
    pub waiting: u64,
    pub active: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub runtime: bool,
    pub database: bool,
    pub rate_limit_store: bool,
    /// Seconds since the stalest cursor of any active store
    pub oldest_cursor_age_secs: Option<i64>,
    pub open_circuits: Vec<String>,
    pub queue: Option<QueueDepth>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Ok
    }
}

pub struct HealthProbe {
    db: Arc<DbManager>,
    stores: Arc<SqliteStoreRepository>,
    queue: Arc<SqliteJobQueue>,
    limiter: SlidingWindowLimiter,
    breakers: Arc<CircuitBreakerRegistry>,
    clock: Arc<dyn Clock>,
    runtime_alive: AtomicBool,
}

impl HealthProbe {
    pub fn new(
        db: Arc<DbManager>,
        stores: Arc<SqliteStoreRepository>,
        queue: Arc<SqliteJobQueue>,
        limiter: SlidingWindowLimiter,
        breakers: Arc<CircuitBreakerRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            stores,
            queue,
            limiter,
            breakers,
            clock,
            runtime_alive: AtomicBool::new(false),
        }
    }

    /// Flip once the worker pool and ticker are running, and back on shutdown
    pub fn set_runtime_alive(&self, alive: bool) {
        self.runtime_alive.store(alive, Ordering::SeqCst);
    }

    pub async fn check(&self) -> HealthReport {
        let runtime = self.runtime_alive.load(Ordering::SeqCst);

        let db = Arc::clone(&self.db);
        let database = match tokio::task::spawn_blocking(move || db.health_check()).await {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                warn!(error = %err, "database health check failed");
                false
            }
            Err(err) => {
                warn!(error = %err, "database health check task failed");
                false
            }
        };

        let rate_limit_store = match self.limiter.ping().await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "rate limit store health check failed");
                false
            }
        };

        let now = utc_now(self.clock.as_ref());
        let oldest_cursor_age_secs = if database {
            match self.stores.oldest_cursor().await {
                Ok(cursor) => cursor.map(|at| (now - at).num_seconds().max(0)),
                Err(err) => {
                    warn!(error = %err, "failed to read store cursors");
                    None
                }
            }
        } else {
            None
        };

        let queue = if database {
            self.queue
                .counts()
                .await
                .map(|c| QueueDepth { waiting: c.waiting, active: c.active, failed: c.failed })
                .map_err(|err| warn!(error = %err, "failed to read queue depth"))
                .ok()
        } else {
            None
        };

        let mut open_circuits = self.breakers.open_keys();
        open_circuits.sort();

        let status = if runtime && database && rate_limit_store {
            HealthStatus::Ok
        } else {
            HealthStatus::Unavailable
        };

        HealthReport {
            status,
            runtime,
            database,
            rate_limit_store,
            oldest_cursor_age_secs,
            open_circuits,
            queue,
        }
    }
}
