//! Configuration structures
//!
//! Every section deserializes with defaults, so a partial TOML/JSON file or
//! an empty environment yields a runnable configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BIND_ADDR, DEFAULT_BREAKER_COOLDOWN_SECS, DEFAULT_BREAKER_FAILURE_THRESHOLD,
    DEFAULT_BREAKER_SUCCESS_THRESHOLD, DEFAULT_DATABASE_PATH, DEFAULT_DATABASE_POOL_SIZE,
    DEFAULT_LEASE_SECS, DEFAULT_LOOKBACK_DAYS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_PAGES,
    DEFAULT_PAGE_DELAY_MS, DEFAULT_PAGE_SIZE, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_QUEUE_BACKOFF_MS, DEFAULT_QUEUE_MAX_ATTEMPTS, DEFAULT_REDIS_URL,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_RETRY_DELAY_MS, DEFAULT_SCHEDULE_TICK,
    DEFAULT_SHUTDOWN_TIMEOUT_SECS, DEFAULT_START_RATE_PER_SEC, DEFAULT_UPSTREAM_RATE_LIMIT,
    DEFAULT_UPSTREAM_RATE_WINDOW_MS, DEFAULT_WEBHOOK_BATCH_SIZE, DEFAULT_WORKER_CONCURRENCY,
};
use crate::errors::{Result, StoreSyncError};

/// Top-level worker configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub worker: WorkerConfig,
    pub sync: SyncConfig,
    pub breaker: BreakerConfig,
    pub server: ServerConfig,
    pub log: LogConfig,
}

impl Config {
    /// Reject values the runtime cannot operate with
    pub fn validate(&self) -> Result<()> {
        let checks: [(bool, &str); 9] = [
            (self.database.path.trim().is_empty(), "database.path must not be empty"),
            (self.database.pool_size == 0, "database.pool_size must be greater than 0"),
            (self.worker.concurrency == 0, "worker.concurrency must be greater than 0"),
            (self.worker.start_rate_per_sec == 0, "worker.start_rate_per_sec must be greater than 0"),
            (self.worker.max_attempts == 0, "worker.max_attempts must be greater than 0"),
            (self.sync.page_size == 0, "sync.page_size must be greater than 0"),
            (self.sync.max_pages == 0, "sync.max_pages must be greater than 0"),
            (self.breaker.failure_threshold == 0, "breaker.failure_threshold must be greater than 0"),
            (self.breaker.success_threshold == 0, "breaker.success_threshold must be greater than 0"),
        ];
        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, message)) => Err(StoreSyncError::Config((*message).to_string())),
            None => Ok(()),
        }
    }
}

/// SQLite database settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: DEFAULT_DATABASE_PATH.to_string(), pool_size: DEFAULT_DATABASE_POOL_SIZE }
    }
}

/// Shared rate-limit store and cache connection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
    /// Optional prefix applied to rate-limit keys
    pub key_prefix: Option<String>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self { url: DEFAULT_REDIS_URL.to_string(), key_prefix: None }
    }
}

/// Job runtime and queue policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkerConfig {
    /// Jobs running at once
    pub concurrency: usize,
    /// Jobs started per second across the pool
    pub start_rate_per_sec: u64,
    /// Handler attempts within one execution
    pub max_attempts: u32,
    /// Linear delay unit between in-execution attempts
    pub retry_delay_ms: u64,
    /// Deliveries per job before the queue marks it failed
    pub queue_max_attempts: u32,
    /// Base of the queue's exponential redelivery backoff
    pub queue_backoff_ms: u64,
    pub poll_interval_ms: u64,
    /// How long a claimed job may run before it counts as stalled
    pub lease_secs: u64,
    pub shutdown_timeout_secs: u64,
    /// Six-field cron for the schedule ticker
    pub schedule_tick: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_WORKER_CONCURRENCY,
            start_rate_per_sec: DEFAULT_START_RATE_PER_SEC,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            queue_max_attempts: DEFAULT_QUEUE_MAX_ATTEMPTS,
            queue_backoff_ms: DEFAULT_QUEUE_BACKOFF_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            lease_secs: DEFAULT_LEASE_SECS,
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            schedule_tick: DEFAULT_SCHEDULE_TICK.to_string(),
        }
    }
}

impl WorkerConfig {
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub const fn queue_backoff(&self) -> Duration {
        Duration::from_millis(self.queue_backoff_ms)
    }

    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub const fn lease(&self) -> Duration {
        Duration::from_secs(self.lease_secs)
    }

    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Upstream pull and reconciliation settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
    pub page_size: u32,
    pub max_pages: u32,
    pub page_delay_ms: u64,
    /// Cursor default when a store has never been synced
    pub lookback_days: i64,
    pub webhook_batch_size: u32,
    pub request_timeout_secs: u64,
    /// Calls per window per store credential
    pub upstream_rate_limit: u32,
    pub upstream_rate_window_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            page_delay_ms: DEFAULT_PAGE_DELAY_MS,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            webhook_batch_size: DEFAULT_WEBHOOK_BATCH_SIZE,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            upstream_rate_limit: DEFAULT_UPSTREAM_RATE_LIMIT,
            upstream_rate_window_ms: DEFAULT_UPSTREAM_RATE_WINDOW_MS,
        }
    }
}

impl SyncConfig {
    pub const fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub const fn upstream_rate_window(&self) -> Duration {
        Duration::from_millis(self.upstream_rate_window_ms)
    }

    pub fn lookback(&self) -> chrono::Duration {
        chrono::Duration::days(self.lookback_days)
    }
}

/// Per-credential circuit breaker thresholds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub cooldown_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_BREAKER_FAILURE_THRESHOLD,
            success_threshold: DEFAULT_BREAKER_SUCCESS_THRESHOLD,
            cooldown_secs: DEFAULT_BREAKER_COOLDOWN_SECS,
        }
    }
}

impl BreakerConfig {
    pub const fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// Operational HTTP surface
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_addr: DEFAULT_BIND_ADDR.to_string() }
    }
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}
