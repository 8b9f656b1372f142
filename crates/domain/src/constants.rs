//! Application constants
//!
//! Defaults for every tunable live here; [`crate::config`] falls back to
//! them when a value is not configured.

// Upstream pull
pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const DEFAULT_MAX_PAGES: u32 = 100;
pub const DEFAULT_PAGE_DELAY_MS: u64 = 100;
pub const DEFAULT_LOOKBACK_DAYS: i64 = 7;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_API_VERSION: &str = "v3";
pub const ORDER_SOURCE_WOO: &str = "woo";
pub const DEFAULT_ORDER_STATUS: &str = "pending";
pub const DEFAULT_CURRENCY: &str = "TRY";

// Upstream credential budget
pub const UPSTREAM_PROVIDER: &str = "woo";
pub const DEFAULT_UPSTREAM_RATE_LIMIT: u32 = 100;
pub const DEFAULT_UPSTREAM_RATE_WINDOW_MS: u64 = 60_000;

// Webhook reconciliation
pub const WEBHOOK_PROVIDER: &str = "woocommerce";
pub const DEFAULT_WEBHOOK_BATCH_SIZE: u32 = 50;
pub const MAX_ERROR_LENGTH: usize = 1_024;

// Circuit breaker
pub const DEFAULT_BREAKER_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_BREAKER_SUCCESS_THRESHOLD: u32 = 2;
pub const DEFAULT_BREAKER_COOLDOWN_SECS: u64 = 30;

// Job runtime
pub const DEFAULT_WORKER_CONCURRENCY: usize = 20;
pub const DEFAULT_START_RATE_PER_SEC: u64 = 50;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 5_000;
pub const DEFAULT_QUEUE_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_QUEUE_BACKOFF_MS: u64 = 2_000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_LEASE_SECS: u64 = 300;
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SCHEDULE_TICK: &str = "0 * * * * *";

// Maintenance
pub const CACHE_KEY_PATTERN: &str = "cache:*";
pub const CACHE_DEFAULT_TTL_SECS: i64 = 3_600;

// Recurring schedules
pub const ORDERS_SYNC_PATTERN: &str = "*/10 * * * *";
pub const PRODUCTS_SYNC_PATTERN: &str = "*/30 * * * *";
pub const WEBHOOK_EVENTS_PATTERN: &str = "*/1 * * * *";
pub const WOO_SCHEDULE_PATTERN: &str = "*/15 * * * *";
pub const CLEANUP_CACHE_PATTERN: &str = "0 * * * *";
pub const CLEANUP_SESSIONS_PATTERN: &str = "0 */6 * * *";

// Server
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:9464";
pub const DEFAULT_DATABASE_PATH: &str = "storesync.db";
pub const DEFAULT_DATABASE_POOL_SIZE: u32 = 8;
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
