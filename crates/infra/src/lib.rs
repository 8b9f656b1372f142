//! # StoreSync Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - SQLite repositories and the durable job queue (r2d2 pool)
//! - Redis sliding-window store and cache janitor
//! - WooCommerce HTTP client guarded by rate limiter and circuit breakers
//! - Prometheus metrics, the schedule ticker and the worker pool
//! - Configuration loading and the health probe
//!
//! ## Architecture
//! - Implements traits defined in `storesync-core`
//! - Depends on `storesync-common`, `storesync-domain` and `storesync-core`
//! - Contains all "impure" code (I/O, timers, network)

pub mod cache;
pub mod config;
pub mod database;
pub mod errors;
pub mod health;
pub mod integrations;
pub mod observability;
pub mod scheduling;
pub mod worker;

// Re-export commonly used items
pub use cache::{RedisCacheJanitor, RedisWindowStore};
pub use database::*;
pub use errors::InfraError;
pub use health::{HealthProbe, HealthReport, HealthStatus};
pub use integrations::WooClient;
pub use observability::PrometheusWorkerMetrics;
pub use scheduling::{ScheduleTicker, ScheduleTickerConfig, SchedulerError, SchedulerResult};
pub use worker::{JobWorker, JobWorkerConfig};
