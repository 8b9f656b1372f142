//! # StoreSync Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits) for storage, upstream, queue and metrics
//! - The sync engine (cursor pull sweeps and webhook reconciliation)
//! - The job runtime (handler registry, in-execution retry, failure audit)
//! - Job handlers and the recurring schedule catalogue
//!
//! ## Architecture Principles
//! - Only depends on `storesync-common` and `storesync-domain`
//! - No database, HTTP, or Redis code
//! - All external dependencies via traits

pub mod clock;
pub mod jobs;
pub mod maintenance;
pub mod sync;

// Infrastructure ports
pub mod metrics_ports;

// Re-export specific items to avoid ambiguity
pub use jobs::ports::{JobFailureRepository, JobHandler, JobQueue, ScheduleRepository};
pub use jobs::{JobRuntime, RecurringCatalog, RetryPolicy};
pub use maintenance::ports::{CacheJanitor, ReportRepository, RequestRepository, SessionRepository};
pub use metrics_ports::{JobOutcome, WorkerMetricsPort};
pub use sync::ports::{
    OrderRepository, PageRequest, ProductRepository, StoreRepository, UpstreamCatalog,
    WebhookEventRepository,
};
pub use sync::{PullReport, ReconcileReport, SyncEngine, SyncSettings, WebhookReconciler};
