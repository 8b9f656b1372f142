//! Incremental synchronization: pull sweeps and webhook reconciliation

pub mod engine;
pub mod mapping;
pub mod ports;
pub mod webhooks;

pub use engine::{PullReport, SyncEngine, SyncSettings};
pub use mapping::{map_order, map_product};
pub use webhooks::{ReconcileReport, WebhookReconciler};
