//! Observability infrastructure
//!
//! Job counters, duration histograms and the sync-lag gauge are kept on a
//! private Prometheus registry and exposed by the worker's `/metrics` route.
//! Recording never fails the caller: exporter problems are logged with
//! `warn!` and the sample is dropped.

pub mod worker_metrics;

pub use worker_metrics::PrometheusWorkerMetrics;
