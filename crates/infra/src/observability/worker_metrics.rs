//! Prometheus exporter for worker job and sync-lag metrics

use std::time::Duration;

use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use storesync_core::{JobOutcome, WorkerMetricsPort};
use storesync_domain::EntityType;
use tracing::warn;

const DURATION_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0];

/// Worker metrics registered on a private [`Registry`]
pub struct PrometheusWorkerMetrics {
    registry: Registry,
    /// Finished jobs by name and terminal status
    jobs_processed: CounterVec,
    /// Wall time of one job execution, retries included
    job_duration: HistogramVec,
    /// Seconds a (store, entity) pair is behind upstream
    sync_lag: GaugeVec,
}

impl PrometheusWorkerMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let jobs_processed = CounterVec::new(
            Opts::new("worker_jobs_processed_total", "Total number of jobs processed"),
            &["job_name", "status"],
        )?;
        registry.register(Box::new(jobs_processed.clone()))?;

        let job_duration = HistogramVec::new(
            HistogramOpts::new("job_duration_seconds", "Job execution time in seconds")
                .buckets(DURATION_BUCKETS.to_vec()),
            &["job_name"],
        )?;
        registry.register(Box::new(job_duration.clone()))?;

        let sync_lag = GaugeVec::new(
            Opts::new("sync_lag_seconds", "Seconds since the last successful sync sweep"),
            &["store_id", "entity"],
        )?;
        registry.register(Box::new(sync_lag.clone()))?;

        Ok(Self { registry, jobs_processed, job_duration, sync_lag })
    }

    /// Text exposition of everything registered
    pub fn render(&self) -> String {
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&families, &mut buffer) {
            warn!(error = %e, "failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_else(|e| {
            warn!(error = %e, "metrics exposition was not UTF-8");
            String::new()
        })
    }

    pub fn content_type(&self) -> &'static str {
        prometheus::TEXT_FORMAT
    }
}

impl WorkerMetricsPort for PrometheusWorkerMetrics {
    fn record_job(&self, job_name: &str, outcome: JobOutcome, duration: Duration) {
        match self.jobs_processed.get_metric_with_label_values(&[job_name, outcome.as_str()]) {
            Ok(counter) => counter.inc(),
            Err(e) => warn!(job_name, error = %e, "failed to record job counter"),
        }
        match self.job_duration.get_metric_with_label_values(&[job_name]) {
            Ok(histogram) => histogram.observe(duration.as_secs_f64()),
            Err(e) => warn!(job_name, error = %e, "failed to record job duration"),
        }
    }

    fn set_sync_lag(&self, store_id: &str, entity: EntityType, lag_seconds: f64) {
        match self.sync_lag.get_metric_with_label_values(&[store_id, entity.as_str()]) {
            Ok(gauge) => gauge.set(lag_seconds),
            Err(e) => warn!(store_id, %entity, error = %e, "failed to set sync lag"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposes_job_and_lag_series() {
        let metrics = PrometheusWorkerMetrics::new().unwrap();
        metrics.record_job("cleanup-cache", JobOutcome::Success, Duration::from_millis(120));
        metrics.record_job("cleanup-cache", JobOutcome::Failed, Duration::from_millis(80));
        metrics.set_sync_lag("store-1", EntityType::Orders, 0.0);

        let text = metrics.render();
        assert!(text.contains(
            "worker_jobs_processed_total{job_name=\"cleanup-cache\",status=\"success\"} 1"
        ));
        assert!(text.contains(
            "worker_jobs_processed_total{job_name=\"cleanup-cache\",status=\"failed\"} 1"
        ));
        assert!(text.contains("job_duration_seconds_count{job_name=\"cleanup-cache\"} 2"));
        assert!(text.contains("sync_lag_seconds{entity=\"orders\",store_id=\"store-1\"} 0"));
    }

    #[test]
    fn registries_are_independent() {
        let first = PrometheusWorkerMetrics::new().unwrap();
        let second = PrometheusWorkerMetrics::new().unwrap();
        first.record_job("woo-schedule", JobOutcome::Success, Duration::from_secs(1));
        assert!(!second.render().contains("woo-schedule"));
    }
}
