//! `/health` and `/metrics` routes over real adapters

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use storesync_common::{
    CircuitBreakerConfig, CircuitBreakerRegistry, Clock, InMemoryWindowStore, SlidingWindowLimiter,
    SystemClock,
};
use storesync_core::{JobOutcome, WorkerMetricsPort};
use storesync_domain::EntityType;
use storesync_infra::{DbManager, HealthProbe, PrometheusWorkerMetrics, SqliteJobQueue, SqliteStoreRepository};
use storesync_worker::{router, ServerState};
use tempfile::TempDir;
use tower::ServiceExt;

struct Harness {
    app: Router,
    health: Arc<HealthProbe>,
    metrics: Arc<PrometheusWorkerMetrics>,
    window_store: Arc<InMemoryWindowStore>,
    _temp_dir: TempDir,
}

fn harness() -> Harness {
    let temp_dir = TempDir::new().expect("temp dir");
    let db = Arc::new(DbManager::new(temp_dir.path().join("worker.db"), 2).expect("db manager"));
    db.run_migrations().expect("migrations");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let window_store = Arc::new(InMemoryWindowStore::new());
    let breakers = Arc::new(CircuitBreakerRegistry::new(CircuitBreakerConfig::default()).expect("breakers"));
    let health = Arc::new(HealthProbe::new(
        db.clone(),
        Arc::new(SqliteStoreRepository::new(db.clone())),
        Arc::new(SqliteJobQueue::new(db, clock.clone(), 3)),
        SlidingWindowLimiter::new(window_store.clone()),
        breakers,
        clock,
    ));
    let metrics = Arc::new(PrometheusWorkerMetrics::new().expect("metrics"));
    let app = router(ServerState::new(health.clone(), metrics.clone()));

    Harness { app, health, metrics, window_store, _temp_dir: temp_dir }
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Option<String>, String) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
        .await
        .expect("response");
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    (status, content_type, String::from_utf8(body.to_vec()).expect("utf8 body"))
}

#[tokio::test(flavor = "multi_thread")]
async fn health_is_unavailable_until_runtime_started() {
    let h = harness();

    let (status, _, body) = get(&h.app, "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let report: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(report["status"], "unavailable");
    assert_eq!(report["runtime"], false);
    assert_eq!(report["database"], true);
    assert_eq!(report["rateLimitStore"], true);

    h.health.set_runtime_alive(true);
    let (status, _, body) = get(&h.app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    let report: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(report["status"], "ok");
    assert_eq!(report["queue"]["waiting"], 0);
    assert_eq!(report["openCircuits"], Value::Array(vec![]));
    assert_eq!(report["oldestCursorAgeSecs"], Value::Null);
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_rate_limit_store_fails_liveness() {
    let h = harness();
    h.health.set_runtime_alive(true);
    h.window_store.set_available(false);

    let (status, _, body) = get(&h.app, "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let report: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(report["rateLimitStore"], false);
    assert_eq!(report["database"], true);
}

#[tokio::test(flavor = "multi_thread")]
async fn metrics_endpoint_serves_text_exposition() {
    let h = harness();
    h.metrics.record_job("woo-sync-orders", JobOutcome::Success, Duration::from_millis(120));
    h.metrics.set_sync_lag("store-1", EntityType::Orders, 0.0);

    let (status, content_type, body) = get(&h.app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap_or_default().starts_with("text/plain"));
    assert!(body.contains(r#"worker_jobs_processed_total{job_name="woo-sync-orders",status="success"} 1"#));
    assert!(body.contains("job_duration_seconds_bucket"));
    assert!(body.contains(r#"sync_lag_seconds{entity="orders",store_id="store-1"} 0"#));
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_route_is_not_found() {
    let h = harness();
    let (status, _, _) = get(&h.app, "/jobs").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
