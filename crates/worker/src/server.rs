//! Operational HTTP surface: liveness and Prometheus scrape endpoints

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use storesync_infra::{HealthProbe, HealthReport, PrometheusWorkerMetrics};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct ServerState {
    health: Arc<HealthProbe>,
    metrics: Arc<PrometheusWorkerMetrics>,
}

impl ServerState {
    pub fn new(health: Arc<HealthProbe>, metrics: Arc<PrometheusWorkerMetrics>) -> Self {
        Self { health, metrics }
    }
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// 200 when healthy, 503 otherwise; the body is the full report either way
async fn health(State(state): State<ServerState>) -> (StatusCode, Json<HealthReport>) {
    let report = state.health.check().await;
    let status = if report.is_healthy() { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(report))
}

async fn metrics(State(state): State<ServerState>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, state.metrics.content_type())], state.metrics.render())
}

/// Bind `addr` and return the bound address with the serving future.
///
/// The future resolves once `shutdown` is cancelled and open connections
/// have drained.
pub async fn serve(
    addr: SocketAddr,
    app: Router,
    shutdown: CancellationToken,
) -> std::io::Result<(SocketAddr, impl Future<Output = std::io::Result<()>>)> {
    let listener = TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let fut = async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
    };

    Ok((bound_addr, fut))
}
