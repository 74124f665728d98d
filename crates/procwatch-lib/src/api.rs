//! HTTP API for health checks, Prometheus metrics and detector state

use crate::anomaly::{AnomalyEvent, DetectorSnapshot};
use crate::health::{ComponentStatus, HealthRegistry};
use crate::observability::DetectorMetrics;
use crate::sampler::MonitorRegistry;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: DetectorMetrics,
    pub monitors: Arc<MonitorRegistry>,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: DetectorMetrics,
        monitors: Arc<MonitorRegistry>,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            monitors,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn not_monitored(pid: u32) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: format!("process {} is not monitored", pid),
        }),
    )
}

/// 200 while operational, 503 once any component is unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Latest tick's events for every monitored process, keyed by pid
async fn all_anomalies(
    State(state): State<Arc<AppState>>,
) -> Json<BTreeMap<u32, Vec<AnomalyEvent>>> {
    let events = state.monitors.latest_events().await;
    Json(events.into_iter().collect())
}

async fn process_anomalies(
    State(state): State<Arc<AppState>>,
    Path(pid): Path<u32>,
) -> Result<Json<Vec<AnomalyEvent>>, (StatusCode, Json<ErrorBody>)> {
    let monitor = state.monitors.get(pid).await.ok_or_else(|| not_monitored(pid))?;
    Ok(Json(monitor.latest_events().await))
}

async fn process_stats(
    State(state): State<Arc<AppState>>,
    Path(pid): Path<u32>,
) -> Result<Json<DetectorSnapshot>, (StatusCode, Json<ErrorBody>)> {
    let monitor = state.monitors.get(pid).await.ok_or_else(|| not_monitored(pid))?;
    Ok(Json(monitor.snapshot().await))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/anomalies", get(all_anomalies))
        .route("/anomalies/:pid", get(process_anomalies))
        .route("/stats/:pid", get(process_stats))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
