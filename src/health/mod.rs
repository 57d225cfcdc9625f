//! Health check endpoints

use crate::dispatch::ShardRequestDispatcher;
use crate::janitor::PoolJanitor;
use crate::metrics::{self, DispatchMetrics};
use crate::transport::{ConnectionPool, PoolStats};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Readiness check response
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub janitor_running: bool,
    pub pool: PoolStats,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<ShardRequestDispatcher>,
    pub pool: Arc<ConnectionPool>,
    pub janitor: Arc<PoolJanitor>,
    pub metrics: Arc<DispatchMetrics>,
}

/// Create the health check router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Health endpoint - always returns 200 if process is running
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness endpoint - returns 200 while the janitor worker is alive
async fn ready_handler(State(state): State<AppState>) -> impl IntoResponse {
    let janitor_running = state.janitor.is_running();

    let response = ReadyResponse {
        ready: janitor_running,
        janitor_running,
        pool: state.pool.stats(),
    };

    if response.ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Metrics endpoint - returns Prometheus format metrics
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    // Refresh gauges before rendering
    metrics::set_pool_endpoints(state.pool.stats().endpoints_open);
    metrics::set_janitor_running(state.janitor.is_running());

    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.metrics.render(),
    )
}
