//! Health check endpoints
//!
//! `/health` is a liveness probe, `/healthz` also reports coordinator load.

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use jamroom_sync::sync::CoordinatorMetrics;
use serde::Serialize;

use super::AppState;

/// Health check router
pub fn create_health_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_status))
}

/// Basic health check (always returns OK if server is running)
pub async fn health_check() -> impl IntoResponse {
    "OK"
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    #[serde(flatten)]
    pub metrics: CoordinatorMetrics,
}

pub async fn health_status(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        metrics: state.coordinator.metrics(),
    })
}
