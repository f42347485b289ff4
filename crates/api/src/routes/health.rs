//! Health and metrics endpoints.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use mailflow_common::types::WorkerMetrics;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "mailflow-api",
        "version": env!("CARGO_PKG_VERSION"),
        "worker_active": state.worker.is_active(),
    }))
}

/// GET /metrics: point-in-time worker snapshot.
async fn metrics(State(state): State<AppState>) -> Json<WorkerMetrics> {
    Json(state.worker.metrics())
}
