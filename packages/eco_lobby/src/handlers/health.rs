use axum::{Json, extract::State, response::IntoResponse};

use crate::AppState;
use crate::metrics;

/// Health check endpoint - returns server status
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.metrics.snapshot();
    let lobbies = state.router.lobby_count().await as u64;

    Json(metrics::HealthStatus {
        status: "healthy".to_string(),
        lobbies,
        connections: snapshot.connections.active,
        uptime_secs: snapshot.uptime_secs,
    })
}

/// Metrics endpoint - returns detailed server metrics
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

/// Liveness probe - returns 200 if the server is running
pub async fn health_live_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}

/// Readiness probe - returns 200 once the router is accepting events
pub async fn health_ready_handler(State(state): State<AppState>) -> impl IntoResponse {
    let lobbies = state.router.lobby_count().await;

    Json(serde_json::json!({
        "status": "ready",
        "lobbies": lobbies,
    }))
}
