//! Health check endpoints

use axum::{extract::State, response::Json, routing::get, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    started_at: DateTime<Utc>,
    open_connections: usize,
    persistence_queue_depth: usize,
    persistence_queue_capacity: usize,
}

/// Health check handler
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let queue = &state.hub.persistence;

    Json(HealthResponse {
        status: "healthy".to_string(),
        started_at: state.started_at,
        open_connections: state.hub.registry.len(),
        persistence_queue_depth: queue.depth(),
        persistence_queue_capacity: queue.capacity(),
    })
}

/// Simple liveness check (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

/// Create health routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness))
}
