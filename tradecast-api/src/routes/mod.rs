//! Route definitions

mod health;
pub mod ws;

use axum::Router;
use crate::AppState;

/// Create health routes
pub fn health_routes() -> Router<AppState> {
    health::routes()
}

/// Create WebSocket routes
pub fn ws_routes() -> Router<AppState> {
    ws::routes()
}
