use axum::{
    routing::{get, post},
    Router,
};

use crate::gateway::emit_event;
use crate::server::AppState;

use super::health::{health, stats};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health & Stats
        .route("/health", get(health))
        .route("/stats", get(stats))
        // Backend control plane
        .route("/emit", post(emit_event))
}
