//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::relay::DispatcherStatsSnapshot;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Identities with at least one live connection.
    pub connected_users: usize,
    /// Live connections, authenticated or not.
    pub active_sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub connections: ConnectionStats,
    pub delivery: DispatcherStatsSnapshot,
}

#[derive(Debug, Serialize)]
pub struct ConnectionStats {
    pub active_sessions: usize,
    pub connected_users: usize,
    pub tracked_resources: usize,
    pub rooms: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        connected_users: state.identities.len(),
        active_sessions: state.connections.len(),
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        connections: ConnectionStats {
            active_sessions: state.connections.len(),
            connected_users: state.identities.len(),
            tracked_resources: state.usage.resource_count(),
            rooms: state.subscriptions.room_count(),
        },
        delivery: state.dispatcher.stats(),
    })
}
