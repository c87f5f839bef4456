use std::sync::atomic::Ordering;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

/// Structured health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub connections: ConnectionInfo,
    pub sessions: SessionInfo,
}

#[derive(Serialize)]
pub struct ConnectionInfo {
    pub websocket: usize,
    pub sse: usize,
}

#[derive(Serialize)]
pub struct SessionInfo {
    /// Open sessions held in memory.
    pub live: usize,
    /// Sessions ticked by a connected client's driver.
    pub driven: usize,
}

/// Structured health check endpoint. Returns server status, connection counts,
/// and session info as JSON.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let ws = state.ws_connection_count.load(Ordering::Relaxed);
    let sse = state.sse_subscriber_count.load(Ordering::Relaxed);
    let (live, driven) = state.sessions.stats_summary().await;

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        connections: ConnectionInfo { websocket: ws, sse },
        sessions: SessionInfo { live, driven },
    })
}

/// Readiness check: the game rules loaded and the store answers.
pub async fn readiness_check(State(state): State<AppState>) -> &'static str {
    if state.sessions.rules().validate().is_err() {
        return "not ready: invalid game rules";
    }
    if state.sessions.leaderboard(1).is_err() {
        return "not ready: store unavailable";
    }
    "ready"
}
