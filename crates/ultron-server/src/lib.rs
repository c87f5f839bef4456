pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod game_loop;
pub mod health;
pub mod session_manager;
pub mod sse;
pub mod state;
pub mod store;
pub mod ws;

use std::time::Duration;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use ultron_core::time::Timestamp;
use ultron_pursuit::GameRules;

use config::ServerConfig;
use state::AppState;

/// Build the Axum router and application state from a config.
pub fn build_app(config: ServerConfig, rules: GameRules) -> (Router<()>, AppState) {
    let state = AppState::new(config, rules);
    (router(state.clone()), state)
}

/// Router over an existing state, e.g. one backed by a custom store.
pub fn router(state: AppState) -> Router<()> {
    let timeout = Duration::from_secs(state.config.limits.request_timeout_secs);

    // API routes (behind bearer auth middleware)
    let api_routes = Router::new()
        .route("/sessions", post(api::create_session))
        .route("/sessions/{id}", get(api::get_session))
        .route("/sessions/{id}/obstacles", post(api::place_obstacle))
        .route("/sessions/{id}/pause", post(api::pause_session))
        .route("/sessions/{id}/resume", post(api::resume_session))
        .route("/sessions/{id}/end", post(api::end_session))
        .route("/sessions/{id}/events", get(api::session_events))
        .route("/sessions/{id}/route", get(api::route_preview))
        .route("/players/{id}/stats", get(api::player_stats))
        .route("/leaderboard", get(api::leaderboard))
        .layer(TimeoutLayer::new(timeout))
        // Streams outlive the request timeout.
        .route("/sessions/{id}/stream", get(sse::session_stream))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            bearer_auth_layer,
        ));

    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Background task that ticks open sessions no client is driving, so
/// abandoned sessions still run out their countdown, and retries scoring
/// that failed earlier.
pub fn spawn_session_sweeper(state: AppState) -> tokio::task::JoinHandle<()> {
    let period = state.config.sessions.sweep_interval();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            match state.sessions.sweep(Timestamp::now()).await {
                Ok(0) => {},
                Ok(n) => tracing::debug!(ticked = n, "Swept idle sessions"),
                Err(e) => tracing::warn!(error = %e, "Session sweep failed"),
            }
            if let Err(e) = state.sessions.reconcile_unscored() {
                tracing::warn!(error = %e, "Scoring reconciliation failed");
            }
        }
    })
}

/// Middleware wrapper that injects AuthConfig into request extensions for the
/// bearer auth middleware.
async fn bearer_auth_layer(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut request: axum::extract::Request,
    next: middleware::Next,
) -> Result<axum::response::Response, axum::http::StatusCode> {
    request.extensions_mut().insert(state.auth.clone());
    auth::bearer_auth_middleware(request.headers().clone(), request, next).await
}
