use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};

use ultron_core::events::LoggedEvent;
use ultron_core::player::{LeaderboardEntry, PlayerId, PlayerStats, SessionId};
use ultron_core::session::{ObstacleKind, ObstacleView, SessionSnapshot};
use ultron_core::time::Timestamp;
use ultron_pursuit::RoutePreview;

use crate::error::AppError;
use crate::session_manager::{FinalScore, ManualOutcome};
use crate::state::AppState;

const DEFAULT_LEADERBOARD_LIMIT: usize = 10;
const MAX_LEADERBOARD_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct CreateSessionBody {
    pub player_id: PlayerId,
}

#[derive(Debug, Deserialize)]
pub struct PlaceObstacleBody {
    pub kind: ObstacleKind,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Deserialize)]
pub struct EndSessionBody {
    pub outcome: ManualOutcome,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub session_id: SessionId,
    pub events: Vec<LoggedEvent>,
}

/// POST /api/v1/sessions: start a session, superseding the player's open one.
pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionBody>,
) -> Result<(StatusCode, Json<SessionSnapshot>), AppError> {
    let snapshot = state
        .sessions
        .create_session(body.player_id, Timestamp::now())
        .await?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// GET /api/v1/sessions/{id}: apply one catch-up tick and return the state.
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<Json<SessionSnapshot>, AppError> {
    Ok(Json(state.sessions.tick(id, Timestamp::now()).await?))
}

/// POST /api/v1/sessions/{id}/obstacles
pub async fn place_obstacle(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    Json(body): Json<PlaceObstacleBody>,
) -> Result<(StatusCode, Json<ObstacleView>), AppError> {
    let view = state
        .sessions
        .place_obstacle(id, body.kind, body.x, body.y, Timestamp::now())
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// POST /api/v1/sessions/{id}/pause
pub async fn pause_session(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<Json<SessionSnapshot>, AppError> {
    Ok(Json(state.sessions.pause(id, Timestamp::now()).await?))
}

/// POST /api/v1/sessions/{id}/resume
pub async fn resume_session(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<Json<SessionSnapshot>, AppError> {
    Ok(Json(state.sessions.resume(id, Timestamp::now()).await?))
}

/// POST /api/v1/sessions/{id}/end: claim victory or forfeit.
pub async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
    Json(body): Json<EndSessionBody>,
) -> Result<Json<FinalScore>, AppError> {
    Ok(Json(
        state
            .sessions
            .end_session(id, body.outcome, Timestamp::now())
            .await?,
    ))
}

/// GET /api/v1/sessions/{id}/events
pub async fn session_events(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<Json<EventsResponse>, AppError> {
    let events = state.sessions.events(id).await?;
    Ok(Json(EventsResponse {
        session_id: id,
        events,
    }))
}

/// GET /api/v1/sessions/{id}/route: where the adversary is headed right now.
pub async fn route_preview(
    State(state): State<AppState>,
    Path(id): Path<SessionId>,
) -> Result<Json<RoutePreview>, AppError> {
    Ok(Json(state.sessions.route_preview(id).await?))
}

/// GET /api/v1/players/{id}/stats
pub async fn player_stats(
    State(state): State<AppState>,
    Path(player_id): Path<PlayerId>,
) -> Result<Json<PlayerStats>, AppError> {
    state
        .sessions
        .stats(player_id)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no stats for player {player_id}")))
}

/// GET /api/v1/leaderboard?limit=N
pub async fn leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT);
    if limit == 0 || limit > MAX_LEADERBOARD_LIMIT {
        return Err(AppError::BadRequest(format!(
            "limit must be between 1 and {MAX_LEADERBOARD_LIMIT}"
        )));
    }
    Ok(Json(state.sessions.leaderboard(limit)?))
}
