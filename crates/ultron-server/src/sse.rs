use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use futures::stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use ultron_core::error::GameError;
use ultron_core::player::SessionId;

use crate::session_manager::SessionUpdate;
use crate::state::{AppState, ConnectionGuard};

/// GET /api/v1/sessions/{id}/stream: SSE feed of session snapshots.
///
/// Watching does not drive the session; pair it with a WebSocket driver,
/// REST polls, or the sweeper.
pub async fn session_stream(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, StatusCode> {
    let max_sse = state.config.limits.max_sse_subscribers;
    let current = state.sse_subscriber_count.load(Ordering::Relaxed);
    if current >= max_sse {
        tracing::warn!(current, max = max_sse, "SSE subscriber limit reached");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    let rx = match state.sessions.subscribe(session_id).await {
        Ok(rx) => rx,
        Err(GameError::SessionNotFound(_)) => return Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::warn!(session_id, error = %e, "SSE subscribe failed");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        },
    };

    let guard = ConnectionGuard::new(Arc::clone(&state.sse_subscriber_count));

    let stream = BroadcastStream::new(rx).filter_map(move |result: Result<SessionUpdate, _>| {
        let _guard = &guard;
        match result {
            Ok(update) => {
                let json = serde_json::to_string(&update.snapshot).unwrap_or_default();
                Some(Ok(SseEvent::default()
                    .event("state")
                    .data(json)
                    .id(update.seq.to_string())))
            },
            Err(e) => {
                tracing::warn!(session_id, "SSE broadcast receive error: {e}");
                None
            },
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
