use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use ultron_core::error::GameError;
use ultron_core::net::messages::{
    ClientMessage, ControlAction, JoinSessionMsg, JoinSessionResponseMsg, MessageType,
    ObstacleRejectedMsg, ServerMessage, SessionEndedMsg, SessionStateMsg,
};
use ultron_core::net::protocol::{
    MAX_MESSAGE_SIZE, PROTOCOL_VERSION, decode_client_message, decode_message_type,
    encode_server_message,
};
use ultron_core::player::SessionId;
use ultron_core::session::SessionSnapshot;
use ultron_core::time::Timestamp;

use crate::session_manager::{ManualOutcome, SessionUpdate};
use crate::state::{AppState, ConnectionGuard};

type WsSender = futures::stream::SplitSink<WebSocket, Message>;

pub async fn ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Result<Response, StatusCode> {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(ws
        .max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, state))
        .into_response())
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let conn_id = Uuid::new_v4();
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Wait for the first message: must be a JoinSession.
    let first_msg = match ws_receiver.next().await {
        Some(Ok(Message::Binary(data))) => data,
        _ => return,
    };

    let Ok(ClientMessage::JoinSession(join)) = decode_client_message(&first_msg) else {
        send_join_error(&mut ws_sender, "Expected JoinSession").await;
        return;
    };

    if join.protocol_version != PROTOCOL_VERSION {
        send_join_error(
            &mut ws_sender,
            &format!(
                "Protocol version mismatch: client={}, server={}",
                join.protocol_version, PROTOCOL_VERSION
            ),
        )
        .await;
        return;
    }

    let (snapshot, updates) = match attempt_join(&join, &state).await {
        Ok(joined) => joined,
        Err(err) => {
            tracing::debug!(%conn_id, session_id = join.session_id, error = %err, "Join rejected");
            send_join_error(&mut ws_sender, &err).await;
            return;
        },
    };
    let session_id = snapshot.session_id;

    let response = ServerMessage::JoinSessionResponse(JoinSessionResponseMsg {
        success: true,
        session_id: Some(session_id),
        state: Some(snapshot.clone()),
        error: None,
    });
    if !send_encoded(&mut ws_sender, &response).await {
        return;
    }

    // Already over: report the ending and hang up.
    if snapshot.status.is_terminal() {
        if let Some(ended) = session_ended(&snapshot) {
            send_encoded(&mut ws_sender, &ended).await;
        }
        return;
    }

    let (tx, rx) = mpsc::channel::<Bytes>(state.config.limits.player_message_buffer);
    spawn_writer(ws_sender, rx);
    let forwarder = spawn_forwarder(updates, tx.clone(), session_id);

    let attached = match state
        .sessions
        .attach(session_id, state.config.sessions.tick_interval())
        .await
    {
        Ok(started) => {
            tracing::info!(%conn_id, session_id, player_id = join.player_id, started, "Player connected");
            true
        },
        Err(e) => {
            tracing::warn!(%conn_id, session_id, error = %e, "Failed to start session driver");
            false
        },
    };

    read_loop(&mut ws_receiver, &state, &tx, session_id).await;

    // The driver keeps running while another connection is attached.
    // The session stays open for a reconnect or poll.
    let stopped = attached && state.sessions.detach(session_id).await;
    forwarder.abort();
    tracing::info!(%conn_id, session_id, driver_stopped = stopped, "Player disconnected");
}

async fn attempt_join(
    join: &JoinSessionMsg,
    state: &AppState,
) -> Result<(SessionSnapshot, broadcast::Receiver<SessionUpdate>), String> {
    // Subscribe first so nothing published after the snapshot is missed.
    let updates = match state.sessions.subscribe(join.session_id).await {
        Ok(rx) => rx,
        Err(GameError::SessionNotFound(id)) => return Err(format!("Session {id} not found")),
        Err(e) => return Err(e.to_string()),
    };
    let snapshot = state
        .sessions
        .get_state(join.session_id)
        .await
        .map_err(|e| e.to_string())?;
    if snapshot.player_id != join.player_id {
        return Err("Session belongs to another player".to_string());
    }
    Ok((snapshot, updates))
}

fn session_ended(snapshot: &SessionSnapshot) -> Option<ServerMessage> {
    let outcome = snapshot.outcome?;
    Some(ServerMessage::SessionEnded(SessionEndedMsg {
        session_id: snapshot.session_id,
        outcome,
        score: snapshot.score,
        message: outcome.message().to_string(),
    }))
}

async fn send_encoded(ws_sender: &mut WsSender, msg: &ServerMessage) -> bool {
    let data = match encode_server_message(msg) {
        Ok(data) => data,
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode server message");
            return false;
        },
    };
    ws_sender.send(Message::Binary(data.into())).await.is_ok()
}

async fn send_join_error(ws_sender: &mut WsSender, error: &str) {
    let response = ServerMessage::JoinSessionResponse(JoinSessionResponseMsg {
        success: false,
        session_id: None,
        state: None,
        error: Some(error.to_string()),
    });
    if !send_encoded(ws_sender, &response).await {
        tracing::warn!("Failed to send join error response");
    }
}

fn spawn_writer(mut ws_sender: WsSender, mut rx: mpsc::Receiver<Bytes>) {
    tokio::spawn(async move {
        while let Some(data) = rx.recv().await {
            if ws_sender.send(Message::Binary(data)).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });
}

fn encode(msg: &ServerMessage) -> Option<Bytes> {
    match encode_server_message(msg) {
        Ok(data) => Some(Bytes::from(data)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode server message");
            None
        },
    }
}

/// Relay session snapshots to the socket writer, in publish order, until
/// the session ends.
fn spawn_forwarder(
    mut updates: broadcast::Receiver<SessionUpdate>,
    tx: mpsc::Sender<Bytes>,
    session_id: SessionId,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(update) => {
                    let terminal = update.snapshot.status.is_terminal();
                    let ended = if terminal {
                        session_ended(&update.snapshot)
                    } else {
                        None
                    };
                    let msg = ServerMessage::SessionState(Box::new(SessionStateMsg {
                        seq: update.seq,
                        state: update.snapshot,
                    }));
                    if let Some(data) = encode(&msg)
                        && tx.send(data).await.is_err()
                    {
                        break;
                    }
                    if let Some(ended) = ended
                        && let Some(data) = encode(&ended)
                    {
                        let _ = tx.send(data).await;
                    }
                    if terminal {
                        break;
                    }
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(session_id, "Snapshot forwarder lagged by {n} messages");
                },
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Per-connection rate limiter (token bucket).
struct RateLimiter {
    tokens: f64,
    last_refill: tokio::time::Instant,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

impl RateLimiter {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: tokio::time::Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// Returns true if the message is allowed; false if rate-limited.
    fn allow(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

async fn read_loop(
    ws_receiver: &mut futures::stream::SplitStream<WebSocket>,
    state: &AppState,
    tx: &mpsc::Sender<Bytes>,
    session_id: SessionId,
) {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut rate_limiter = RateLimiter::new(rate, rate);

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let data = match msg {
            Message::Binary(d) => d,
            Message::Close(_) => break,
            _ => continue,
        };

        if !rate_limiter.allow() {
            tracing::warn!(session_id, "Rate limited");
            continue;
        }

        if data.is_empty() || data.len() > MAX_MESSAGE_SIZE {
            continue;
        }

        let Ok(msg_type) = decode_message_type(&data) else {
            continue;
        };

        // Server-authoritative: the server alone produces these.
        if matches!(
            msg_type,
            MessageType::JoinSessionResponse
                | MessageType::SessionState
                | MessageType::ObstacleRejected
                | MessageType::SessionEnded
        ) {
            tracing::warn!(session_id, ?msg_type, "Rejected server-only message from client");
            continue;
        }

        let client_msg = match decode_client_message(&data) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(session_id, error = %e, "Undecodable client message");
                continue;
            },
        };

        match client_msg {
            ClientMessage::PlaceObstacle(place) => {
                let result = state
                    .sessions
                    .place_obstacle(session_id, place.kind, place.x, place.y, Timestamp::now())
                    .await;
                if let Err(e) = result {
                    let rejected = ServerMessage::ObstacleRejected(ObstacleRejectedMsg {
                        kind: place.kind,
                        x: place.x,
                        y: place.y,
                        reason: e.to_string(),
                    });
                    if let Some(data) = encode(&rejected) {
                        let _ = tx.send(data).await;
                    }
                }
            },
            ClientMessage::SessionControl(control) => {
                let now = Timestamp::now();
                let result = match control.action {
                    ControlAction::Pause => state.sessions.pause(session_id, now).await.map(|_| ()),
                    ControlAction::Resume => {
                        state.sessions.resume(session_id, now).await.map(|_| ())
                    },
                    ControlAction::Forfeit => state
                        .sessions
                        .end_session(session_id, ManualOutcome::Forfeit, now)
                        .await
                        .map(|_| ()),
                };
                if let Err(e) = result {
                    tracing::warn!(session_id, action = ?control.action, error = %e, "Session control failed");
                }
            },
            ClientMessage::JoinSession(_) => {
                tracing::debug!(session_id, "Ignoring repeated JoinSession");
            },
        }
    }
}
