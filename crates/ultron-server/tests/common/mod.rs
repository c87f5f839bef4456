use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use ultron_core::net::messages::{ClientMessage, JoinSessionMsg, JoinSessionResponseMsg, ServerMessage};
use ultron_core::net::protocol::{PROTOCOL_VERSION, decode_server_message, encode_client_message};
use ultron_core::player::{PlayerId, SessionId};
use ultron_pursuit::GameRules;

use ultron_server::{build_app, spawn_session_sweeper};
use ultron_server::config::{AuthFileConfig, ServerConfig};
use ultron_server::state::AppState;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    _shutdown: tokio::task::JoinHandle<()>,
    _sweeper: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    /// Start a test server with no auth and the standard rules.
    pub async fn new() -> Self {
        Self::from_parts(ServerConfig::default(), GameRules::default()).await
    }

    /// Start a test server with a bearer token.
    pub async fn with_auth(token: &str) -> Self {
        let config = ServerConfig {
            auth: AuthFileConfig {
                bearer_token: Some(token.to_string()),
            },
            ..ServerConfig::default()
        };
        Self::from_parts(config, GameRules::default()).await
    }

    /// Start a test server with custom rules and a fast driver tick.
    pub async fn with_rules(rules: GameRules) -> Self {
        let mut config = ServerConfig::default();
        config.sessions.tick_interval_ms = 10;
        Self::from_parts(config, rules).await
    }

    /// Start a test server with custom rules, no drivers, and a running sweeper.
    pub async fn with_sweeper(rules: GameRules, sweep_interval_ms: u64) -> Self {
        let mut config = ServerConfig::default();
        config.sessions.sweep_interval_ms = sweep_interval_ms;
        let mut server = Self::from_parts(config, rules).await;
        server._sweeper = Some(spawn_session_sweeper(server.state.clone()));
        server
    }

    pub async fn from_parts(config: ServerConfig, rules: GameRules) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, state) = build_app(config, rules);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            state,
            _shutdown: handle,
            _sweeper: None,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn api(&self, path: &str) -> String {
        format!("http://{}/api/v1{path}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

/// Rules that play out in well under a second.
pub fn fast_rules(countdown_secs: f64) -> GameRules {
    GameRules {
        countdown_secs,
        timer_interval_secs: 0.05,
        move_interval_secs: 0.05,
        stun_secs: 0.2,
        ..GameRules::default()
    }
}

/// POST /sessions and return the snapshot JSON.
pub async fn create_session(server: &TestServer, player_id: PlayerId) -> serde_json::Value {
    let resp = reqwest::Client::new()
        .post(server.api("/sessions"))
        .json(&serde_json::json!({ "player_id": player_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    resp.json().await.unwrap()
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

/// Send a JoinSession and return the response, successful or not.
pub async fn ws_join_session(
    stream: &mut WsStream,
    session_id: SessionId,
    player_id: PlayerId,
) -> JoinSessionResponseMsg {
    let msg = ClientMessage::JoinSession(JoinSessionMsg {
        session_id,
        player_id,
        protocol_version: PROTOCOL_VERSION,
    });
    ws_send_client_msg(stream, &msg).await;

    match ws_read_server_msg(stream).await {
        ServerMessage::JoinSessionResponse(join) => join,
        other => panic!("Expected JoinSessionResponse, got: {other:?}"),
    }
}

/// Read raw binary data from a WebSocket stream (5s timeout).
pub async fn ws_read_raw(stream: &mut WsStream) -> Vec<u8> {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return data.to_vec(),
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Try to read raw binary data, returning None on timeout or close.
pub async fn ws_try_read_raw(stream: &mut WsStream, timeout_ms: u64) -> Option<Vec<u8>> {
    let deadline = Duration::from_millis(timeout_ms);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return Some(data.to_vec()),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
                _ => continue,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

/// Read the next ServerMessage from a WebSocket stream (5s timeout).
pub async fn ws_read_server_msg(stream: &mut WsStream) -> ServerMessage {
    let data = ws_read_raw(stream).await;
    decode_server_message(&data).unwrap()
}

/// Send a ClientMessage from a WS stream.
pub async fn ws_send_client_msg(stream: &mut WsStream, msg: &ClientMessage) {
    let encoded = encode_client_message(msg).unwrap();
    stream.send(Message::Binary(encoded.into())).await.unwrap();
}
