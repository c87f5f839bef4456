#[allow(dead_code)]
mod common;

use std::time::Duration;

use common::{TestServer, create_session, fast_rules};
use serde_json::json;
use ultron_core::grid::Cell;
use ultron_core::session::{Outcome, SessionStatus};

#[tokio::test]
async fn health_and_ready_are_public() {
    let server = TestServer::with_auth("test-token").await;
    let resp = reqwest::get(format!("{}/health", server.base_url())).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["connections"]["websocket"], 0);

    let ready = reqwest::get(format!("{}/ready", server.base_url()))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(ready, "ready");
}

#[tokio::test]
async fn api_requires_bearer_token_when_configured() {
    let server = TestServer::with_auth("test-token").await;
    let client = reqwest::Client::new();

    let resp = client
        .post(server.api("/sessions"))
        .json(&json!({ "player_id": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .post(server.api("/sessions"))
        .bearer_auth("test-token")
        .json(&json!({ "player_id": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
}

#[tokio::test]
async fn create_session_returns_initial_state() {
    let server = TestServer::new().await;
    let body = create_session(&server, 42).await;
    assert_eq!(body["player_id"], 42);
    assert_eq!(body["status"], "active");
    assert_eq!(body["countdown_timer"], 40.0);
    assert_eq!(body["adversary"], json!([0, 7]));
    assert_eq!(body["goal"], json!([14, 7]));
    assert_eq!(body["obstacles"], json!([]));
    assert!(body["outcome"].is_null());
}

#[tokio::test]
async fn polling_applies_a_catch_up_tick() {
    let server = TestServer::new().await;
    let id = create_session(&server, 1).await["session_id"].as_u64().unwrap();

    let body: serde_json::Value = reqwest::get(server.api(&format!("/sessions/{id}")))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["adversary"], json!([1, 7]));
    assert_eq!(body["status"], "active");
}

#[tokio::test]
async fn unknown_session_is_404() {
    let server = TestServer::new().await;
    let resp = reqwest::get(server.api("/sessions/999")).await.unwrap();
    assert_eq!(resp.status(), 404);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("999"));
}

#[tokio::test]
async fn obstacle_placement_validation() {
    let server = TestServer::new().await;
    let client = reqwest::Client::new();
    let id = create_session(&server, 1).await["session_id"].as_u64().unwrap();
    let url = server.api(&format!("/sessions/{id}/obstacles"));

    let resp = client
        .post(&url)
        .json(&json!({ "kind": "blocking", "x": 3, "y": 3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let view: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(view["kind"], "blocking");
    assert_eq!(view["position"], json!([3, 3]));

    let occupied = client
        .post(&url)
        .json(&json!({ "kind": "stun", "x": 3, "y": 3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(occupied.status(), 409);

    for (x, y) in [(14, 7), (0, 7), (15, 0), (-1, 4)] {
        let resp = client
            .post(&url)
            .json(&json!({ "kind": "timer_drain", "x": x, "y": y }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "({x}, {y}) should be rejected");
    }

    // Legacy colour names are accepted.
    let resp = client
        .post(&url)
        .json(&json!({ "kind": "yellow", "x": 5, "y": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let state: serde_json::Value = reqwest::get(server.api(&format!("/sessions/{id}")))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(state["obstacles"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn pause_blocks_placement_until_resumed() {
    let server = TestServer::new().await;
    let client = reqwest::Client::new();
    let id = create_session(&server, 1).await["session_id"].as_u64().unwrap();

    let paused: serde_json::Value = client
        .post(server.api(&format!("/sessions/{id}/pause")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(paused["status"], "paused");

    let resp = client
        .post(server.api(&format!("/sessions/{id}/obstacles")))
        .json(&json!({ "kind": "blocking", "x": 4, "y": 4 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    let resp = client
        .post(server.api(&format!("/sessions/{id}/pause")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    let resumed: serde_json::Value = client
        .post(server.api(&format!("/sessions/{id}/resume")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resumed["status"], "active");
}

#[tokio::test]
async fn claimed_victory_updates_stats_and_leaderboard() {
    let server = TestServer::new().await;
    let client = reqwest::Client::new();
    let id = create_session(&server, 5).await["session_id"].as_u64().unwrap();

    let resp = client
        .post(server.api(&format!("/sessions/{id}/end")))
        .json(&json!({ "outcome": "victory" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let fin: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(fin["outcome"], "claimed_victory");
    assert_eq!(fin["score"], 400);
    assert_eq!(fin["recorded"], true);

    let again = client
        .post(server.api(&format!("/sessions/{id}/end")))
        .json(&json!({ "outcome": "forfeit" }))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), 409);

    let stats: serde_json::Value = reqwest::get(server.api("/players/5/stats"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["games_played"], 1);
    assert_eq!(stats["games_won"], 1);
    assert_eq!(stats["total_score"], 400);

    let board: serde_json::Value = reqwest::get(server.api("/leaderboard?limit=5"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(board[0]["player_id"], 5);
    assert_eq!(board[0]["highest_score"], 400);

    let events: serde_json::Value = reqwest::get(server.api(&format!("/sessions/{id}/events")))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let last = events["events"].as_array().unwrap().last().unwrap().clone();
    assert_eq!(last["type"], "session.ended");
    assert_eq!(last["score"], 400);
}

#[tokio::test]
async fn stats_for_unknown_player_is_404() {
    let server = TestServer::new().await;
    let resp = reqwest::get(server.api("/players/77/stats")).await.unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn leaderboard_limit_is_bounded() {
    let server = TestServer::new().await;
    let resp = reqwest::get(server.api("/leaderboard?limit=0")).await.unwrap();
    assert_eq!(resp.status(), 400);
    let resp = reqwest::get(server.api("/leaderboard")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn new_session_supersedes_previous() {
    let server = TestServer::new().await;
    let first = create_session(&server, 9).await["session_id"].as_u64().unwrap();
    let second = create_session(&server, 9).await["session_id"].as_u64().unwrap();
    assert_ne!(first, second);

    let old: serde_json::Value = reqwest::get(server.api(&format!("/sessions/{first}")))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(old["status"], "lost");
    assert_eq!(old["outcome"], "superseded");
    assert_eq!(old["scoring"]["state"], "scored");
}

#[tokio::test]
async fn route_preview_counts_obstacles_on_path() {
    let server = TestServer::new().await;
    let client = reqwest::Client::new();
    let id = create_session(&server, 1).await["session_id"].as_u64().unwrap();
    client
        .post(server.api(&format!("/sessions/{id}/obstacles")))
        .json(&json!({ "kind": "timer_drain", "x": 6, "y": 7 }))
        .send()
        .await
        .unwrap();

    let preview: serde_json::Value = reqwest::get(server.api(&format!("/sessions/{id}/route")))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(preview["path_exists"], true);
    assert_eq!(preview["path_length"], 14);
    assert_eq!(preview["drain_obstacles"], 1);
}

#[tokio::test]
async fn stream_pushes_state_after_each_tick() {
    let server = TestServer::new().await;
    let id = create_session(&server, 1).await["session_id"].as_u64().unwrap();

    let mut resp = reqwest::get(server.api(&format!("/sessions/{id}/stream")))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Poll once to produce a tick.
    reqwest::get(server.api(&format!("/sessions/{id}")))
        .await
        .unwrap();

    let chunk = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        loop {
            let chunk = resp.chunk().await.unwrap().unwrap();
            let text = String::from_utf8_lossy(&chunk).to_string();
            if text.contains("event: state") {
                return text;
            }
        }
    })
    .await
    .expect("Timed out waiting for SSE state");
    assert!(chunk.contains("\"adversary\":[1,7]"));
    assert!(chunk.contains("id: 1"));
}

#[tokio::test]
async fn stream_for_unknown_session_is_404() {
    let server = TestServer::new().await;
    let resp = reqwest::get(server.api("/sessions/31337/stream")).await.unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn sweeper_advances_sessions_nobody_is_driving() {
    let server = TestServer::with_sweeper(fast_rules(100.0), 20).await;
    let id = create_session(&server, 5).await["session_id"].as_u64().unwrap();
    assert_eq!(server.state.sessions.stats_summary().await.1, 0);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let moved = server.state.sessions.get_state(id).await.unwrap();
    assert_ne!(moved.adversary, Cell::new(0, 7));

    let ended = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let snap = server.state.sessions.get_state(id).await.unwrap();
            if snap.status.is_terminal() {
                return snap;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("sweeper should carry the session to its end");
    assert_eq!(ended.status, SessionStatus::Lost);
    assert_eq!(ended.outcome, Some(Outcome::AdversaryEscaped));
    assert_eq!(server.state.sessions.stats(5).unwrap().unwrap().games_played, 1);
}
