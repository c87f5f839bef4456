use serde::{Deserialize, Serialize};

use crate::player::{PlayerId, SessionId};
use crate::session::{ObstacleKind, Outcome, SessionSnapshot};

/// Network message type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Client -> Server
    PlaceObstacle = 0x01,
    JoinSession = 0x02,
    SessionControl = 0x03,

    // Server -> Client
    JoinSessionResponse = 0x10,
    SessionState = 0x11,
    ObstacleRejected = 0x12,
    SessionEnded = 0x13,
}

impl MessageType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::PlaceObstacle),
            0x02 => Some(Self::JoinSession),
            0x03 => Some(Self::SessionControl),
            0x10 => Some(Self::JoinSessionResponse),
            0x11 => Some(Self::SessionState),
            0x12 => Some(Self::ObstacleRejected),
            0x13 => Some(Self::SessionEnded),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    JoinSession(JoinSessionMsg),
    PlaceObstacle(PlaceObstacleMsg),
    SessionControl(SessionControlMsg),
}

/// Attach this connection to an existing session and start its live driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinSessionMsg {
    pub session_id: SessionId,
    pub player_id: PlayerId,
    pub protocol_version: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceObstacleMsg {
    pub kind: ObstacleKind,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlAction {
    Pause,
    Resume,
    Forfeit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionControlMsg {
    pub action: ControlAction,
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    JoinSessionResponse(JoinSessionResponseMsg),
    SessionState(Box<SessionStateMsg>),
    ObstacleRejected(ObstacleRejectedMsg),
    SessionEnded(SessionEndedMsg),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinSessionResponseMsg {
    pub success: bool,
    pub session_id: Option<SessionId>,
    pub state: Option<SessionSnapshot>,
    pub error: Option<String>,
}

/// Snapshot pushed after every tick. `seq` increases per session stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStateMsg {
    pub seq: u64,
    pub state: SessionSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObstacleRejectedMsg {
    pub kind: ObstacleKind,
    pub x: i32,
    pub y: i32,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEndedMsg {
    pub session_id: SessionId,
    pub outcome: Outcome,
    pub score: i64,
    pub message: String,
}
