//! Typed session event log schema.

use serde::{Deserialize, Serialize};

use crate::grid::Cell;
use crate::player::{ObstacleId, SessionId};
use crate::session::{ObstacleKind, Outcome};
use crate::time::Timestamp;

/// Something that happened inside a session. Per-step adversary movement is
/// reported through tick results and never logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventPayload {
    #[serde(rename = "obstacle.placed")]
    ObstaclePlaced {
        obstacle_id: ObstacleId,
        kind: ObstacleKind,
        position: Cell,
    },
    #[serde(rename = "obstacle.hit")]
    ObstacleHit {
        obstacle_id: ObstacleId,
        kind: ObstacleKind,
        position: Cell,
        remaining_durability: u32,
    },
    #[serde(rename = "obstacle.destroyed")]
    ObstacleDestroyed {
        obstacle_id: ObstacleId,
        kind: ObstacleKind,
        position: Cell,
    },
    #[serde(rename = "timer.drained")]
    TimerDrained { amount: f64, remaining: f64 },
    #[serde(rename = "adversary.stunned")]
    AdversaryStunned { position: Cell, until: Timestamp },
    #[serde(rename = "session.paused")]
    SessionPaused,
    #[serde(rename = "session.resumed")]
    SessionResumed { paused_for_ms: u64 },
    #[serde(rename = "session.ended")]
    SessionEnded {
        outcome: Outcome,
        score: i64,
        time_survived_secs: f64,
    },
}

impl EventPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ObstaclePlaced { .. } => "obstacle.placed",
            Self::ObstacleHit { .. } => "obstacle.hit",
            Self::ObstacleDestroyed { .. } => "obstacle.destroyed",
            Self::TimerDrained { .. } => "timer.drained",
            Self::AdversaryStunned { .. } => "adversary.stunned",
            Self::SessionPaused => "session.paused",
            Self::SessionResumed { .. } => "session.resumed",
            Self::SessionEnded { .. } => "session.ended",
        }
    }
}

/// An event as stored in a session's append-only log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedEvent {
    /// Position in the session's log, starting at 1.
    pub seq: u64,
    pub session_id: SessionId,
    pub timestamp: Timestamp,
    #[serde(flatten)]
    pub payload: EventPayload,
}
