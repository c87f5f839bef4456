use std::fmt;

use serde::{Deserialize, Serialize};

use crate::grid::Cell;
use crate::player::{ObstacleId, PlayerId, SessionId};

/// Lifecycle state of a session. `Won` and `Lost` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Paused,
    Won,
    Lost,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }

    /// Active or paused: the player still has a game in progress.
    pub fn is_open(self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Won => "won",
            Self::Lost => "lost",
        };
        f.write_str(s)
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The countdown reached zero before the adversary escaped.
    HostagesEscaped,
    /// Obstacles cut off every route to the goal.
    AdversaryTrapped,
    /// The adversary reached the goal.
    AdversaryEscaped,
    /// The player ended the session and claimed the win.
    ClaimedVictory,
    Forfeit,
    /// Replaced by a newer session for the same player.
    Superseded,
}

impl Outcome {
    pub fn is_win(self) -> bool {
        matches!(
            self,
            Self::HostagesEscaped | Self::AdversaryTrapped | Self::ClaimedVictory
        )
    }

    pub fn status(self) -> SessionStatus {
        if self.is_win() {
            SessionStatus::Won
        } else {
            SessionStatus::Lost
        }
    }

    /// Human-readable summary shown to the player.
    pub fn message(self) -> &'static str {
        match self {
            Self::HostagesEscaped => "The hostages got out. Ultron is stopped.",
            Self::AdversaryTrapped => "Ultron is boxed in with nowhere to go.",
            Self::AdversaryEscaped => "Ultron broke through to the exit.",
            Self::ClaimedVictory => "Victory claimed.",
            Self::Forfeit => "Session forfeited.",
            Self::Superseded => "Replaced by a newer session.",
        }
    }
}

/// Whether a terminal session's score has reached the player's stats.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ScoringState {
    #[default]
    Pending,
    Scored,
    Unscored { reason: String },
}

/// Obstacle ("shield") kinds.
///
/// The legacy colour names are accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObstacleKind {
    /// Impassable. The pathfinder routes around it.
    #[serde(alias = "blue")]
    Blocking,
    /// Passable. Entering it drains the countdown.
    #[serde(alias = "yellow")]
    TimerDrain,
    /// Passable. Entering it stuns the adversary.
    #[serde(alias = "red")]
    Stun,
}

impl ObstacleKind {
    pub fn is_blocking(self) -> bool {
        matches!(self, Self::Blocking)
    }
}

impl fmt::Display for ObstacleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Blocking => "blocking",
            Self::TimerDrain => "timer_drain",
            Self::Stun => "stun",
        };
        f.write_str(s)
    }
}

/// Public view of an active obstacle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObstacleView {
    pub id: ObstacleId,
    pub kind: ObstacleKind,
    pub position: Cell,
    pub durability: u32,
}

/// Read-only projection of a session, returned by every orchestrator call
/// and pushed to live clients after each tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub player_id: PlayerId,
    pub status: SessionStatus,
    pub adversary: Cell,
    pub goal: Cell,
    pub countdown_timer: f64,
    pub score: i64,
    pub stunned: bool,
    pub obstacles: Vec<ObstacleView>,
    pub outcome: Option<Outcome>,
    pub scoring: ScoringState,
}
