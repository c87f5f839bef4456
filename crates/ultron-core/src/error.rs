//! Error taxonomy shared by the engine and the server.

use thiserror::Error;

use crate::grid::Cell;
use crate::player::SessionId;
use crate::session::SessionStatus;

/// Errors raised by session operations. None of them leave a session partially mutated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GameError {
    /// Position is out of bounds or reserved for the adversary's start or goal.
    #[error("invalid position {position}: {reason}")]
    InvalidPosition {
        position: Cell,
        reason: &'static str,
    },

    /// Position already holds an active obstacle or the adversary.
    #[error("position {position} is occupied by {occupant}")]
    PositionOccupied {
        position: Cell,
        occupant: &'static str,
    },

    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    /// The session is paused or already terminal.
    #[error("session {session_id} is not active (status: {status})")]
    SessionNotActive {
        session_id: SessionId,
        status: SessionStatus,
    },

    /// The store rejected a read or write.
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),
}

impl GameError {
    /// Validation errors are the player's fault; everything else is an operational failure.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidPosition { .. } | Self::PositionOccupied { .. }
        )
    }
}
