pub mod error;
pub mod events;
pub mod grid;
pub mod net;
pub mod player;
pub mod session;
pub mod time;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::grid::Cell;
    use crate::player::{PlayerId, SessionId, StatsDelta};
    use crate::session::{ObstacleKind, ObstacleView, ScoringState, SessionSnapshot, SessionStatus};
    use crate::time::Timestamp;

    /// Fixed creation instant used across test fixtures.
    pub const T0: Timestamp = Timestamp::from_millis(1_700_000_000_000);

    /// `T0` plus a whole number of seconds.
    pub fn at_secs(secs: u64) -> Timestamp {
        Timestamp::from_millis(T0.as_millis() + secs * 1000)
    }

    /// `T0` plus an arbitrary number of milliseconds.
    pub fn at_millis(millis: u64) -> Timestamp {
        Timestamp::from_millis(T0.as_millis() + millis)
    }

    /// An active snapshot on the standard board with one stun obstacle placed.
    pub fn sample_snapshot() -> SessionSnapshot {
        SessionSnapshot {
            session_id: 1,
            player_id: 42,
            status: SessionStatus::Active,
            adversary: Cell::new(3, 7),
            goal: Cell::new(14, 7),
            countdown_timer: 37.0,
            score: 0,
            stunned: false,
            obstacles: vec![ObstacleView {
                id: 1,
                kind: ObstacleKind::Stun,
                position: Cell::new(5, 7),
                durability: 1,
            }],
            outcome: None,
            scoring: ScoringState::Pending,
        }
    }

    pub fn make_delta(session_id: SessionId, player_id: PlayerId, score: i64, won: bool) -> StatsDelta {
        StatsDelta {
            session_id,
            player_id,
            score,
            won,
            time_survived_secs: 10.0,
            ended_at: at_secs(10),
        }
    }
}
