use std::time::Duration;

use serde::{Deserialize, Serialize};
use ultron_core::error::GameError;
use ultron_core::events::EventPayload;
use ultron_core::grid::{Cell, Grid};
use ultron_core::player::{PlayerId, SessionId};
use ultron_core::session::{
    ObstacleKind, ObstacleView, Outcome, ScoringState, SessionSnapshot, SessionStatus,
};
use ultron_core::time::Timestamp;

use crate::adversary::{Adversary, RoutePreview};
use crate::obstacles::ObstacleRegistry;
use crate::rules::GameRules;

/// Full state of one pursuit game. Serializable so a store can persist it
/// whole, including obstacle history and cadence timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub player_id: PlayerId,
    pub grid: Grid,
    pub status: SessionStatus,
    pub countdown_timer: f64,
    pub score: i64,
    pub adversary: Adversary,
    pub obstacles: ObstacleRegistry,
    pub created_at: Timestamp,
    pub ended_at: Option<Timestamp>,
    pub last_move_time: Option<Timestamp>,
    pub last_timer_tick_time: Timestamp,
    pub paused_at: Option<Timestamp>,
    pub paused_total_ms: u64,
    pub time_survived_ms: u64,
    pub outcome: Option<Outcome>,
    pub scoring: ScoringState,
    /// Number of ticks that found the session active.
    pub ticks: u64,
}

impl Session {
    /// A fresh active session: full countdown, adversary on the start cell.
    pub fn new(
        id: SessionId,
        player_id: PlayerId,
        rules: &GameRules,
        now: Timestamp,
    ) -> Result<Self, GameError> {
        let grid = rules.grid()?;
        Ok(Self {
            id,
            player_id,
            grid,
            status: SessionStatus::Active,
            countdown_timer: rules.countdown_secs,
            score: 0,
            adversary: Adversary::new(grid.start(), grid.goal()),
            obstacles: ObstacleRegistry::new(),
            created_at: now,
            ended_at: None,
            last_move_time: None,
            last_timer_tick_time: now,
            paused_at: None,
            paused_total_ms: 0,
            time_survived_ms: 0,
            outcome: None,
            scoring: ScoringState::Pending,
            ticks: 0,
        })
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub(crate) fn ensure_active(&self) -> Result<(), GameError> {
        if self.status == SessionStatus::Active {
            Ok(())
        } else {
            Err(GameError::SessionNotActive {
                session_id: self.id,
                status: self.status,
            })
        }
    }

    /// Place an obstacle for the player. Only allowed while active.
    pub fn place_obstacle(
        &mut self,
        kind: ObstacleKind,
        position: Cell,
        rules: &GameRules,
        now: Timestamp,
    ) -> Result<(ObstacleView, EventPayload), GameError> {
        self.ensure_active()?;
        let placed = self.obstacles.place(
            &self.grid,
            position,
            kind,
            rules.durability.for_kind(kind),
            self.adversary.position,
            now,
        )?;
        let event = EventPayload::ObstaclePlaced {
            obstacle_id: placed.id,
            kind,
            position,
        };
        Ok((placed.view(), event))
    }

    /// Active play time: wall time since creation minus time spent paused.
    pub fn elapsed(&self, now: Timestamp) -> Duration {
        let end = self.ended_at.unwrap_or(now);
        let mut paused = Duration::from_millis(self.paused_total_ms);
        if let Some(since) = self.paused_at {
            paused += end.saturating_since(since);
        }
        end.saturating_since(self.created_at).saturating_sub(paused)
    }

    pub fn preview(&self, rules: &GameRules) -> RoutePreview {
        self.adversary.preview(&self.grid, &self.obstacles, rules)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            player_id: self.player_id,
            status: self.status,
            adversary: self.adversary.position,
            goal: self.adversary.goal,
            countdown_timer: self.countdown_timer,
            score: self.score,
            stunned: self.adversary.stunned_until.is_some(),
            obstacles: self.obstacles.views(),
            outcome: self.outcome,
            scoring: self.scoring.clone(),
        }
    }
}
