use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use ultron_core::grid::{Cell, Grid};
use ultron_core::session::ObstacleKind;
use ultron_core::time::Timestamp;

use crate::obstacles::{Hit, ObstacleRegistry};
use crate::pathfinder::find_path;
use crate::rules::GameRules;

/// What a single movement attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Still frozen by a stun obstacle. No movement.
    Stunned,
    /// No route to the goal exists.
    Trapped,
    Moved(Cell),
}

/// Side effect of entering an obstacle, for the clock to apply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    None,
    DrainTimer(f64),
    Stunned { until: Timestamp },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arrival {
    pub hit: Hit,
    pub effect: Effect,
}

/// Route estimate for the player's strategy panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePreview {
    pub path_exists: bool,
    pub path_length: usize,
    /// Seconds until the adversary reaches the goal on this route, counting stun delays.
    pub estimated_secs: Option<f64>,
    pub stun_obstacles: usize,
    pub drain_obstacles: usize,
    pub next_cells: Vec<Cell>,
}

/// The pursuing adversary: position, cached route, and stun state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adversary {
    pub position: Cell,
    pub goal: Cell,
    current_path: VecDeque<Cell>,
    pub stunned_until: Option<Timestamp>,
}

impl Adversary {
    pub fn new(start: Cell, goal: Cell) -> Self {
        Self {
            position: start,
            goal,
            current_path: VecDeque::new(),
            stunned_until: None,
        }
    }

    pub fn is_stunned(&self, now: Timestamp) -> bool {
        self.stunned_until.is_some_and(|until| now < until)
    }

    pub fn at_goal(&self) -> bool {
        self.position == self.goal
    }

    /// The cached route, next cell first. May be stale until the next step.
    pub fn planned_path(&self) -> impl Iterator<Item = &Cell> {
        self.current_path.iter()
    }

    /// Advance one cell toward the goal, recomputing the route when needed.
    pub fn step(&mut self, grid: &Grid, registry: &ObstacleRegistry, now: Timestamp) -> StepOutcome {
        if let Some(until) = self.stunned_until {
            if now < until {
                return StepOutcome::Stunned;
            }
            self.stunned_until = None;
        }

        let stale = self
            .current_path
            .front()
            .is_none_or(|&head| registry.is_blocking(head));
        if stale {
            self.current_path =
                find_path(grid, &registry.blocking_cells(), self.position, self.goal).into();
            tracing::trace!(
                from = %self.position,
                len = self.current_path.len(),
                "Adversary route recomputed"
            );
        }

        match self.current_path.pop_front() {
            Some(next) => {
                self.position = next;
                StepOutcome::Moved(next)
            },
            None => StepOutcome::Trapped,
        }
    }

    /// Resolve the obstacle under the adversary, applying stuns directly and
    /// reporting drains for the clock.
    pub fn on_arrival(
        &mut self,
        registry: &mut ObstacleRegistry,
        rules: &GameRules,
        now: Timestamp,
    ) -> Option<Arrival> {
        let hit = registry.resolve_hit(self.position)?;
        let effect = match hit.kind {
            ObstacleKind::Blocking => Effect::None,
            ObstacleKind::TimerDrain => Effect::DrainTimer(rules.timer_drain_secs),
            ObstacleKind::Stun => {
                let until = now + rules.stun_duration();
                self.stunned_until = Some(until);
                Effect::Stunned { until }
            },
        };
        Some(Arrival { hit, effect })
    }

    /// Estimate the route from the current position without mutating anything.
    pub fn preview(&self, grid: &Grid, registry: &ObstacleRegistry, rules: &GameRules) -> RoutePreview {
        let path = find_path(grid, &registry.blocking_cells(), self.position, self.goal);
        if path.is_empty() {
            return RoutePreview {
                path_exists: false,
                path_length: 0,
                estimated_secs: None,
                stun_obstacles: 0,
                drain_obstacles: 0,
                next_cells: Vec::new(),
            };
        }
        let count = |kind: ObstacleKind| {
            path.iter()
                .filter(|&&c| registry.active_at(c).is_some_and(|o| o.kind == kind))
                .count()
        };
        let stun_obstacles = count(ObstacleKind::Stun);
        let drain_obstacles = count(ObstacleKind::TimerDrain);
        let estimated = path.len() as f64 * rules.move_interval_secs
            + stun_obstacles as f64 * rules.stun_secs;
        RoutePreview {
            path_exists: true,
            path_length: path.len(),
            estimated_secs: Some(estimated),
            stun_obstacles,
            drain_obstacles,
            next_cells: path.iter().take(3).copied().collect(),
        }
    }

    /// Push an active stun forward after the session was paused.
    pub(crate) fn shift_stun(&mut self, by: std::time::Duration) {
        if let Some(until) = self.stunned_until.as_mut() {
            *until = *until + by;
        }
    }
}
