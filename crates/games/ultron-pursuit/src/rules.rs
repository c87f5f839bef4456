use std::time::Duration;

use serde::{Deserialize, Serialize};
use ultron_core::error::GameError;
use ultron_core::grid::{Cell, Grid};
use ultron_core::session::ObstacleKind;

/// Data-driven rules for a pursuit session. Captured when a session is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameRules {
    /// Board width in cells.
    pub grid_width: i32,
    /// Board height in cells.
    pub grid_height: i32,
    /// Adversary spawn cell.
    pub start: Cell,
    /// Cell the adversary is trying to reach.
    pub goal: Cell,
    /// Countdown at session start (seconds).
    pub countdown_secs: f64,
    /// Wall-clock time between countdown decrements (seconds).
    pub timer_interval_secs: f64,
    /// Amount removed from the countdown per decrement (seconds).
    pub timer_step_secs: f64,
    /// Wall-clock time between adversary steps (seconds).
    pub move_interval_secs: f64,
    /// Countdown removed when the adversary enters a timer-drain obstacle.
    pub timer_drain_secs: f64,
    /// How long a stun obstacle freezes the adversary (seconds).
    pub stun_secs: f64,
    /// Hits each obstacle kind absorbs before it is destroyed.
    pub durability: DurabilityRules,
    /// Flat score for the countdown expiring or the adversary being trapped.
    pub clean_win_score: i64,
    /// Score per remaining countdown second when the player claims victory.
    pub claimed_win_multiplier: f64,
    /// Score per survived second on a loss.
    pub loss_points_per_sec: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DurabilityRules {
    pub blocking: u32,
    pub timer_drain: u32,
    pub stun: u32,
}

impl Default for DurabilityRules {
    fn default() -> Self {
        Self {
            blocking: 1,
            timer_drain: 1,
            stun: 1,
        }
    }
}

impl DurabilityRules {
    pub fn for_kind(&self, kind: ObstacleKind) -> u32 {
        match kind {
            ObstacleKind::Blocking => self.blocking,
            ObstacleKind::TimerDrain => self.timer_drain,
            ObstacleKind::Stun => self.stun,
        }
    }
}

impl Default for GameRules {
    fn default() -> Self {
        let grid = Grid::standard();
        Self {
            grid_width: grid.width(),
            grid_height: grid.height(),
            start: grid.start(),
            goal: grid.goal(),
            countdown_secs: 40.0,
            timer_interval_secs: 1.0,
            timer_step_secs: 1.0,
            move_interval_secs: 1.0,
            timer_drain_secs: 2.0,
            stun_secs: 4.0,
            durability: DurabilityRules::default(),
            clean_win_score: 1000,
            claimed_win_multiplier: 10.0,
            loss_points_per_sec: 20,
        }
    }
}

impl GameRules {
    /// Load rules from environment or TOML file, falling back to defaults.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("ULTRON_RULES_CONFIG")
            && let Some(rules) = Self::from_file(&path)
        {
            return rules;
        }
        Self::from_file("config/rules.toml").unwrap_or_default()
    }

    /// Parse rules from a TOML file. A missing file yields `None` quietly;
    /// a malformed one is logged and also yields `None`.
    pub fn from_file(path: &str) -> Option<Self> {
        let contents = std::fs::read_to_string(path).ok()?;
        match toml::from_str::<Self>(&contents) {
            Ok(rules) => Some(rules),
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "Ignoring malformed rules file");
                None
            }
        }
    }

    pub fn grid(&self) -> Result<Grid, GameError> {
        Grid::new(self.grid_width, self.grid_height, self.start, self.goal)
    }

    pub fn timer_interval(&self) -> Duration {
        Duration::from_secs_f64(self.timer_interval_secs)
    }

    pub fn move_interval(&self) -> Duration {
        Duration::from_secs_f64(self.move_interval_secs)
    }

    pub fn stun_duration(&self) -> Duration {
        Duration::from_secs_f64(self.stun_secs)
    }

    /// Check invariants the engine relies on. Returns every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if let Err(e) = self.grid() {
            errors.push(format!("grid: {e}"));
        }
        for (name, value) in [
            ("countdown_secs", self.countdown_secs),
            ("timer_interval_secs", self.timer_interval_secs),
            ("timer_step_secs", self.timer_step_secs),
            ("move_interval_secs", self.move_interval_secs),
        ] {
            if !value.is_finite() || value <= 0.0 {
                errors.push(format!("{name} must be a positive number, got {value}"));
            }
        }
        for (name, value) in [
            ("timer_drain_secs", self.timer_drain_secs),
            ("stun_secs", self.stun_secs),
            ("claimed_win_multiplier", self.claimed_win_multiplier),
        ] {
            if !value.is_finite() || value < 0.0 {
                errors.push(format!("{name} must be non-negative, got {value}"));
            }
        }
        let d = &self.durability;
        if d.blocking == 0 || d.timer_drain == 0 || d.stun == 0 {
            errors.push("durability values must be at least 1".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
