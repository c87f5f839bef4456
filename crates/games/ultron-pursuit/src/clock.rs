//! Session clock: drives the countdown and the adversary on independent
//! cadences, applies obstacle effects, and detects termination.

use ultron_core::error::GameError;
use ultron_core::events::EventPayload;
use ultron_core::grid::Cell;
use ultron_core::session::{Outcome, SessionStatus};
use ultron_core::time::Timestamp;

use crate::adversary::{Effect, StepOutcome};
use crate::rules::GameRules;
use crate::session::Session;

/// What one tick changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub moved: Option<Cell>,
    pub timer_decremented: bool,
    pub events: Vec<EventPayload>,
    /// Set on the tick that terminated the session.
    pub ended: Option<Outcome>,
}

impl TickReport {
    pub fn changed(&self) -> bool {
        self.moved.is_some() || self.timer_decremented || !self.events.is_empty() || self.ended.is_some()
    }
}

impl Session {
    /// Advance the session to `now`. No-op unless the session is active.
    ///
    /// The countdown is checked before movement, so a countdown expiring on
    /// the same tick the adversary would reach the goal is a win.
    pub fn tick(&mut self, rules: &GameRules, now: Timestamp) -> TickReport {
        let mut report = TickReport::default();
        if self.status != SessionStatus::Active {
            return report;
        }
        self.ticks += 1;

        if self.countdown_timer > 0.0
            && now.saturating_since(self.last_timer_tick_time) >= rules.timer_interval()
        {
            self.countdown_timer = (self.countdown_timer - rules.timer_step_secs).max(0.0);
            self.last_timer_tick_time = now;
            report.timer_decremented = true;
            if self.countdown_timer <= 0.0 {
                self.end_with(Outcome::HostagesEscaped, now, &mut report);
                return report;
            }
        }

        let move_due = self
            .last_move_time
            .is_none_or(|last| now.saturating_since(last) >= rules.move_interval());
        if !move_due {
            return report;
        }

        match self.adversary.step(&self.grid, &self.obstacles, now) {
            StepOutcome::Stunned => {},
            StepOutcome::Trapped => self.end_with(Outcome::AdversaryTrapped, now, &mut report),
            StepOutcome::Moved(cell) => {
                self.last_move_time = Some(now);
                report.moved = Some(cell);
                if self.adversary.at_goal() {
                    self.end_with(Outcome::AdversaryEscaped, now, &mut report);
                    return report;
                }
                self.resolve_arrival(rules, now, &mut report);
            },
        }
        report
    }

    fn resolve_arrival(&mut self, rules: &GameRules, now: Timestamp, report: &mut TickReport) {
        let Some(arrival) = self.adversary.on_arrival(&mut self.obstacles, rules, now) else {
            return;
        };
        let hit = arrival.hit;
        report.events.push(EventPayload::ObstacleHit {
            obstacle_id: hit.obstacle_id,
            kind: hit.kind,
            position: hit.position,
            remaining_durability: hit.remaining_durability,
        });
        if hit.destroyed {
            report.events.push(EventPayload::ObstacleDestroyed {
                obstacle_id: hit.obstacle_id,
                kind: hit.kind,
                position: hit.position,
            });
        }

        match arrival.effect {
            Effect::None => {},
            Effect::Stunned { until } => {
                tracing::debug!(session_id = self.id, position = %hit.position, %until, "Adversary stunned");
                report.events.push(EventPayload::AdversaryStunned {
                    position: hit.position,
                    until,
                });
            },
            Effect::DrainTimer(amount) => {
                self.countdown_timer = (self.countdown_timer - amount).max(0.0);
                report.events.push(EventPayload::TimerDrained {
                    amount,
                    remaining: self.countdown_timer,
                });
                if self.countdown_timer <= 0.0 {
                    self.end_with(Outcome::HostagesEscaped, now, report);
                }
            },
        }
    }

    fn end_with(&mut self, outcome: Outcome, now: Timestamp, report: &mut TickReport) {
        if self.terminate(outcome, now) {
            report.ended = Some(outcome);
        }
    }

    /// Move the session to its terminal state. Returns `false` if it already was terminal.
    pub fn terminate(&mut self, outcome: Outcome, now: Timestamp) -> bool {
        if self.is_terminal() {
            return false;
        }
        if let Some(since) = self.paused_at.take() {
            self.paused_total_ms += now.saturating_since(since).as_millis() as u64;
        }
        self.status = outcome.status();
        self.outcome = Some(outcome);
        self.ended_at = Some(now);
        self.time_survived_ms = self.elapsed(now).as_millis() as u64;
        tracing::info!(
            session_id = self.id,
            player_id = self.player_id,
            ?outcome,
            time_survived_ms = self.time_survived_ms,
            "Session ended"
        );
        true
    }

    /// Freeze the session. Ticks are no-ops until it resumes.
    pub fn pause(&mut self, now: Timestamp) -> Result<EventPayload, GameError> {
        self.ensure_active()?;
        self.status = SessionStatus::Paused;
        self.paused_at = Some(now);
        Ok(EventPayload::SessionPaused)
    }

    /// Unfreeze a paused session, shifting every cadence stamp by the paused
    /// span so movement and countdown pick up where they left off.
    pub fn resume(&mut self, now: Timestamp) -> Result<EventPayload, GameError> {
        let (SessionStatus::Paused, Some(since)) = (self.status, self.paused_at) else {
            return Err(GameError::SessionNotActive {
                session_id: self.id,
                status: self.status,
            });
        };
        let span = now.saturating_since(since);
        self.last_timer_tick_time = self.last_timer_tick_time + span;
        if let Some(last) = self.last_move_time.as_mut() {
            *last = *last + span;
        }
        self.adversary.shift_stun(span);
        self.paused_total_ms += span.as_millis() as u64;
        self.paused_at = None;
        self.status = SessionStatus::Active;
        Ok(EventPayload::SessionResumed {
            paused_for_ms: span.as_millis() as u64,
        })
    }
}
