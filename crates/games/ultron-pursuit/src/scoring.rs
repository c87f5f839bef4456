use ultron_core::events::EventPayload;
use ultron_core::player::StatsDelta;
use ultron_core::session::{Outcome, ScoringState};

use crate::rules::GameRules;
use crate::session::Session;

/// Score for a session that ended with `outcome`.
///
/// Clean wins are flat. A claimed victory pays for the countdown left on
/// the clock. Losses pay for active time survived, computed in whole
/// milliseconds so 9.3s at 20 points per second is exactly 186.
pub fn calculate_score(outcome: Outcome, session: &Session, rules: &GameRules) -> i64 {
    match outcome {
        Outcome::HostagesEscaped | Outcome::AdversaryTrapped => rules.clean_win_score,
        Outcome::ClaimedVictory => {
            (session.countdown_timer * rules.claimed_win_multiplier).floor() as i64
        },
        Outcome::AdversaryEscaped | Outcome::Forfeit | Outcome::Superseded => {
            session.time_survived_ms as i64 * rules.loss_points_per_sec / 1000
        },
    }
}

/// Everything the orchestrator needs to record a finished session.
#[derive(Debug, Clone, PartialEq)]
pub struct Finalization {
    pub score: i64,
    pub delta: StatsDelta,
    pub event: EventPayload,
}

/// Stamp the final score on a terminal session. `None` while the session is still open.
pub fn finalize(session: &mut Session, rules: &GameRules) -> Option<Finalization> {
    let outcome = session.outcome?;
    let ended_at = session.ended_at?;
    let score = calculate_score(outcome, session, rules);
    session.score = score;
    session.scoring = ScoringState::Pending;
    let time_survived_secs = session.time_survived_ms as f64 / 1000.0;
    Some(Finalization {
        score,
        delta: StatsDelta {
            session_id: session.id,
            player_id: session.player_id,
            score,
            won: outcome.is_win(),
            time_survived_secs,
            ended_at,
        },
        event: EventPayload::SessionEnded {
            outcome,
            score,
            time_survived_secs,
        },
    })
}

#[cfg(test)]
mod tests {
    use ultron_core::test_helpers::{T0, at_millis, at_secs};

    use super::*;

    fn ended(outcome: Outcome, at: ultron_core::time::Timestamp) -> Session {
        let mut session = Session::new(3, 8, &GameRules::default(), T0).unwrap();
        session.terminate(outcome, at);
        session
    }

    #[test]
    fn clean_wins_are_flat() {
        let rules = GameRules::default();
        for outcome in [Outcome::HostagesEscaped, Outcome::AdversaryTrapped] {
            assert_eq!(calculate_score(outcome, &ended(outcome, at_secs(30)), &rules), 1000);
        }
    }

    #[test]
    fn loss_after_nine_point_three_seconds() {
        let rules = GameRules::default();
        let session = ended(Outcome::AdversaryEscaped, at_millis(9_300));
        assert_eq!(calculate_score(Outcome::AdversaryEscaped, &session, &rules), 186);
    }

    #[test]
    fn claimed_victory_pays_for_remaining_countdown() {
        let rules = GameRules::default();
        let mut session = Session::new(3, 8, &rules, T0).unwrap();
        session.countdown_timer = 23.75;
        session.terminate(Outcome::ClaimedVictory, at_secs(17));
        assert_eq!(calculate_score(Outcome::ClaimedVictory, &session, &rules), 237);
    }

    #[test]
    fn paused_time_is_not_rewarded() {
        let rules = GameRules::default();
        let mut session = Session::new(3, 8, &rules, T0).unwrap();
        session.pause(at_secs(5)).unwrap();
        session.resume(at_secs(65)).unwrap();
        session.terminate(Outcome::Forfeit, at_secs(70));
        assert_eq!(calculate_score(Outcome::Forfeit, &session, &rules), 200);
    }

    #[test]
    fn finalize_builds_delta_and_event() {
        let rules = GameRules::default();
        let mut session = ended(Outcome::AdversaryTrapped, at_secs(12));
        let fin = finalize(&mut session, &rules).unwrap();
        assert_eq!(fin.score, 1000);
        assert_eq!(session.score, 1000);
        assert!(fin.delta.won);
        assert_eq!(fin.delta.session_id, 3);
        assert_eq!(fin.delta.player_id, 8);
        assert_eq!(fin.delta.time_survived_secs, 12.0);
        assert_eq!(fin.event.kind(), "session.ended");
    }

    #[test]
    fn finalize_ignores_open_sessions() {
        let rules = GameRules::default();
        let mut session = Session::new(3, 8, &rules, T0).unwrap();
        assert!(finalize(&mut session, &rules).is_none());
        assert_eq!(session.score, 0);
    }
}
