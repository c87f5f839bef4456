use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

pub type PlayerId = u64;
pub type SessionId = u64;
pub type ObstacleId = u64;

/// Outcome of one terminated session, folded into the player's records exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsDelta {
    pub session_id: SessionId,
    pub player_id: PlayerId,
    pub score: i64,
    pub won: bool,
    pub time_survived_secs: f64,
    pub ended_at: Timestamp,
}

/// Lifetime totals for one player.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub player_id: PlayerId,
    pub games_played: u32,
    pub games_won: u32,
    pub total_score: i64,
    pub best_score: i64,
    pub total_time_survived: f64,
    pub last_played: Option<Timestamp>,
}

impl PlayerStats {
    pub fn new(player_id: PlayerId) -> Self {
        Self {
            player_id,
            ..Self::default()
        }
    }

    pub fn apply(&mut self, delta: &StatsDelta) {
        self.games_played += 1;
        if delta.won {
            self.games_won += 1;
        }
        self.total_score += delta.score;
        self.best_score = self.best_score.max(delta.score);
        self.total_time_survived += delta.time_survived_secs;
        self.last_played = Some(delta.ended_at);
    }

    /// Percentage of games won, 0 when nothing has been played.
    pub fn win_rate(&self) -> f64 {
        if self.games_played == 0 {
            return 0.0;
        }
        f64::from(self.games_won) / f64::from(self.games_played) * 100.0
    }
}

/// Public leaderboard row for one player.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub player_id: PlayerId,
    pub highest_score: i64,
    pub total_games: u32,
    pub games_won: u32,
    pub total_time_survived: f64,
    pub win_rate: f64,
    pub last_played: Option<Timestamp>,
}

impl LeaderboardEntry {
    pub fn new(player_id: PlayerId) -> Self {
        Self {
            player_id,
            ..Self::default()
        }
    }

    pub fn apply(&mut self, delta: &StatsDelta) {
        self.total_games += 1;
        if delta.won {
            self.games_won += 1;
        }
        self.highest_score = self.highest_score.max(delta.score);
        self.total_time_survived += delta.time_survived_secs;
        self.last_played = Some(delta.ended_at);
        self.win_rate = f64::from(self.games_won) / f64::from(self.total_games) * 100.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(session_id: SessionId, score: i64, won: bool) -> StatsDelta {
        StatsDelta {
            session_id,
            player_id: 7,
            score,
            won,
            time_survived_secs: 12.5,
            ended_at: Timestamp::from_millis(session_id * 1000),
        }
    }

    #[test]
    fn stats_accumulate_totals_and_best() {
        let mut stats = PlayerStats::new(7);
        stats.apply(&delta(1, 1000, true));
        stats.apply(&delta(2, 186, false));
        assert_eq!(stats.games_played, 2);
        assert_eq!(stats.games_won, 1);
        assert_eq!(stats.total_score, 1186);
        assert_eq!(stats.best_score, 1000);
        assert!((stats.total_time_survived - 25.0).abs() < f64::EPSILON);
        assert_eq!(stats.last_played, Some(Timestamp::from_millis(2000)));
        assert!((stats.win_rate() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_stats_have_zero_win_rate() {
        assert_eq!(PlayerStats::new(1).win_rate(), 0.0);
    }

    #[test]
    fn leaderboard_tracks_highest_and_rate() {
        let mut entry = LeaderboardEntry::new(7);
        entry.apply(&delta(1, 120, false));
        entry.apply(&delta(2, 1000, true));
        entry.apply(&delta(3, 40, false));
        assert_eq!(entry.highest_score, 1000);
        assert_eq!(entry.total_games, 3);
        assert_eq!(entry.games_won, 1);
        assert!((entry.win_rate - 100.0 / 3.0).abs() < 1e-9);
    }
}
