//! Persistence collaborator.
//!
//! The orchestrator only talks to storage through [`SessionStore`]. The
//! in-memory [`MemoryStore`] backs the server and the tests; a database
//! implementation plugs in behind the same trait.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use thiserror::Error;
use ultron_core::error::GameError;
use ultron_core::events::{EventPayload, LoggedEvent};
use ultron_core::player::{LeaderboardEntry, PlayerId, PlayerStats, SessionId, StatsDelta};
use ultron_core::session::ScoringState;
use ultron_core::time::Timestamp;
use ultron_pursuit::Session;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store lock poisoned")]
    Poisoned,
}

impl From<StoreError> for GameError {
    fn from(e: StoreError) -> Self {
        GameError::PersistenceFailure(e.to_string())
    }
}

/// Whether `apply_stats` changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsApplied {
    Applied,
    /// The delta for this session was already folded in.
    AlreadyApplied,
}

pub trait SessionStore: Send + Sync {
    fn allocate_session_id(&self) -> Result<SessionId, StoreError>;

    /// Insert or replace a session, including its full obstacle history.
    fn save_session(&self, session: &Session) -> Result<(), StoreError>;

    fn load_session(&self, id: SessionId) -> Result<Option<Session>, StoreError>;

    /// The player's active or paused session, if any.
    fn open_session_for(&self, player_id: PlayerId) -> Result<Option<SessionId>, StoreError>;

    /// Every session id that is not terminal.
    fn open_sessions(&self) -> Result<Vec<SessionId>, StoreError>;

    /// Terminal sessions whose stats have not been applied yet.
    fn unscored_sessions(&self) -> Result<Vec<SessionId>, StoreError>;

    fn append_event(
        &self,
        session_id: SessionId,
        timestamp: Timestamp,
        payload: EventPayload,
    ) -> Result<LoggedEvent, StoreError>;

    fn events(&self, session_id: SessionId) -> Result<Vec<LoggedEvent>, StoreError>;

    /// Fold a finished session into the player's stats and leaderboard row in
    /// one step. Applying the same session twice is a no-op.
    fn apply_stats(&self, delta: &StatsDelta) -> Result<StatsApplied, StoreError>;

    fn player_stats(&self, player_id: PlayerId) -> Result<Option<PlayerStats>, StoreError>;

    /// Top rows ordered by highest score, then wins.
    fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError>;
}

#[derive(Default)]
struct MemoryInner {
    last_session_id: SessionId,
    sessions: HashMap<SessionId, Session>,
    events: HashMap<SessionId, Vec<LoggedEvent>>,
    stats: HashMap<PlayerId, PlayerStats>,
    leaderboard: HashMap<PlayerId, LeaderboardEntry>,
    applied: HashSet<SessionId>,
}

/// In-memory store. One mutex guards everything so `apply_stats` is atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Number of sessions stored, terminal ones included.
    pub fn session_count(&self) -> usize {
        self.lock().map(|inner| inner.sessions.len()).unwrap_or(0)
    }
}

impl SessionStore for MemoryStore {
    fn allocate_session_id(&self) -> Result<SessionId, StoreError> {
        let mut inner = self.lock()?;
        inner.last_session_id += 1;
        Ok(inner.last_session_id)
    }

    fn save_session(&self, session: &Session) -> Result<(), StoreError> {
        self.lock()?.sessions.insert(session.id, session.clone());
        Ok(())
    }

    fn load_session(&self, id: SessionId) -> Result<Option<Session>, StoreError> {
        Ok(self.lock()?.sessions.get(&id).cloned())
    }

    fn open_session_for(&self, player_id: PlayerId) -> Result<Option<SessionId>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .sessions
            .values()
            .filter(|s| s.player_id == player_id && s.status.is_open())
            .map(|s| s.id)
            .max())
    }

    fn open_sessions(&self) -> Result<Vec<SessionId>, StoreError> {
        let inner = self.lock()?;
        let mut ids: Vec<_> = inner
            .sessions
            .values()
            .filter(|s| s.status.is_open())
            .map(|s| s.id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    fn unscored_sessions(&self) -> Result<Vec<SessionId>, StoreError> {
        let inner = self.lock()?;
        let mut ids: Vec<_> = inner
            .sessions
            .values()
            .filter(|s| s.is_terminal() && s.scoring != ScoringState::Scored)
            .map(|s| s.id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    fn append_event(
        &self,
        session_id: SessionId,
        timestamp: Timestamp,
        payload: EventPayload,
    ) -> Result<LoggedEvent, StoreError> {
        let mut inner = self.lock()?;
        let log = inner.events.entry(session_id).or_default();
        let event = LoggedEvent {
            seq: log.len() as u64 + 1,
            session_id,
            timestamp,
            payload,
        };
        log.push(event.clone());
        Ok(event)
    }

    fn events(&self, session_id: SessionId) -> Result<Vec<LoggedEvent>, StoreError> {
        Ok(self
            .lock()?
            .events
            .get(&session_id)
            .cloned()
            .unwrap_or_default())
    }

    fn apply_stats(&self, delta: &StatsDelta) -> Result<StatsApplied, StoreError> {
        let mut inner = self.lock()?;
        if !inner.applied.insert(delta.session_id) {
            return Ok(StatsApplied::AlreadyApplied);
        }
        inner
            .stats
            .entry(delta.player_id)
            .or_insert_with(|| PlayerStats::new(delta.player_id))
            .apply(delta);
        inner
            .leaderboard
            .entry(delta.player_id)
            .or_insert_with(|| LeaderboardEntry::new(delta.player_id))
            .apply(delta);
        Ok(StatsApplied::Applied)
    }

    fn player_stats(&self, player_id: PlayerId) -> Result<Option<PlayerStats>, StoreError> {
        Ok(self.lock()?.stats.get(&player_id).cloned())
    }

    fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let inner = self.lock()?;
        let mut rows: Vec<_> = inner.leaderboard.values().cloned().collect();
        rows.sort_by(|a, b| {
            b.highest_score
                .cmp(&a.highest_score)
                .then(b.games_won.cmp(&a.games_won))
                .then(a.player_id.cmp(&b.player_id))
        });
        rows.truncate(limit);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use ultron_core::test_helpers::{T0, make_delta};
    use ultron_pursuit::GameRules;

    use super::*;

    #[test]
    fn session_ids_are_monotonic() {
        let store = MemoryStore::new();
        assert_eq!(store.allocate_session_id().unwrap(), 1);
        assert_eq!(store.allocate_session_id().unwrap(), 2);
    }

    #[test]
    fn saves_and_loads_sessions() {
        let store = MemoryStore::new();
        let session = Session::new(1, 5, &GameRules::default(), T0).unwrap();
        store.save_session(&session).unwrap();
        assert_eq!(store.load_session(1).unwrap(), Some(session));
        assert_eq!(store.load_session(2).unwrap(), None);
        assert_eq!(store.open_session_for(5).unwrap(), Some(1));
        assert_eq!(store.open_session_for(6).unwrap(), None);
    }

    #[test]
    fn event_log_is_sequenced_per_session() {
        let store = MemoryStore::new();
        store.append_event(1, T0, EventPayload::SessionPaused).unwrap();
        store.append_event(2, T0, EventPayload::SessionPaused).unwrap();
        let second = store
            .append_event(1, T0, EventPayload::SessionResumed { paused_for_ms: 10 })
            .unwrap();
        assert_eq!(second.seq, 2);
        let log = store.events(1).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].seq, 1);
        assert!(store.events(3).unwrap().is_empty());
    }

    #[test]
    fn stats_apply_exactly_once_per_session() {
        let store = MemoryStore::new();
        let delta = make_delta(1, 5, 1000, true);
        assert_eq!(store.apply_stats(&delta).unwrap(), StatsApplied::Applied);
        assert_eq!(store.apply_stats(&delta).unwrap(), StatsApplied::AlreadyApplied);

        let stats = store.player_stats(5).unwrap().unwrap();
        assert_eq!(stats.games_played, 1);
        assert_eq!(stats.total_score, 1000);
        let board = store.leaderboard(10).unwrap();
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].total_games, 1);
    }

    #[test]
    fn leaderboard_orders_by_highest_score() {
        let store = MemoryStore::new();
        store.apply_stats(&make_delta(1, 10, 300, false)).unwrap();
        store.apply_stats(&make_delta(2, 11, 1000, true)).unwrap();
        store.apply_stats(&make_delta(3, 12, 1000, true)).unwrap();
        store.apply_stats(&make_delta(4, 12, 1000, true)).unwrap();
        let board = store.leaderboard(2).unwrap();
        let players: Vec<_> = board.iter().map(|e| e.player_id).collect();
        assert_eq!(players, vec![12, 11]);
    }
}
