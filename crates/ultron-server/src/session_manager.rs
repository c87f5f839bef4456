use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock, broadcast};

use ultron_core::error::GameError;
use ultron_core::events::{EventPayload, LoggedEvent};
use ultron_core::grid::Cell;
use ultron_core::player::{LeaderboardEntry, PlayerId, PlayerStats, SessionId, StatsDelta};
use ultron_core::session::{ObstacleKind, ObstacleView, Outcome, ScoringState, SessionSnapshot};
use ultron_core::time::Timestamp;
use ultron_pursuit::{GameRules, RoutePreview, Session, finalize};

use crate::game_loop::{DriverHandle, spawn_session_driver};
use crate::store::SessionStore;

/// How the player chose to end a session early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManualOutcome {
    Victory,
    Forfeit,
}

impl From<ManualOutcome> for Outcome {
    fn from(m: ManualOutcome) -> Self {
        match m {
            ManualOutcome::Victory => Outcome::ClaimedVictory,
            ManualOutcome::Forfeit => Outcome::Forfeit,
        }
    }
}

/// Result of ending a session by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalScore {
    pub session_id: SessionId,
    pub outcome: Outcome,
    pub score: i64,
    /// `false` when the score could not be folded into the player's stats yet.
    pub recorded: bool,
}

/// A snapshot published to live subscribers, numbered per session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionUpdate {
    pub seq: u64,
    pub snapshot: SessionSnapshot,
}

/// An open session held in memory between calls.
struct LiveSession {
    session: Mutex<Session>,
    updates: broadcast::Sender<SessionUpdate>,
    published: AtomicU64,
    driver: StdMutex<DriverSlot>,
}

/// The session's driver and the number of live connections relying on it.
#[derive(Default)]
struct DriverSlot {
    handle: Option<DriverHandle>,
    attached: usize,
}

impl LiveSession {
    fn new(session: Session, capacity: usize) -> Self {
        let (updates, _) = broadcast::channel(capacity);
        Self {
            session: Mutex::new(session),
            updates,
            published: AtomicU64::new(0),
            driver: StdMutex::new(DriverSlot::default()),
        }
    }

    fn publish(&self, snapshot: SessionSnapshot) {
        let seq = self.published.fetch_add(1, Ordering::Relaxed) + 1;
        // No subscribers is fine.
        let _ = self.updates.send(SessionUpdate { seq, snapshot });
    }

    fn take_driver(&self) -> Option<DriverHandle> {
        self.driver.lock().ok().and_then(|mut d| d.handle.take())
    }

    fn is_driven(&self) -> bool {
        self.driver
            .lock()
            .map(|d| d.handle.as_ref().is_some_and(DriverHandle::is_running))
            .unwrap_or(false)
    }
}

/// Owns every session's lifecycle. The only component transports talk to.
///
/// Each open session lives behind its own mutex, so ticks for different
/// sessions run in parallel while a single session only ever sees one
/// mutation at a time. Every mutation is applied to a copy, persisted, and
/// only then committed, so the store stays the source of truth.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    rules: Arc<GameRules>,
    live: RwLock<HashMap<SessionId, Arc<LiveSession>>>,
    update_capacity: usize,
}

pub type SharedSessionManager = Arc<SessionManager>;

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, rules: GameRules, update_capacity: usize) -> Self {
        Self {
            store,
            rules: Arc::new(rules),
            live: RwLock::new(HashMap::new()),
            update_capacity: update_capacity.max(1),
        }
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    /// Live entry for an open session, loading it from the store on first use.
    /// Terminal sessions are handed out without being cached.
    async fn entry(&self, id: SessionId) -> Result<Arc<LiveSession>, GameError> {
        if let Some(entry) = self.live.read().await.get(&id) {
            return Ok(Arc::clone(entry));
        }
        let session = self
            .store
            .load_session(id)?
            .ok_or(GameError::SessionNotFound(id))?;
        if session.is_terminal() {
            return Ok(Arc::new(LiveSession::new(session, 1)));
        }
        let mut live = self.live.write().await;
        let entry = live
            .entry(id)
            .or_insert_with(|| Arc::new(LiveSession::new(session, self.update_capacity)));
        Ok(Arc::clone(entry))
    }

    /// Apply `f` to a copy of the session, persist it, then commit and
    /// publish while still holding the session lock. No-op changes are
    /// neither saved nor published.
    ///
    /// A session that becomes terminal is scored and its stats recorded
    /// before the snapshot is published.
    async fn mutate<T, F>(
        &self,
        id: SessionId,
        now: Timestamp,
        f: F,
    ) -> Result<(T, SessionSnapshot), GameError>
    where
        F: FnOnce(&mut Session) -> Result<(T, Vec<EventPayload>), GameError>,
    {
        let entry = self.entry(id).await?;
        let mut guard = entry.session.lock().await;
        let mut draft = guard.clone();
        let (out, mut events) = f(&mut draft)?;

        let changed = draft != *guard;
        if changed {
            let mut delta = None;
            if draft.is_terminal()
                && !guard.is_terminal()
                && let Some(fin) = finalize(&mut draft, &self.rules)
            {
                events.push(fin.event);
                delta = Some(fin.delta);
            }
            if let Err(e) = self.store.save_session(&draft) {
                tracing::error!(session_id = id, error = %e, "Failed to persist session, change discarded");
                return Err(e.into());
            }
            *guard = draft;
            if let Some(delta) = delta {
                self.record_stats(&mut guard, &delta);
            }
            for payload in events {
                let kind = payload.kind();
                if let Err(e) = self.store.append_event(id, now, payload) {
                    tracing::error!(session_id = id, kind, error = %e, "Failed to append session event, event lost");
                }
            }
        }

        let snapshot = guard.snapshot();
        let terminal = guard.is_terminal();
        // Publish under the lock so subscribers see snapshots in commit order.
        if changed {
            entry.publish(snapshot.clone());
        }
        drop(guard);
        if terminal {
            self.live.write().await.remove(&id);
        }
        Ok((out, snapshot))
    }

    /// Fold a finished session into the player's stats and mark it scored or unscored.
    fn record_stats(&self, session: &mut Session, delta: &StatsDelta) {
        match self.store.apply_stats(delta) {
            Ok(applied) => {
                tracing::info!(
                    session_id = session.id,
                    player_id = session.player_id,
                    score = delta.score,
                    ?applied,
                    "Session scored"
                );
                session.scoring = ScoringState::Scored;
            },
            Err(e) => {
                tracing::error!(
                    session_id = session.id,
                    player_id = session.player_id,
                    score = delta.score,
                    error = %e,
                    "Failed to record stats, session left unscored"
                );
                session.scoring = ScoringState::Unscored {
                    reason: e.to_string(),
                };
            },
        }
        if let Err(e) = self.store.save_session(session) {
            tracing::warn!(session_id = session.id, error = %e, "Failed to persist scoring state");
        }
    }

    /// Start a fresh session for `player_id`, ending any session they still have open.
    pub async fn create_session(
        &self,
        player_id: PlayerId,
        now: Timestamp,
    ) -> Result<SessionSnapshot, GameError> {
        if let Some(previous) = self.store.open_session_for(player_id)? {
            self.stop_driver(previous).await;
            self.mutate(previous, now, |s| {
                s.terminate(Outcome::Superseded, now);
                Ok(((), Vec::new()))
            })
            .await?;
            tracing::info!(player_id, session_id = previous, "Superseded open session");
        }

        let id = self.store.allocate_session_id()?;
        let session = Session::new(id, player_id, &self.rules, now)?;
        self.store.save_session(&session)?;
        let snapshot = session.snapshot();
        self.live.write().await.insert(
            id,
            Arc::new(LiveSession::new(session, self.update_capacity)),
        );
        tracing::info!(session_id = id, player_id, "Session created");
        Ok(snapshot)
    }

    pub async fn place_obstacle(
        &self,
        id: SessionId,
        kind: ObstacleKind,
        x: i32,
        y: i32,
        now: Timestamp,
    ) -> Result<ObstacleView, GameError> {
        let rules = Arc::clone(&self.rules);
        let (view, _) = self
            .mutate(id, now, |s| {
                let (view, event) = s.place_obstacle(kind, Cell::new(x, y), &rules, now)?;
                Ok((view, vec![event]))
            })
            .await?;
        tracing::debug!(session_id = id, %kind, x, y, "Obstacle placed");
        Ok(view)
    }

    /// Advance the session to `now`. Used by both live drivers and pollers.
    pub async fn tick(&self, id: SessionId, now: Timestamp) -> Result<SessionSnapshot, GameError> {
        let rules = Arc::clone(&self.rules);
        let (_, snapshot) = self
            .mutate(id, now, |s| {
                let report = s.tick(&rules, now);
                Ok(((), report.events))
            })
            .await?;
        Ok(snapshot)
    }

    pub async fn get_state(&self, id: SessionId) -> Result<SessionSnapshot, GameError> {
        let entry = self.entry(id).await?;
        let session = entry.session.lock().await;
        Ok(session.snapshot())
    }

    pub async fn pause(&self, id: SessionId, now: Timestamp) -> Result<SessionSnapshot, GameError> {
        let (_, snapshot) = self
            .mutate(id, now, |s| Ok(((), vec![s.pause(now)?])))
            .await?;
        tracing::info!(session_id = id, "Session paused");
        Ok(snapshot)
    }

    pub async fn resume(&self, id: SessionId, now: Timestamp) -> Result<SessionSnapshot, GameError> {
        let (_, snapshot) = self
            .mutate(id, now, |s| Ok(((), vec![s.resume(now)?])))
            .await?;
        tracing::info!(session_id = id, "Session resumed");
        Ok(snapshot)
    }

    /// End an open session by player choice and return its final score.
    pub async fn end_session(
        &self,
        id: SessionId,
        outcome: ManualOutcome,
        now: Timestamp,
    ) -> Result<FinalScore, GameError> {
        let outcome = Outcome::from(outcome);
        self.stop_driver(id).await;
        let (_, snapshot) = self
            .mutate(id, now, |s| {
                if s.is_terminal() {
                    return Err(GameError::SessionNotActive {
                        session_id: s.id,
                        status: s.status,
                    });
                }
                s.terminate(outcome, now);
                Ok(((), Vec::new()))
            })
            .await?;
        Ok(FinalScore {
            session_id: id,
            outcome,
            score: snapshot.score,
            recorded: snapshot.scoring == ScoringState::Scored,
        })
    }

    pub async fn events(&self, id: SessionId) -> Result<Vec<LoggedEvent>, GameError> {
        self.entry(id).await?;
        Ok(self.store.events(id)?)
    }

    pub async fn route_preview(&self, id: SessionId) -> Result<RoutePreview, GameError> {
        let entry = self.entry(id).await?;
        let session = entry.session.lock().await;
        Ok(session.preview(&self.rules))
    }

    pub fn stats(&self, player_id: PlayerId) -> Result<Option<PlayerStats>, GameError> {
        Ok(self.store.player_stats(player_id)?)
    }

    pub fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, GameError> {
        Ok(self.store.leaderboard(limit)?)
    }

    /// Retry stats for terminal sessions whose scoring failed earlier.
    /// Returns how many were scored.
    pub fn reconcile_unscored(&self) -> Result<usize, GameError> {
        let mut scored = 0;
        for id in self.store.unscored_sessions()? {
            let Some(mut session) = self.store.load_session(id)? else {
                continue;
            };
            let Some(fin) = finalize(&mut session, &self.rules) else {
                continue;
            };
            self.record_stats(&mut session, &fin.delta);
            if session.scoring == ScoringState::Scored {
                scored += 1;
            }
        }
        if scored > 0 {
            tracing::info!(scored, "Reconciled unscored sessions");
        }
        Ok(scored)
    }

    /// Receive a snapshot after every tick or mutation of an open session.
    pub async fn subscribe(
        &self,
        id: SessionId,
    ) -> Result<broadcast::Receiver<SessionUpdate>, GameError> {
        Ok(self.entry(id).await?.updates.subscribe())
    }

    /// Register a live connection and make sure the session is ticking on its
    /// own task. Returns `true` if this call started the driver.
    ///
    /// Every successful call must be paired with [`Self::detach`].
    pub async fn attach(
        self: &Arc<Self>,
        id: SessionId,
        tick_interval: Duration,
    ) -> Result<bool, GameError> {
        let entry = self.entry(id).await?;
        let terminal = entry.session.lock().await.is_terminal();
        let mut slot = entry
            .driver
            .lock()
            .map_err(|_| GameError::PersistenceFailure("driver slot poisoned".to_string()))?;
        slot.attached += 1;
        if terminal || slot.handle.as_ref().is_some_and(DriverHandle::is_running) {
            return Ok(false);
        }
        slot.handle = Some(spawn_session_driver(Arc::clone(self), id, tick_interval));
        Ok(true)
    }

    /// Release a connection registered with [`Self::attach`]. The driver is
    /// stopped once the last connection is gone. Returns `true` if it was.
    pub async fn detach(&self, id: SessionId) -> bool {
        let Some(entry) = self.live.read().await.get(&id).cloned() else {
            return false;
        };
        let handle = match entry.driver.lock() {
            Ok(mut slot) => {
                slot.attached = slot.attached.saturating_sub(1);
                if slot.attached == 0 {
                    slot.handle.take()
                } else {
                    None
                }
            },
            Err(_) => None,
        };
        match handle {
            Some(handle) => {
                handle.stop();
                true
            },
            None => false,
        }
    }

    /// Number of live connections attached to the session.
    pub async fn attached(&self, id: SessionId) -> usize {
        self.live
            .read()
            .await
            .get(&id)
            .and_then(|e| e.driver.lock().ok().map(|slot| slot.attached))
            .unwrap_or(0)
    }

    /// Cancel the session's driver regardless of attached connections.
    /// The session itself is left as is.
    pub async fn stop_driver(&self, id: SessionId) -> bool {
        let entry = self.live.read().await.get(&id).cloned();
        match entry.and_then(|e| e.take_driver()) {
            Some(handle) => {
                handle.stop();
                true
            },
            None => false,
        }
    }

    /// Tick every open session that has no live driver.
    pub async fn sweep(&self, now: Timestamp) -> Result<usize, GameError> {
        let mut ticked = 0;
        for id in self.store.open_sessions()? {
            let driven = self
                .live
                .read()
                .await
                .get(&id)
                .is_some_and(|e| e.is_driven());
            if driven {
                continue;
            }
            match self.tick(id, now).await {
                Ok(_) => ticked += 1,
                Err(e) => tracing::warn!(session_id = id, error = %e, "Sweep tick failed"),
            }
        }
        Ok(ticked)
    }

    /// (open sessions held in memory, sessions with a running driver)
    pub async fn stats_summary(&self) -> (usize, usize) {
        let live = self.live.read().await;
        let driven = live.values().filter(|e| e.is_driven()).count();
        (live.len(), driven)
    }
}
