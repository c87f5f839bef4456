//! Per-session tick driver.
//!
//! A session joined over WebSocket gets its own task that ticks it on a
//! fixed interval until it ends or the connection goes away. Sessions
//! without a driver are advanced by the sweeper or by REST polls.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use ultron_core::error::GameError;
use ultron_core::player::SessionId;
use ultron_core::time::Timestamp;

use crate::session_manager::SessionManager;

/// Handle to a running driver task.
#[derive(Debug)]
pub struct DriverHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl DriverHandle {
    /// Ask the driver to exit. It finishes the tick it is in, if any.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && !self.task.is_finished()
    }
}

/// Spawn a tick loop for `session_id` as a tokio task.
pub fn spawn_session_driver(
    manager: Arc<SessionManager>,
    session_id: SessionId,
    tick_interval: Duration,
) -> DriverHandle {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let task = tokio::spawn(async move {
        run_session_driver(&manager, session_id, tick_interval, token).await;
    });
    DriverHandle { cancel, task }
}

async fn run_session_driver(
    manager: &SessionManager,
    session_id: SessionId,
    tick_interval: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    tracing::debug!(session_id, ?tick_interval, "Session driver started");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(session_id, "Session driver cancelled");
                break;
            }
            _ = interval.tick() => {
                match manager.tick(session_id, Timestamp::now()).await {
                    Ok(snapshot) if snapshot.status.is_terminal() => {
                        tracing::debug!(session_id, status = %snapshot.status, "Session driver finished");
                        break;
                    },
                    Ok(_) => {},
                    Err(GameError::SessionNotFound(_)) => {
                        tracing::warn!(session_id, "Driven session disappeared");
                        break;
                    },
                    // Transient store failures: the tick was discarded, try again next interval.
                    Err(e) => tracing::warn!(session_id, error = %e, "Session tick failed"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use ultron_core::session::SessionStatus;
    use ultron_pursuit::GameRules;

    use super::*;
    use crate::store::{MemoryStore, SessionStore};

    fn fast_manager() -> Arc<SessionManager> {
        let rules = GameRules {
            countdown_secs: 30.0,
            timer_interval_secs: 0.01,
            timer_step_secs: 1.0,
            move_interval_secs: 0.01,
            ..GameRules::default()
        };
        Arc::new(SessionManager::new(
            Arc::new(MemoryStore::new()) as Arc<dyn SessionStore>,
            rules,
            64,
        ))
    }

    #[tokio::test]
    async fn driver_runs_session_to_completion() {
        let manager = fast_manager();
        let id = manager
            .create_session(1, Timestamp::now())
            .await
            .unwrap()
            .session_id;
        let handle = spawn_session_driver(Arc::clone(&manager), id, Duration::from_millis(5));

        tokio::time::timeout(Duration::from_secs(5), async {
            while handle.is_running() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("driver should exit once the session ends");

        let snap = manager.get_state(id).await.unwrap();
        assert!(snap.status.is_terminal());
    }

    #[tokio::test]
    async fn cancelled_driver_stops_ticking() {
        let manager = fast_manager();
        let id = manager
            .create_session(1, Timestamp::now())
            .await
            .unwrap()
            .session_id;
        let handle = spawn_session_driver(Arc::clone(&manager), id, Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.stop();
        assert!(!handle.is_running());
        tokio::time::sleep(Duration::from_millis(20)).await;

        let frozen = manager.get_state(id).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(manager.get_state(id).await.unwrap(), frozen);
        assert_eq!(frozen.status, SessionStatus::Active);
    }

    #[tokio::test]
    async fn driver_for_missing_session_exits() {
        let manager = fast_manager();
        let handle = spawn_session_driver(Arc::clone(&manager), 404, Duration::from_millis(5));
        tokio::time::timeout(Duration::from_secs(2), async {
            while !handle.task.is_finished() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("driver should give up on an unknown session");
    }
}
