use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ultron_pursuit::GameRules;

use crate::auth::AuthConfig;
use crate::config::ServerConfig;
use crate::session_manager::{SessionManager, SharedSessionManager};
use crate::store::{MemoryStore, SessionStore};

#[derive(Clone)]
pub struct AppState {
    pub sessions: SharedSessionManager,
    pub auth: AuthConfig,
    pub config: Arc<ServerConfig>,
    pub ws_connection_count: Arc<AtomicUsize>,
    pub sse_subscriber_count: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(config: ServerConfig, rules: GameRules) -> Self {
        Self::with_store(config, rules, Arc::new(MemoryStore::new()))
    }

    pub fn with_store(config: ServerConfig, rules: GameRules, store: Arc<dyn SessionStore>) -> Self {
        let auth = AuthConfig {
            bearer_token: config.auth.bearer_token.clone(),
        };
        let sessions = Arc::new(SessionManager::new(
            store,
            rules,
            config.limits.snapshot_buffer,
        ));
        Self {
            sessions,
            auth,
            config: Arc::new(config),
            ws_connection_count: Arc::new(AtomicUsize::new(0)),
            sse_subscriber_count: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// Counts a live connection for as long as it is held.
pub struct ConnectionGuard {
    counter: Arc<AtomicUsize>,
}

impl ConnectionGuard {
    pub fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self { counter }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::Relaxed);
    }
}
