use serde::Deserialize;

/// Top-level server configuration, loaded from `ultron.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub auth: AuthFileConfig,
    pub limits: LimitsConfig,
    pub sessions: SessionsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            auth: AuthFileConfig::default(),
            limits: LimitsConfig::default(),
            sessions: SessionsConfig::default(),
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    pub max_sse_subscribers: usize,
    /// Inbound WebSocket messages per second per connection.
    pub ws_rate_limit_per_sec: f64,
    /// Outbound frames buffered per WebSocket before the writer falls behind.
    pub player_message_buffer: usize,
    /// Snapshots buffered per session for live subscribers.
    pub snapshot_buffer: usize,
    pub request_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 200,
            max_sse_subscribers: 100,
            ws_rate_limit_per_sec: 20.0,
            player_message_buffer: 64,
            snapshot_buffer: 64,
            request_timeout_secs: 10,
        }
    }
}

/// Session driving configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// How often a live driver ticks its session. Finer than the game
    /// cadences so moves land close to their due time.
    pub tick_interval_ms: u64,
    /// Periodically tick open sessions nobody is driving.
    pub sweep_enabled: bool,
    pub sweep_interval_ms: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            sweep_enabled: true,
            sweep_interval_ms: 1000,
        }
    }
}

/// Auth section of the config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthFileConfig {
    pub bearer_token: Option<String>,
}

impl SessionsConfig {
    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.tick_interval_ms)
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.sweep_interval_ms)
    }
}

impl ServerConfig {
    /// Problems that make the config unusable. Empty when valid.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            problems.push(format!(
                "listen_addr {:?} is not a valid socket address",
                self.listen_addr
            ));
        }
        for (name, value) in [
            ("limits.max_ws_connections", self.limits.max_ws_connections),
            ("limits.max_sse_subscribers", self.limits.max_sse_subscribers),
            ("limits.player_message_buffer", self.limits.player_message_buffer),
            ("limits.snapshot_buffer", self.limits.snapshot_buffer),
        ] {
            if value == 0 {
                problems.push(format!("{name} must be > 0"));
            }
        }
        if self.limits.ws_rate_limit_per_sec <= 0.0 {
            problems.push("limits.ws_rate_limit_per_sec must be > 0".to_string());
        }
        if self.limits.request_timeout_secs == 0 {
            problems.push("limits.request_timeout_secs must be > 0".to_string());
        }
        if self.sessions.tick_interval_ms == 0 {
            problems.push("sessions.tick_interval_ms must be > 0".to_string());
        }
        if self.sessions.sweep_interval_ms == 0 {
            problems.push("sessions.sweep_interval_ms must be > 0".to_string());
        }
        problems
    }

    /// Validate configuration, exiting the process on fatal problems.
    pub fn validate(&self) {
        if self.auth.bearer_token.is_some() {
            tracing::warn!(
                "bearer_token is set in config file, use ULTRON_API_TOKEN env var in production"
            );
        }
        let problems = self.problems();
        if !problems.is_empty() {
            for problem in &problems {
                tracing::error!("{problem}");
            }
            std::process::exit(1);
        }
    }

    /// Load config from `ultron.toml` (or `ULTRON_CONFIG`) if it exists, then
    /// apply env var overrides.
    pub fn load() -> Self {
        let path = std::env::var("ULTRON_CONFIG").unwrap_or_else(|_| "ultron.toml".to_string());
        let mut config = match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!(path = %path, "Loaded server configuration");
                    cfg
                },
                Err(e) => {
                    tracing::warn!(path = %path, "Failed to parse server config: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!(path = %path, "No server config found, using defaults");
                ServerConfig::default()
            },
        };
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(addr) = std::env::var("ULTRON_LISTEN_ADDR")
            && !addr.is_empty()
        {
            self.listen_addr = addr;
        }
        if let Ok(token) = std::env::var("ULTRON_API_TOKEN")
            && !token.is_empty()
        {
            self.auth.bearer_token = Some(token);
        }
        if let Ok(val) = std::env::var("ULTRON_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            self.limits.max_ws_connections = n;
        }
        if let Ok(val) = std::env::var("ULTRON_MAX_SSE_SUBSCRIBERS")
            && let Ok(n) = val.parse::<usize>()
        {
            self.limits.max_sse_subscribers = n;
        }
        if let Ok(val) = std::env::var("ULTRON_WS_RATE_LIMIT")
            && let Ok(n) = val.parse::<f64>()
        {
            self.limits.ws_rate_limit_per_sec = n;
        }
        if let Ok(val) = std::env::var("ULTRON_TICK_INTERVAL_MS")
            && let Ok(n) = val.parse::<u64>()
        {
            self.sessions.tick_interval_ms = n;
        }
        if let Ok(val) = std::env::var("ULTRON_SWEEP_ENABLED")
            && let Ok(b) = val.parse::<bool>()
        {
            self.sessions.sweep_enabled = b;
        }
    }
}
