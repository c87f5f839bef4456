use tracing_subscriber::EnvFilter;

use ultron_pursuit::GameRules;
use ultron_server::config::ServerConfig;
use ultron_server::{build_app, spawn_session_sweeper};

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("ULTRON_LOG_JSON").is_ok_and(|v| v == "1") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = ServerConfig::load();
    config.validate();

    let rules = GameRules::load();
    if let Err(problems) = rules.validate() {
        for problem in &problems {
            tracing::error!("game rules: {problem}");
        }
        std::process::exit(1);
    }

    let listen_addr = config.listen_addr.clone();
    let sweep_enabled = config.sessions.sweep_enabled;
    let (app, state) = build_app(config, rules);
    if sweep_enabled {
        spawn_session_sweeper(state.clone());
    }

    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr = %listen_addr, error = %e, "Failed to bind");
            std::process::exit(1);
        },
    };
    tracing::info!(addr = %listen_addr, "Ultron server listening");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutting down");
    };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
