#![deny(clippy::all)]
#![warn(clippy::pedantic)]

//! # mqctl
//!
//! Tool gateway for MQTT-connected devices.
//!
//! mqctl exposes a small JSON-RPC endpoint (`POST /mcp`) through which an AI
//! agent (or any client holding the API key) can discover tools and switch
//! devices on and off or read their last reported status. Commands are
//! published to `devices/{id}/cmd`; status is collected from
//! `devices/+/status`.
//!
//! ## Startup
//!
//! 1. Load config (TOML file + env overrides), init tracing
//! 2. Start the broker bridge and wait until it is connected and subscribed,
//!    bounded by `server.ready_timeout_secs`; exit non-zero otherwise
//! 3. Bind the HTTP listener and serve until SIGINT/SIGTERM
//! 4. Disconnect from the broker
//!
//! ## Architecture
//!
//! ```text
//! main.rs          — entry point, clap subcommands, startup ordering, shutdown
//! config.rs        — TOML + env-var configuration
//! auth.rs          — API key extraction, constant-time comparison
//! rpc.rs           — JSON-RPC envelope, dispatcher, error codes
//! tools.rs         — tool registry
//! topics.rs        — MQTT topic naming
//! cache.rs         — status cache
//! bridge/
//!   mod.rs         — BrokerBridge, receiver task, connection state
//!   backoff.rs     — reconnect backoff with jitter
//!   stats.rs       — connection counters
//! routes/
//!   health.rs      — GET /api/health
//!   mcp.rs         — POST /mcp
//! ```

use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use mqctl::auth::ApiKey;
use mqctl::{routes, AppState, BrokerBridge, Config, Dispatcher, ToolRegistry};

/// Tool gateway for MQTT-connected devices.
#[derive(Parser)]
#[command(name = "mqctl", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    /// Path to TOML config file.
    #[arg(long, global = true)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP gateway (default when no subcommand given).
    Serve,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve) | None => run_server(cli.config.as_deref()).await,
    }
}

async fn run_server(config_path: Option<&str>) -> ExitCode {
    let config = match Config::load(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("mqctl: configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize tracing
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone());
    tracing_subscriber::fmt().with_env_filter(log_filter).init();

    info!("mqctl v{} starting", env!("CARGO_PKG_VERSION"));
    info!("Broker: {}:{}", config.mqtt.host, config.mqtt.port);
    info!("Listening on {}", config.server.listen);

    if config.auth.api_key == "change-me" {
        warn!("Using default API key — set API_KEY or update config");
    }

    let bridge = Arc::new(BrokerBridge::new(&config.mqtt));
    if let Err(e) = bridge.start() {
        error!("Failed to start broker bridge: {e}");
        return ExitCode::FAILURE;
    }

    let ready_timeout = Duration::from_secs(config.server.ready_timeout_secs);
    if let Err(e) = bridge.wait_ready(ready_timeout).await {
        error!("Broker unavailable, refusing to serve: {e}");
        bridge.stop().await;
        return ExitCode::FAILURE;
    }

    let dispatcher = Dispatcher::new(
        ApiKey(config.auth.api_key.clone()),
        ToolRegistry::builtin(),
        bridge.clone(),
    );

    let state = AppState {
        config: Arc::new(config),
        start_time: Instant::now(),
        dispatcher: Arc::new(dispatcher),
        bridge: bridge.clone(),
    };

    let listener = match TcpListener::bind(&state.config.server.listen).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind {}: {e}", state.config.server.listen);
            bridge.stop().await;
            return ExitCode::FAILURE;
        }
    };

    let app = routes::router(state);
    info!("Server ready");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    info!("Shutting down...");
    bridge.stop().await;

    if let Err(e) = served {
        error!("Server error: {e}");
        return ExitCode::FAILURE;
    }
    info!("Goodbye");
    ExitCode::SUCCESS
}

/// Resolves on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("Failed to register SIGTERM");
        tokio::select! {
            _ = ctrl_c => info!("Received SIGINT"),
            _ = sigterm.recv() => info!("Received SIGTERM"),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received SIGINT");
    }
}
