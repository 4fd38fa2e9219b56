//! Shared application state passed to every handler via Axum's `State` extractor.

use std::sync::Arc;
use std::time::Instant;

use crate::bridge::BrokerBridge;
use crate::config::Config;
use crate::rpc::Dispatcher;

/// Shared application state for the mqctl server.
#[derive(Clone)]
pub struct AppState {
    /// Immutable configuration loaded at startup.
    pub config: Arc<Config>,
    /// Monotonic instant when the server started (for uptime calculation).
    pub start_time: Instant,
    /// JSON-RPC dispatcher behind `POST /mcp`.
    pub dispatcher: Arc<Dispatcher>,
    /// Broker connection, read by `/api/health`.
    pub bridge: Arc<BrokerBridge>,
}
