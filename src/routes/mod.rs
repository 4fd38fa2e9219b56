//! HTTP route handlers.
//!
//! | Method | Path          | Auth | Description                          |
//! |--------|---------------|------|--------------------------------------|
//! | GET    | `/api/health` | No   | Liveness probe + broker health       |
//! | POST   | `/mcp`        | Yes* | JSON-RPC tool discovery / invocation |
//!
//! *Checked by the RPC dispatcher, not by middleware, so failures are
//! JSON-RPC shaped.

pub mod health;
pub mod mcp;

use axum::{
    routing::{get, post},
    Router,
};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let limit = state.config.server.max_concurrent_requests.max(1);
    Router::new()
        .route("/api/health", get(health::health))
        .route("/mcp", post(mcp::mcp))
        .layer(GlobalConcurrencyLimitLayer::new(limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
