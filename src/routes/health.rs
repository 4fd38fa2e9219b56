//! Unauthenticated health-check endpoint.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::bridge::ConnectionState;
use crate::AppState;

/// `GET /api/health` — liveness probe plus broker connection health.
///
/// Always `200`; `status` is `"degraded"` while the broker is not connected or
/// the status subscription is not active, so monitoring can alert without the
/// load balancer pulling the instance.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let uptime = state.start_time.elapsed().as_secs();
    let broker_state = state.bridge.state();
    let stats = state.bridge.stats();
    let connected = broker_state == ConnectionState::Connected;
    let subscribed = state.bridge.is_subscribed();

    Json(json!({
        "status": if connected && subscribed { "ok" } else { "degraded" },
        "uptime_secs": uptime,
        "version": env!("CARGO_PKG_VERSION"),
        "broker": {
            "state": broker_state,
            "connected": connected,
            "subscribed": subscribed,
            "reconnects": stats.reconnects,
            "messages_received": stats.messages_received,
            "commands_published": stats.commands_published,
            "publish_failures": stats.publish_failures,
            "cached_devices": state.bridge.cached_devices(),
        },
    }))
}
