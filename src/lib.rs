#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::unused_async)]

//! mqctl library — the building blocks of the gateway binary.
//!
//! - `bridge` — MQTT connection, receiver task, command publishing
//! - `cache` — last-known status per device
//! - `topics` — command/status topic naming
//! - `tools` — tool registry for `tools/list`
//! - `rpc` — JSON-RPC envelope, dispatcher, error codes
//! - `auth` — API key extraction and constant-time comparison
//! - `config` — configuration loading
//! - `routes` — HTTP route handlers and router

pub mod auth;
pub mod bridge;
pub mod cache;
pub mod config;
pub mod routes;
pub mod rpc;
pub mod state;
pub mod tools;
pub mod topics;

// Re-export key types at crate root for convenience.
pub use bridge::{BrokerBridge, ConnectionState, DeviceLink};
pub use cache::StatusCache;
pub use config::Config;
pub use rpc::Dispatcher;
pub use state::AppState;
pub use tools::ToolRegistry;
