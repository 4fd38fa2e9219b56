//! Configuration loading and defaults.
//!
//! Configuration is resolved in order of precedence (highest wins):
//!
//! 1. **Environment variables** — `API_KEY`, `MQTT_BROKER`, `MQTT_PORT`,
//!    `MQTT_USERNAME`, `MQTT_PASSWORD`, `MQCTL_LISTEN`
//! 2. **Config file** — path via `--config <path>`, or `mqctl.toml` in CWD
//! 3. **Compiled defaults** — see each field's default value below
//!
//! The TOML file mirrors the struct hierarchy:
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:3000"
//! ready_timeout_secs = 10       # how long startup waits for the broker
//! max_concurrent_requests = 64
//!
//! [auth]
//! api_key = "your-secret-key"
//!
//! [mqtt]
//! host = "localhost"
//! port = 1883
//! username = ""                 # empty = connect anonymously
//! password = ""
//! client_id = "mqctl"
//! keep_alive_secs = 60
//! channel_capacity = 64         # outbound request queue depth
//! reconnect_delay_ms = 500      # initial backoff
//! reconnect_max_delay_ms = 30000
//!
//! [logging]
//! level = "info"
//! ```

use serde::Deserialize;
use std::path::Path;

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind (default `0.0.0.0:3000`).
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Seconds to wait for the first broker connection before giving up
    /// (default 10).
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
    /// Requests processed in parallel before new ones queue (default 64).
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

/// Authentication settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Pre-shared API key. Override with `API_KEY` env var.
    /// Defaults to `"change-me"` which triggers a startup warning.
    #[serde(default = "default_api_key")]
    pub api_key: String,
}

/// MQTT broker connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    /// Broker hostname. Override with `MQTT_BROKER`.
    #[serde(default = "default_mqtt_host")]
    pub host: String,
    /// Broker port. Override with `MQTT_PORT`.
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    /// Username; credentials are only sent when this is non-empty.
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    /// Capacity of the client's outbound request queue (default 64).
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// First reconnect delay in milliseconds (default 500).
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Upper bound for the reconnect delay in milliseconds (default 30 000).
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter level (default `info`). Overridden by `RUST_LOG` env var.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_listen() -> String {
    "0.0.0.0:3000".to_string()
}
fn default_ready_timeout_secs() -> u64 {
    10
}
fn default_max_concurrent_requests() -> usize {
    64
}
fn default_api_key() -> String {
    "change-me".to_string()
}
fn default_mqtt_host() -> String {
    "localhost".to_string()
}
fn default_mqtt_port() -> u16 {
    1883
}
fn default_client_id() -> String {
    "mqctl".to_string()
}
fn default_keep_alive_secs() -> u64 {
    60
}
fn default_channel_capacity() -> usize {
    64
}
fn default_reconnect_delay_ms() -> u64 {
    500
}
fn default_reconnect_max_delay_ms() -> u64 {
    30_000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            ready_timeout_secs: default_ready_timeout_secs(),
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_key: default_api_key(),
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            username: String::new(),
            password: String::new(),
            client_id: default_client_id(),
            keep_alive_secs: default_keep_alive_secs(),
            channel_capacity: default_channel_capacity(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration with the precedence chain: env vars > file > defaults.
    ///
    /// If `path` is `Some`, that file must exist. Otherwise `mqctl.toml` in the
    /// current directory is used when present, falling back to compiled defaults.
    pub fn load(path: Option<&str>) -> Result<Self, String> {
        let mut config = if let Some(p) = path {
            Self::from_file(Path::new(p))?
        } else if Path::new("mqctl.toml").exists() {
            Self::from_file(Path::new("mqctl.toml"))?
        } else {
            Config::default()
        };

        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;
        toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file {}: {e}", path.display()))
    }

    /// Apply environment overrides. `lookup` is `std::env::var` in production
    /// and a map in tests.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), String> {
        if let Some(key) = lookup("API_KEY") {
            self.auth.api_key = key;
        }
        if let Some(listen) = lookup("MQCTL_LISTEN") {
            self.server.listen = listen;
        }
        if let Some(host) = lookup("MQTT_BROKER") {
            self.mqtt.host = host;
        }
        if let Some(port) = lookup("MQTT_PORT") {
            self.mqtt.port = port
                .trim()
                .parse()
                .map_err(|e| format!("Invalid MQTT_PORT '{port}': {e}"))?;
        }
        if let Some(user) = lookup("MQTT_USERNAME") {
            self.mqtt.username = user;
        }
        if let Some(pass) = lookup("MQTT_PASSWORD") {
            self.mqtt.password = pass;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_without_file() {
        let config = Config::default();
        assert_eq!(config.server.listen, "0.0.0.0:3000");
        assert_eq!(config.mqtt.host, "localhost");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.auth.api_key, "change-me");
        assert!(config.mqtt.username.is_empty());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [mqtt]
            host = "broker.lan"

            [auth]
            api_key = "from-file"
            "#,
        )
        .unwrap();
        assert_eq!(config.mqtt.host, "broker.lan");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.auth.api_key, "from-file");
        assert_eq!(config.server.ready_timeout_secs, 10);
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config: Config = toml::from_str(
            r#"
            [mqtt]
            host = "broker.lan"
            port = 1884
            "#,
        )
        .unwrap();
        config
            .apply_env(env(&[
                ("MQTT_BROKER", "mqtt.example.com"),
                ("MQTT_PORT", "8883"),
                ("MQTT_USERNAME", "gw"),
                ("MQTT_PASSWORD", "pw"),
                ("API_KEY", "supersecretapikey"),
            ]))
            .unwrap();
        assert_eq!(config.mqtt.host, "mqtt.example.com");
        assert_eq!(config.mqtt.port, 8883);
        assert_eq!(config.mqtt.username, "gw");
        assert_eq!(config.mqtt.password, "pw");
        assert_eq!(config.auth.api_key, "supersecretapikey");
    }

    #[test]
    fn invalid_port_env_is_an_error() {
        let mut config = Config::default();
        let err = config
            .apply_env(env(&[("MQTT_PORT", "not-a-port")]))
            .unwrap_err();
        assert!(err.contains("MQTT_PORT"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = Config::load(Some("/nonexistent/mqctl.toml")).unwrap_err();
        assert!(err.contains("Failed to read config file"));
    }
}
