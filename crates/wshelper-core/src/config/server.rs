//! Demo server configuration.

use serde::{Deserialize, Serialize};

/// HTTP server configuration for the demo binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port of the axum HTTP listener.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Route that accepts WebSocket upgrades.
    #[serde(default = "default_path")]
    pub path: String,
    /// Port of the raw TCP listener handshaking with tungstenite (0 = disabled).
    #[serde(default)]
    pub raw_port: u16,
    /// Origins accepted during the upgrade (empty = any origin).
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            path: default_path(),
            raw_port: 0,
            allowed_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Socket address string for the axum listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Socket address string for the raw listener, if enabled.
    pub fn raw_bind_addr(&self) -> Option<String> {
        (self.raw_port != 0).then(|| format!("{}:{}", self.host, self.raw_port))
    }

    /// Returns `true` if an upgrade carrying `origin` may proceed.
    ///
    /// Requests without an `Origin` header are only accepted when no
    /// allow-list is configured.
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        if self.allowed_origins.is_empty() {
            return true;
        }
        match origin {
            Some(origin) => self
                .allowed_origins
                .iter()
                .any(|allowed| allowed == "*" || allowed.eq_ignore_ascii_case(origin)),
            None => false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_path() -> String {
    "/ws".to_string()
}
