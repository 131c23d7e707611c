//! Application configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate from
//! optional TOML files plus `WSHELPER__`-prefixed environment variables.

pub mod logging;
pub mod server;
pub mod session;

use serde::{Deserialize, Serialize};

pub use self::logging::LoggingConfig;
pub use self::server::ServerConfig;
pub use self::session::{KeepaliveConfig, SessionConfig};

use crate::error::WsError;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Demo server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Per-connection session settings.
    #[serde(default)]
    pub session: SessionConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration.
    ///
    /// Merges `config/default.toml`, an environment-specific overlay
    /// `config/{env}.toml` and environment variables such as
    /// `WSHELPER__SESSION__KEEPALIVE__ENABLED=true`. Every source is optional.
    pub fn load(env: &str) -> Result<Self, WsError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("WSHELPER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| WsError::configuration(format!("Failed to build config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| WsError::configuration(format!("Failed to deserialize config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(source: &str) -> Result<Self, WsError> {
        let config: Self = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the session engine cannot run with.
    pub fn validate(&self) -> Result<(), WsError> {
        self.session.validate()
    }
}
