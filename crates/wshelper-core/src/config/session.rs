//! Per-connection session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::WsError;

/// Buffer sizes and liveness settings applied to every session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Transport read buffer size in bytes.
    #[serde(default = "default_buffer_size")]
    pub read_buffer_size: usize,
    /// Transport write buffer size in bytes.
    #[serde(default = "default_buffer_size")]
    pub write_buffer_size: usize,
    /// Deadline for control frames written on close, in milliseconds.
    #[serde(default = "default_control_write_timeout")]
    pub control_write_timeout_ms: u64,
    /// Application-level keepalive settings.
    #[serde(default)]
    pub keepalive: KeepaliveConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: default_buffer_size(),
            write_buffer_size: default_buffer_size(),
            control_write_timeout_ms: default_control_write_timeout(),
            keepalive: KeepaliveConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Creates a configuration with the given buffer sizes and keepalive disabled.
    pub fn with_buffers(read_buffer_size: usize, write_buffer_size: usize) -> Self {
        Self {
            read_buffer_size,
            write_buffer_size,
            ..Self::default()
        }
    }

    /// Control frame write deadline as a [`Duration`].
    pub fn control_write_timeout(&self) -> Duration {
        Duration::from_millis(self.control_write_timeout_ms)
    }

    /// Rejects settings a session cannot run with.
    pub fn validate(&self) -> Result<(), WsError> {
        if self.read_buffer_size == 0 || self.write_buffer_size == 0 {
            return Err(WsError::configuration(
                "session buffer sizes must be greater than zero",
            ));
        }
        self.keepalive.validate()
    }
}

/// Keepalive settings.
///
/// The supervisor sends `control:ping` every `tick_interval_seconds` and gives up
/// once `timeout_ticks` consecutive ticks (counting the ping tick) pass
/// without a `control:pong` answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeepaliveConfig {
    /// Whether the supervisor runs at all.
    #[serde(default)]
    pub enabled: bool,
    /// Seconds between pings.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_seconds: u64,
    /// Ticks without an answer before the session is closed.
    #[serde(default = "default_timeout_ticks")]
    pub timeout_ticks: u32,
    /// Close the session as soon as a ping cannot be written.
    #[serde(default)]
    pub close_on_ping_failure: bool,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            tick_interval_seconds: default_tick_interval(),
            timeout_ticks: default_timeout_ticks(),
            close_on_ping_failure: false,
        }
    }
}

impl KeepaliveConfig {
    /// Default settings with the supervisor switched on.
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Time between pings.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_seconds)
    }

    /// Total silence tolerated before the session is closed.
    pub fn timeout(&self) -> Duration {
        self.tick_interval() * self.timeout_ticks
    }

    /// Rejects timings the supervisor cannot run with.
    pub fn validate(&self) -> Result<(), WsError> {
        if self.tick_interval_seconds == 0 {
            return Err(WsError::configuration(
                "keepalive tick interval must be at least one second",
            ));
        }
        if self.timeout_ticks < 2 {
            return Err(WsError::configuration(
                "keepalive timeout_ticks must be at least 2",
            ));
        }
        Ok(())
    }
}

fn default_buffer_size() -> usize {
    4096
}

fn default_control_write_timeout() -> u64 {
    1000
}

fn default_tick_interval() -> u64 {
    10
}

fn default_timeout_ticks() -> u32 {
    2
}
