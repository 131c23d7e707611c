//! Unified error types for wshelper.
//!
//! Every failure that can end a session is mapped into [`WsError`] so the
//! start entry points return a single terminal error to the caller.

use std::fmt;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boxed error used for caller-supplied callback failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error kind categorization used across the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The origin predicate rejected the upgrade request.
    Authorization,
    /// The WebSocket handshake failed.
    Upgrade,
    /// Read, write or close failed on an established connection.
    Transport,
    /// An application callback returned a failure.
    Handler,
    /// Reading a streamed message payload failed inside a handler.
    StreamRead,
    /// A text frame did not carry valid UTF-8.
    Decode,
    /// The peer did not answer liveness pings in time.
    KeepaliveTimeout,
    /// A liveness signal reported the peer as dead.
    PeerNotAlive,
    /// An outbound payload does not match the requested frame kind.
    UnsupportedPayload,
    /// A frame kind was used where it is not allowed.
    InvalidFrameKind,
    /// The session has no open transport.
    NotConnected,
    /// The session was already started once.
    AlreadyStarted,
    /// Configuration could not be loaded or is invalid.
    Configuration,
    /// An unexpected internal failure.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authorization => write!(f, "AUTHORIZATION"),
            Self::Upgrade => write!(f, "UPGRADE"),
            Self::Transport => write!(f, "TRANSPORT"),
            Self::Handler => write!(f, "HANDLER"),
            Self::StreamRead => write!(f, "STREAM_READ"),
            Self::Decode => write!(f, "DECODE"),
            Self::KeepaliveTimeout => write!(f, "KEEPALIVE_TIMEOUT"),
            Self::PeerNotAlive => write!(f, "PEER_NOT_ALIVE"),
            Self::UnsupportedPayload => write!(f, "UNSUPPORTED_PAYLOAD"),
            Self::InvalidFrameKind => write!(f, "INVALID_FRAME_KIND"),
            Self::NotConnected => write!(f, "NOT_CONNECTED"),
            Self::AlreadyStarted => write!(f, "ALREADY_STARTED"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// The unified error used throughout wshelper.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct WsError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<BoxError>,
}

impl WsError {
    /// Create a new error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create an authorization error.
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authorization, message)
    }

    /// Create an upgrade error.
    pub fn upgrade(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Upgrade, message)
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    /// Create an unsupported-payload error.
    pub fn unsupported_payload(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedPayload, message)
    }

    /// Create an invalid-frame-kind error.
    pub fn invalid_frame_kind(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidFrameKind, message)
    }

    /// Create a not-connected error.
    pub fn not_connected() -> Self {
        Self::new(ErrorKind::NotConnected, "session has no open connection")
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Returns `true` if the error has the given kind.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

impl Clone for WsError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<std::io::Error> for WsError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Transport, format!("I/O error: {err}"), err)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for WsError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::with_source(
            ErrorKind::Transport,
            format!("WebSocket error: {err}"),
            err,
        )
    }
}

impl From<config::ConfigError> for WsError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

/// Error body returned when an upgrade request is refused over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable message.
    pub message: String,
}

impl IntoResponse for WsError {
    fn into_response(self) -> Response {
        let status = match self.kind {
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::Upgrade => StatusCode::BAD_REQUEST,
            _ => {
                tracing::error!(error = %self, "Session error surfaced over HTTP");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ErrorResponse {
            error: self.kind.to_string(),
            message: self.message,
        };

        (status, Json(body)).into_response()
    }
}
