//! Narrow interface to the framed message transport.
//!
//! A [`Transport`] is opened from an upgraded HTTP connection and owned by
//! exactly one session. [`SocketTransport`] implements it for any WebSocket
//! stream whose message type implements [`WireMessage`]; impls are provided
//! for `tokio-tungstenite` and `axum` sockets.

pub mod axum_impl;
pub mod socket;
pub mod tungstenite_impl;

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::Instant;

use wshelper_core::error::{ErrorKind, WsError};
use wshelper_core::result::WsResult;

use crate::handler::{CloseHandler, PingHandler, PongHandler};
use crate::message::control::CLOSE_NO_STATUS;
use crate::message::{CloseReason, Frame, FrameKind};

pub use self::axum_impl::AxumTransport;
pub use self::socket::{SocketTransport, WireMessage};
pub use self::tungstenite_impl::TungsteniteTransport;

/// Full-duplex framed message channel owned by a session.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Waits for the next data frame.
    ///
    /// Returns `Ok(None)` once the connection has ended in an orderly way,
    /// either because the peer closed it or because [`Transport::close`] was
    /// called. `close` must wake a pending call.
    async fn next_frame(&self) -> WsResult<Option<Frame>>;

    /// Writes one frame of the given kind.
    async fn write_frame(&self, kind: FrameKind, payload: Bytes) -> WsResult<()>;

    /// Writes a control frame, failing if it cannot be written before `deadline`.
    async fn write_control_frame(
        &self,
        kind: FrameKind,
        payload: Bytes,
        deadline: Instant,
    ) -> WsResult<()>;

    /// Registers the callback invoked when the peer sends a close frame.
    fn set_close_handler(&self, handler: CloseHandler);

    /// Registers the callback invoked for native ping frames.
    fn set_ping_handler(&self, handler: PingHandler);

    /// Registers the callback invoked for native pong frames.
    fn set_pong_handler(&self, handler: PongHandler);

    /// Closes the connection. Calling it again is a no-op.
    async fn close(&self) -> WsResult<()>;
}

/// Registered control frame callbacks, shared by transport implementations.
#[derive(Default)]
pub struct ControlHandlers {
    close: RwLock<Option<CloseHandler>>,
    ping: RwLock<Option<PingHandler>>,
    pong: RwLock<Option<PongHandler>>,
}

impl ControlHandlers {
    /// Replaces the close callback.
    pub fn set_close(&self, handler: CloseHandler) {
        *self.close.write().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    /// Replaces the ping callback.
    pub fn set_ping(&self, handler: PingHandler) {
        *self.ping.write().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    /// Replaces the pong callback.
    pub fn set_pong(&self, handler: PongHandler) {
        *self.pong.write().unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    /// Dispatches a close frame. A missing status is reported as 1005.
    pub fn on_close(&self, reason: Option<&CloseReason>) -> WsResult<()> {
        let handler = self.close.read().unwrap_or_else(PoisonError::into_inner).clone();
        let Some(handler) = handler else {
            return Ok(());
        };
        let (code, text) = reason
            .map(|r| (r.code, r.reason.as_str()))
            .unwrap_or((CLOSE_NO_STATUS, ""));
        handler(code, text)
            .map_err(|e| WsError::with_source(ErrorKind::Transport, "close handler failed", e))
    }

    /// Dispatches a ping frame.
    pub fn on_ping(&self, payload: &[u8]) -> WsResult<()> {
        let handler = self.ping.read().unwrap_or_else(PoisonError::into_inner).clone();
        match handler {
            Some(handler) => handler(payload)
                .map_err(|e| WsError::with_source(ErrorKind::Transport, "ping handler failed", e)),
            None => Ok(()),
        }
    }

    /// Dispatches a pong frame.
    pub fn on_pong(&self, payload: &[u8]) -> WsResult<()> {
        let handler = self.pong.read().unwrap_or_else(PoisonError::into_inner).clone();
        match handler {
            Some(handler) => handler(payload)
                .map_err(|e| WsError::with_source(ErrorKind::Transport, "pong handler failed", e)),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for ControlHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlHandlers").finish_non_exhaustive()
    }
}
