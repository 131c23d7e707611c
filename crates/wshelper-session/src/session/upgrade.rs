//! Upgrade entry points for raw connections and axum requests.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{FromRequestParts, Request};
use axum::response::Response;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use wshelper_core::error::WsError;
use wshelper_core::result::WsResult;

use super::Session;
use crate::transport::{AxumTransport, tungstenite_impl};

impl Session {
    /// Upgrades an accepted connection and serves it until it terminates.
    ///
    /// `stream` carries the client's HTTP upgrade request; the handshake
    /// response is written to it. Fails with `Authorization` when the origin
    /// predicate rejects the request and with `Upgrade` when the handshake
    /// fails; in both cases no transport is created and the session stays
    /// idle. The upgrade is not retried. A session that already owns a
    /// connection, or cannot run with its configuration, fails before any
    /// handshake bytes are exchanged.
    pub async fn start_handle<S>(&self, stream: S) -> WsResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        self.ensure_startable()?;
        let transport = tungstenite_impl::accept(
            stream,
            self.inner.handlers.origin.as_ref(),
            &self.inner.config,
        )
        .await
        .inspect_err(|e| warn!(session_id = %self.id(), error = %e, "WebSocket upgrade refused"))?;

        self.run(transport).await
    }

    /// Answers an axum upgrade request and serves the socket in the background.
    ///
    /// The origin predicate runs before the `101 Switching Protocols`
    /// response is produced. The terminal result of the session is logged.
    pub async fn accept(self, request: Request) -> Result<Response, WsError> {
        self.ensure_startable()?;
        let (mut parts, _body) = request.into_parts();
        let upgrade = WebSocketUpgrade::from_request_parts(&mut parts, &())
            .await
            .map_err(|rejection| WsError::upgrade(rejection.body_text()))?;

        let head = http::Request::from_parts(parts, ());
        if let Some(check) = &self.inner.handlers.origin {
            if !check(&head) {
                warn!(session_id = %self.id(), "Origin check rejected the upgrade request");
                return Err(WsError::authorization(
                    "origin check rejected the upgrade request",
                ));
            }
        }

        let config = &self.inner.config;
        let close_timeout = config.control_write_timeout();
        let session_id = self.id();

        Ok(upgrade
            .read_buffer_size(config.read_buffer_size)
            .write_buffer_size(config.write_buffer_size)
            .on_failed_upgrade(move |e| {
                warn!(session_id = %session_id, error = %e, "WebSocket upgrade failed");
            })
            .on_upgrade(move |socket| async move {
                let transport = AxumTransport::new(socket).with_close_timeout(close_timeout);
                if let Err(e) = self.run(transport).await {
                    debug!(session_id = %self.id(), kind = %e.kind, "Session ended with error");
                }
            }))
    }
}
