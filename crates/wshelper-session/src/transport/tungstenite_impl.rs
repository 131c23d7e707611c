//! `tokio-tungstenite` backend: server handshake and message mapping.

use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::frame::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tracing::debug;

use wshelper_core::config::SessionConfig;
use wshelper_core::error::{ErrorKind, WsError};
use wshelper_core::result::WsResult;

use super::socket::{SocketTransport, WireMessage, text_payload};
use crate::handler::OriginCheck;
use crate::message::control::parse_close_message;
use crate::message::{CloseReason, Frame, FrameKind, StreamReader};

/// Transport over a server-side `tokio-tungstenite` stream.
pub type TungsteniteTransport<S> = SocketTransport<WebSocketStream<S>, Message>;

impl WireMessage for Message {
    fn into_frame(self) -> Option<Frame> {
        match self {
            Message::Text(text) => Some(Frame::text(text.as_str())),
            Message::Binary(data) => Some(Frame::Stream(StreamReader::from_bytes(data))),
            Message::Ping(data) => Some(Frame::Ping(data)),
            Message::Pong(data) => Some(Frame::Pong(data)),
            Message::Close(frame) => Some(Frame::Close(
                frame.map(|f| CloseReason::new(u16::from(f.code), f.reason.as_str())),
            )),
            Message::Frame(_) => None,
        }
    }

    fn from_frame(kind: FrameKind, payload: Bytes) -> WsResult<Self> {
        Ok(match kind {
            FrameKind::Text => Message::text(text_payload(payload)?),
            FrameKind::Binary => Message::binary(payload),
            FrameKind::Ping => Message::Ping(payload),
            FrameKind::Pong => Message::Pong(payload),
            FrameKind::Close => Message::Close(parse_close_message(&payload)?.map(|reason| {
                CloseFrame {
                    code: reason.code.into(),
                    reason: reason.reason.into(),
                }
            })),
        })
    }
}

/// Runs the server handshake on an accepted connection.
///
/// The origin predicate, when present, sees the HTTP request before the
/// handshake completes; a rejection answers `403 Forbidden` and no
/// transport is created.
pub async fn accept<S>(
    stream: S,
    origin: Option<&OriginCheck>,
    config: &SessionConfig,
) -> WsResult<TungsteniteTransport<S>>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let ws_config = WebSocketConfig::default()
        .read_buffer_size(config.read_buffer_size)
        .write_buffer_size(config.write_buffer_size);

    let rejected = AtomicBool::new(false);
    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        if let Some(check) = origin {
            if !check(request) {
                rejected.store(true, Ordering::Release);
                let mut refusal = ErrorResponse::new(Some("origin not allowed".to_string()));
                *refusal.status_mut() = StatusCode::FORBIDDEN;
                return Err(refusal);
            }
        }
        Ok(response)
    };

    match tokio_tungstenite::accept_hdr_async_with_config(stream, callback, Some(ws_config)).await
    {
        Ok(socket) => {
            debug!("WebSocket handshake completed");
            Ok(SocketTransport::new(socket).with_close_timeout(config.control_write_timeout()))
        }
        Err(e) if rejected.load(Ordering::Acquire) => Err(WsError::with_source(
            ErrorKind::Authorization,
            "origin check rejected the upgrade request",
            e,
        )),
        Err(e) => Err(WsError::with_source(
            ErrorKind::Upgrade,
            format!("websocket handshake failed: {e}"),
            e,
        )),
    }
}
