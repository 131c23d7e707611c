//! `axum` backend: message mapping for upgraded `axum` sockets.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use bytes::Bytes;

use wshelper_core::result::WsResult;

use super::socket::{SocketTransport, WireMessage, text_payload};
use crate::message::control::parse_close_message;
use crate::message::{CloseReason, Frame, FrameKind, StreamReader};

/// Transport over an upgraded `axum` WebSocket.
pub type AxumTransport = SocketTransport<WebSocket, Message>;

impl WireMessage for Message {
    fn into_frame(self) -> Option<Frame> {
        match self {
            Message::Text(text) => Some(Frame::text(text.as_str())),
            Message::Binary(data) => Some(Frame::Stream(StreamReader::from_bytes(data))),
            Message::Ping(data) => Some(Frame::Ping(data)),
            Message::Pong(data) => Some(Frame::Pong(data)),
            Message::Close(frame) => Some(Frame::Close(
                frame.map(|f| CloseReason::new(f.code, f.reason.as_str())),
            )),
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
                    code: reason.code,
                    reason: reason.reason.into(),
                }
            })),
        })
    }
}
