//! Frame kinds and inbound frame definitions.

use std::fmt;

use bytes::Bytes;

use wshelper_core::error::WsError;

use super::payload::StreamReader;

/// Kind of a frame exchanged over the transport.
///
/// The numeric codes are the WebSocket opcodes and are part of the public
/// contract with existing peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameKind {
    /// UTF-8 text message.
    Text = 1,
    /// Binary message, delivered as a stream.
    Binary = 2,
    /// Close control frame.
    Close = 8,
    /// Ping control frame.
    Ping = 9,
    /// Pong control frame.
    Pong = 10,
}

impl FrameKind {
    /// Numeric code of this kind.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Looks up a kind by its numeric code.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Text),
            2 => Some(Self::Binary),
            8 => Some(Self::Close),
            9 => Some(Self::Ping),
            10 => Some(Self::Pong),
            _ => None,
        }
    }

    /// Returns `true` for close, ping and pong.
    pub const fn is_control(self) -> bool {
        matches!(self, Self::Close | Self::Ping | Self::Pong)
    }

    /// Returns `true` for text and binary.
    pub const fn is_data(self) -> bool {
        !self.is_control()
    }
}

impl TryFrom<u8> for FrameKind {
    type Error = WsError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code)
            .ok_or_else(|| WsError::invalid_frame_kind(format!("unknown frame kind code {code}")))
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Binary => write!(f, "binary"),
            Self::Close => write!(f, "close"),
            Self::Ping => write!(f, "ping"),
            Self::Pong => write!(f, "pong"),
        }
    }
}

/// Status code and reason carried by a close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    /// Close status code.
    pub code: u16,
    /// Close reason text.
    pub reason: String,
}

impl CloseReason {
    /// Creates a close reason.
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

/// A frame read from the transport.
///
/// Text frames carry their payload in memory; binary frames are handed out
/// as a sequential reader.
pub enum Frame {
    /// Text message payload (not yet validated as UTF-8).
    Text(Bytes),
    /// Binary message payload source.
    Stream(StreamReader),
    /// Close frame, `None` when the peer sent no status.
    Close(Option<CloseReason>),
    /// Ping control frame.
    Ping(Bytes),
    /// Pong control frame.
    Pong(Bytes),
}

impl Frame {
    /// Builds a text frame.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(Bytes::from(text.into()))
    }

    /// Builds a binary frame backed by an in-memory buffer.
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::Stream(StreamReader::from_bytes(data.into()))
    }

    /// Kind of this frame.
    pub fn kind(&self) -> FrameKind {
        match self {
            Self::Text(_) => FrameKind::Text,
            Self::Stream(_) => FrameKind::Binary,
            Self::Close(_) => FrameKind::Close,
            Self::Ping(_) => FrameKind::Ping,
            Self::Pong(_) => FrameKind::Pong,
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(payload) => f.debug_tuple("Text").field(&payload.len()).finish(),
            Self::Stream(reader) => f.debug_tuple("Stream").field(reader).finish(),
            Self::Close(reason) => f.debug_tuple("Close").field(reason).finish(),
            Self::Ping(payload) => f.debug_tuple("Ping").field(&payload.len()).finish(),
            Self::Pong(payload) => f.debug_tuple("Pong").field(&payload.len()).finish(),
        }
    }
}
