//! Liveness sentinels and control frame payload rules.

use bytes::{BufMut, Bytes, BytesMut};

use wshelper_core::error::WsError;
use wshelper_core::result::WsResult;

use super::types::{CloseReason, FrameKind};

/// Text payload a peer sends to check liveness.
pub const PING_SENTINEL: &str = "control:ping";

/// Text payload answering a [`PING_SENTINEL`].
pub const PONG_SENTINEL: &str = "control:pong";

/// Maximum control frame payload size in bytes.
pub const MAX_CONTROL_PAYLOAD: usize = 125;

/// Normal closure status code.
pub const CLOSE_NORMAL: u16 = 1000;

/// Status reported when a close frame carried no code.
pub const CLOSE_NO_STATUS: u16 = 1005;

/// Application-level liveness sentinel carried in a text frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentinel {
    /// `control:ping`
    Ping,
    /// `control:pong`
    Pong,
}

impl Sentinel {
    /// Matches `text` exactly against the reserved sentinels.
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            PING_SENTINEL => Some(Self::Ping),
            PONG_SENTINEL => Some(Self::Pong),
            _ => None,
        }
    }
}

/// Checks that `kind` and `payload` form a valid control frame.
pub fn validate_control(kind: FrameKind, payload: &[u8]) -> WsResult<()> {
    if !kind.is_control() {
        return Err(WsError::invalid_frame_kind(format!(
            "{kind} is not a control frame kind"
        )));
    }

    if payload.len() > MAX_CONTROL_PAYLOAD {
        return Err(WsError::invalid_frame_kind(format!(
            "control frame payload of {} bytes exceeds {MAX_CONTROL_PAYLOAD} bytes",
            payload.len()
        )));
    }

    if kind == FrameKind::Close {
        parse_close_message(payload)?;
    }

    Ok(())
}

/// Builds a close frame payload: big-endian status code followed by the reason.
pub fn format_close_message(code: u16, reason: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(2 + reason.len());
    buf.put_u16(code);
    buf.put_slice(reason.as_bytes());
    buf.freeze()
}

/// Parses a close frame payload. An empty payload means no status.
pub fn parse_close_message(payload: &[u8]) -> WsResult<Option<CloseReason>> {
    match payload {
        [] => Ok(None),
        [_] => Err(WsError::invalid_frame_kind(
            "close payload must carry a two-byte status code",
        )),
        [hi, lo, reason @ ..] => {
            let reason = std::str::from_utf8(reason)
                .map_err(|_| WsError::invalid_frame_kind("close reason is not valid UTF-8"))?;
            Ok(Some(CloseReason::new(u16::from_be_bytes([*hi, *lo]), reason)))
        }
    }
}
