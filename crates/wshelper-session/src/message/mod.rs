//! Frame model, outbound payloads and control frame rules.

pub mod control;
pub mod payload;
pub mod types;

pub use control::{PING_SENTINEL, PONG_SENTINEL, Sentinel, format_close_message};
pub use payload::{Payload, StreamReader};
pub use types::{CloseReason, Frame, FrameKind};
