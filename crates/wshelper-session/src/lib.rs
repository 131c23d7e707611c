//! # wshelper-session
//!
//! Per-connection WebSocket session engine. Provides:
//!
//! - Upgrade of a raw connection (tokio-tungstenite) or an axum request,
//!   with an optional origin predicate
//! - A receive loop dispatching text and streamed binary messages to
//!   caller-supplied handlers
//! - Application-level `control:ping` / `control:pong` liveness handshake
//!   and an optional keepalive supervisor
//! - Close-once teardown on every exit path

pub mod handler;
pub mod message;
pub mod session;
pub mod transport;

pub use handler::{HandlerError, HandlerResult, HandlerSet};
pub use message::{CloseReason, Frame, FrameKind, Payload, StreamReader, format_close_message};
pub use session::{Session, SessionBuilder, SessionId, SessionState};
pub use transport::{AxumTransport, SocketTransport, Transport, TungsteniteTransport};
