//! Echo server built on the WebSocket session engine.
//!
//! Serves an axum route that upgrades requests into echo sessions and,
//! optionally, a raw TCP listener that performs the handshake with
//! tokio-tungstenite directly.

pub mod server;

pub use server::{build_router, echo_session, serve_raw};
