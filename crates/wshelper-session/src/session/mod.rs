//! Per-connection session: owns one transport and drives its lifecycle.
//!
//! A [`Session`] is a cheap handle over shared state. Clones are handed to
//! text and stream handlers so they can write back on the same connection.

mod keepalive;
mod receive;
mod upgrade;

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use wshelper_core::config::{KeepaliveConfig, SessionConfig};
use wshelper_core::error::{BoxError, ErrorKind, WsError};
use wshelper_core::result::WsResult;

use crate::handler::{HandlerResult, HandlerSet};
use crate::message::control::validate_control;
use crate::message::{FrameKind, Payload, StreamReader};
use crate::transport::Transport;

/// Unique session identifier, used in log fields.
pub type SessionId = Uuid;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SessionState {
    /// Created, no transport yet.
    Idle = 0,
    /// The receive loop is running.
    Running = 1,
    /// The loop has ended and the transport is being closed.
    Terminating = 2,
    /// The transport has been closed.
    Closed = 3,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::Terminating,
            _ => Self::Closed,
        }
    }
}

struct SessionInner {
    id: SessionId,
    config: SessionConfig,
    handlers: HandlerSet,
    transport: Mutex<Option<Arc<dyn Transport>>>,
    started: AtomicBool,
    state: AtomicU8,
    closed: AtomicBool,
}

/// Handle to a single WebSocket connection's session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Creates a session with the given buffer sizes, no handlers and
    /// keepalive disabled.
    pub fn new(read_buffer_size: usize, write_buffer_size: usize) -> Self {
        Self::builder(SessionConfig::with_buffers(read_buffer_size, write_buffer_size)).build()
    }

    /// Starts building a session from configuration.
    pub fn builder(config: SessionConfig) -> SessionBuilder {
        SessionBuilder {
            config,
            handlers: HandlerSet::default(),
        }
    }

    /// Starts building a session from a borrowed configuration.
    pub fn from_config(config: &SessionConfig) -> SessionBuilder {
        Self::builder(config.clone())
    }

    /// Session identifier.
    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Configuration the session was built with.
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Returns `true` once the transport has been closed (or close has begun).
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    fn set_state(&self, state: SessionState) {
        self.inner.state.store(state as u8, Ordering::Release);
    }

    fn transport(&self) -> WsResult<Arc<dyn Transport>> {
        self.inner
            .transport
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(WsError::not_connected)
    }

    fn install_transport(&self, transport: Option<Arc<dyn Transport>>) {
        *self
            .inner
            .transport
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = transport;
    }

    /// Fails when this session cannot take a connection: it already owns
    /// one, or its configuration is unusable.
    fn ensure_startable(&self) -> WsResult<()> {
        if self.inner.started.load(Ordering::Acquire) {
            return Err(already_started());
        }
        self.inner.config.validate()
    }

    /// Drives an already-open transport until the connection terminates.
    ///
    /// Runs the receive loop and, when enabled, the keepalive supervisor.
    /// Returns `Ok(())` when the connection ended in an orderly way and the
    /// terminal error otherwise. The transport is closed exactly once before
    /// this returns, including when a handler panics (the panic is resumed
    /// after the close), and the session then releases it.
    ///
    /// A session that already owns a connection, or whose configuration is
    /// invalid, closes `transport` and fails with `AlreadyStarted` or
    /// `Configuration`.
    pub async fn run<T: Transport>(&self, transport: T) -> WsResult<()> {
        let admitted = self.ensure_startable().and_then(|()| {
            if self.inner.started.swap(true, Ordering::AcqRel) {
                Err(already_started())
            } else {
                Ok(())
            }
        });
        if let Err(e) = admitted {
            warn!(session_id = %self.id(), error = %e, "Connection refused");
            if let Err(close_err) = transport.close().await {
                debug!(session_id = %self.id(), error = %close_err, "Failed to close refused transport");
            }
            return Err(e);
        }

        let transport: Arc<dyn Transport> = Arc::new(transport);
        self.install_transport(Some(transport.clone()));
        self.register_control_handlers(transport.as_ref());
        self.set_state(SessionState::Running);
        info!(
            session_id = %self.id(),
            keepalive = self.inner.config.keepalive.enabled,
            "Session started"
        );

        let outcome = AssertUnwindSafe(self.drive()).catch_unwind().await;

        self.set_state(SessionState::Terminating);
        if let Err(e) = self.close().await {
            warn!(session_id = %self.id(), error = %e, "Failed to close transport");
        }
        self.install_transport(None);
        drop(transport);
        self.set_state(SessionState::Closed);

        match outcome {
            Ok(Ok(())) => {
                info!(session_id = %self.id(), "Session closed");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(session_id = %self.id(), error = %e, "Session terminated");
                Err(e)
            }
            Err(panic) => {
                error!(session_id = %self.id(), "Session handler panicked");
                std::panic::resume_unwind(panic)
            }
        }
    }

    async fn drive(&self) -> WsResult<()> {
        if !self.inner.config.keepalive.enabled {
            return self.receive_loop(None).await;
        }

        // Single slot: written by the receive loop, read by the supervisor.
        let (alive_tx, alive_rx) = mpsc::channel(1);
        let receive = self.receive_loop(Some(alive_tx));
        tokio::pin!(receive);

        tokio::select! {
            result = &mut receive => result,
            verdict = self.supervise(alive_rx) => {
                // Closing wakes a blocked read; a dispatch in progress runs to completion.
                if let Err(e) = self.close().await {
                    warn!(session_id = %self.id(), error = %e, "Failed to close transport");
                }
                if let Err(e) = receive.await {
                    debug!(session_id = %self.id(), error = %e, "Receive loop ended after keepalive shutdown");
                }
                verdict
            }
        }
    }

    fn register_control_handlers(&self, transport: &dyn Transport) {
        let handlers = &self.inner.handlers;
        if let Some(handler) = &handlers.close {
            transport.set_close_handler(handler.clone());
        }
        if let Some(handler) = &handlers.ping {
            transport.set_ping_handler(handler.clone());
        }
        if let Some(handler) = &handlers.pong {
            transport.set_pong_handler(handler.clone());
        }
    }

    /// Writes a data message.
    ///
    /// `Text` frames take a text payload, `Binary` frames take bytes or a
    /// reader. Any other combination fails with
    /// [`ErrorKind::UnsupportedPayload`] and nothing is written.
    pub async fn write_message(&self, kind: FrameKind, payload: impl Into<Payload>) -> WsResult<()> {
        let payload = payload.into().into_frame_bytes(kind)?;
        self.transport()?.write_frame(kind, payload).await
    }

    /// Writes a close, ping or pong frame before `deadline`.
    ///
    /// Data frame kinds are rejected with [`ErrorKind::InvalidFrameKind`]
    /// and nothing is written.
    pub async fn write_control(
        &self,
        kind: FrameKind,
        payload: impl Into<Bytes>,
        deadline: Instant,
    ) -> WsResult<()> {
        let payload = payload.into();
        validate_control(kind, &payload)?;
        self.transport()?
            .write_control_frame(kind, payload, deadline)
            .await
    }

    /// Closes the connection. Only the first call reaches the transport;
    /// later calls, and calls before a transport exists, return `Ok(())`.
    pub async fn close(&self) -> WsResult<()> {
        let Ok(transport) = self.transport() else {
            return Ok(());
        };
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!(session_id = %self.id(), "Closing transport");
        transport.close().await
    }
}

fn already_started() -> WsError {
    WsError::new(
        ErrorKind::AlreadyStarted,
        "session already owns a connection",
    )
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("config", &self.inner.config)
            .field("handlers", &self.inner.handlers)
            .finish()
    }
}

/// Collects configuration and handlers before a session starts.
#[derive(Debug)]
pub struct SessionBuilder {
    config: SessionConfig,
    handlers: HandlerSet,
}

impl SessionBuilder {
    /// Overrides the transport buffer sizes.
    pub fn buffers(mut self, read_buffer_size: usize, write_buffer_size: usize) -> Self {
        self.config.read_buffer_size = read_buffer_size;
        self.config.write_buffer_size = write_buffer_size;
        self
    }

    /// Overrides the keepalive settings.
    pub fn keepalive(mut self, keepalive: KeepaliveConfig) -> Self {
        self.config.keepalive = keepalive;
        self
    }

    /// Sets the origin predicate consulted during the upgrade.
    pub fn check_origin<F>(mut self, check: F) -> Self
    where
        F: Fn(&http::Request<()>) -> bool + Send + Sync + 'static,
    {
        self.handlers.origin = Some(Arc::new(check));
        self
    }

    /// Sets the close notification.
    pub fn on_close<F>(mut self, handler: F) -> Self
    where
        F: Fn(u16, &str) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.handlers.close = Some(Arc::new(handler));
        self
    }

    /// Sets the text message handler.
    pub fn on_text<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Session, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handlers.text = Some(HandlerSet::boxed_text(handler));
        self
    }

    /// Sets the binary message handler.
    pub fn on_stream<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Session, StreamReader) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handlers.stream = Some(HandlerSet::boxed_stream(handler));
        self
    }

    /// Sets the native ping handler.
    pub fn on_ping<F>(mut self, handler: F) -> Self
    where
        F: Fn(&[u8]) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.handlers.ping = Some(Arc::new(handler));
        self
    }

    /// Sets the native pong handler.
    pub fn on_pong<F>(mut self, handler: F) -> Self
    where
        F: Fn(&[u8]) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.handlers.pong = Some(Arc::new(handler));
        self
    }

    /// Finishes the session. It stays idle until a start entry point runs.
    pub fn build(self) -> Session {
        Session {
            inner: Arc::new(SessionInner {
                id: Uuid::new_v4(),
                config: self.config,
                handlers: self.handlers,
                transport: Mutex::new(None),
                started: AtomicBool::new(false),
                state: AtomicU8::new(SessionState::Idle as u8),
                closed: AtomicBool::new(false),
            }),
        }
    }
}
