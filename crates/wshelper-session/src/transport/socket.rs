//! WebSocket transport over any split-able message stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::Mutex;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use wshelper_core::error::{ErrorKind, WsError};
use wshelper_core::result::WsResult;

use super::{ControlHandlers, Transport};
use crate::handler::{CloseHandler, PingHandler, PongHandler};
use crate::message::control::{CLOSE_NORMAL, format_close_message, validate_control};
use crate::message::{Frame, FrameKind};

const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Message type of a concrete WebSocket library.
pub trait WireMessage: Sized + Send + Unpin + 'static {
    /// Converts a received message into a frame. Raw frames the library
    /// exposes for low-level use map to `None` and are skipped.
    fn into_frame(self) -> Option<Frame>;

    /// Builds an outbound message of `kind` from `payload`.
    fn from_frame(kind: FrameKind, payload: Bytes) -> WsResult<Self>;
}

/// Decodes a text payload for libraries that require valid UTF-8 on send.
pub(crate) fn text_payload(payload: Bytes) -> WsResult<String> {
    String::from_utf8(payload.to_vec())
        .map_err(|e| WsError::with_source(ErrorKind::Decode, "text payload is not valid UTF-8", e))
}

/// [`Transport`] over a WebSocket split into independently locked halves.
///
/// Reads and writes proceed concurrently; `close` cancels a pending read.
pub struct SocketTransport<S, M> {
    sink: Mutex<SplitSink<S, M>>,
    stream: Mutex<SplitStream<S>>,
    handlers: ControlHandlers,
    shutdown: CancellationToken,
    closed: AtomicBool,
    close_timeout: Duration,
}

impl<S, M, E> SocketTransport<S, M>
where
    S: Stream<Item = Result<M, E>> + Sink<M, Error = E> + Unpin + Send + 'static,
    M: WireMessage,
    E: std::error::Error + Send + Sync + 'static,
{
    /// Wraps an established WebSocket.
    pub fn new(socket: S) -> Self {
        let (sink, stream) = socket.split();
        Self {
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            handlers: ControlHandlers::default(),
            shutdown: CancellationToken::new(),
            closed: AtomicBool::new(false),
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }

    /// Bounds how long `close` waits for the close handshake to be written.
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Returns `true` once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    async fn send(&self, message: M) -> WsResult<()> {
        let mut sink = self.sink.lock().await;
        sink.send(message).await.map_err(|e| {
            WsError::with_source(
                ErrorKind::Transport,
                format!("write message fail: {e}"),
                e,
            )
        })
    }
}

#[async_trait]
impl<S, M, E> Transport for SocketTransport<S, M>
where
    S: Stream<Item = Result<M, E>> + Sink<M, Error = E> + Unpin + Send + 'static,
    M: WireMessage,
    E: std::error::Error + Send + Sync + 'static,
{
    async fn next_frame(&self) -> WsResult<Option<Frame>> {
        if self.is_closed() {
            return Ok(None);
        }

        let mut stream = self.stream.lock().await;
        loop {
            let next = tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(None),
                next = stream.next() => next,
            };

            let message = match next {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    return Err(WsError::with_source(
                        ErrorKind::Transport,
                        format!("receive message fail: {e}"),
                        e,
                    ));
                }
                None => return Ok(None),
            };

            match message.into_frame() {
                Some(Frame::Ping(payload)) => self.handlers.on_ping(&payload)?,
                Some(Frame::Pong(payload)) => self.handlers.on_pong(&payload)?,
                Some(Frame::Close(reason)) => {
                    debug!(close = ?reason, "Peer sent close frame");
                    self.handlers.on_close(reason.as_ref())?;
                    return Ok(None);
                }
                Some(frame) => return Ok(Some(frame)),
                None => trace!("Skipping raw frame"),
            }
        }
    }

    async fn write_frame(&self, kind: FrameKind, payload: Bytes) -> WsResult<()> {
        if self.is_closed() {
            return Err(WsError::transport("connection already closed"));
        }
        let message = M::from_frame(kind, payload)?;
        self.send(message).await
    }

    async fn write_control_frame(
        &self,
        kind: FrameKind,
        payload: Bytes,
        deadline: Instant,
    ) -> WsResult<()> {
        validate_control(kind, &payload)?;
        time::timeout_at(deadline, self.write_frame(kind, payload))
            .await
            .map_err(|_| WsError::transport("control frame write deadline exceeded"))?
    }

    fn set_close_handler(&self, handler: CloseHandler) {
        self.handlers.set_close(handler);
    }

    fn set_ping_handler(&self, handler: PingHandler) {
        self.handlers.set_ping(handler);
    }

    fn set_pong_handler(&self, handler: PongHandler) {
        self.handlers.set_pong(handler);
    }

    async fn close(&self) -> WsResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.shutdown.cancel();

        let farewell = M::from_frame(FrameKind::Close, format_close_message(CLOSE_NORMAL, ""))?;
        let handshake = async {
            let mut sink = self.sink.lock().await;
            sink.send(farewell).await?;
            sink.close().await
        };

        match time::timeout(self.close_timeout, handshake).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                // The peer may already be gone; the socket is released either way.
                debug!(error = %e, "Close handshake not completed");
                Ok(())
            }
            Err(_) => Err(WsError::transport("close handshake timed out")),
        }
    }
}

impl<S, M> std::fmt::Debug for SocketTransport<S, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketTransport")
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .field("close_timeout", &self.close_timeout)
            .finish_non_exhaustive()
    }
}
