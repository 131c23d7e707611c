//! Caller-supplied callbacks invoked by a session.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use thiserror::Error;

use wshelper_core::error::{BoxError, WsError};

use crate::message::StreamReader;
use crate::session::Session;

/// Result returned by text and stream handlers.
pub type HandlerResult = Result<(), HandlerError>;

/// Failure reported by an application handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Reading a streamed payload failed.
    #[error("stream read failed: {0}")]
    StreamRead(#[from] std::io::Error),
    /// The handler itself failed.
    #[error("{0}")]
    Failed(BoxError),
}

impl HandlerError {
    /// Wraps any error as a handler failure.
    pub fn failed(err: impl Into<BoxError>) -> Self {
        Self::Failed(err.into())
    }
}

impl From<WsError> for HandlerError {
    fn from(err: WsError) -> Self {
        Self::Failed(Box::new(err))
    }
}

/// Origin predicate consulted during the upgrade handshake.
pub type OriginCheck = Arc<dyn Fn(&http::Request<()>) -> bool + Send + Sync>;

/// Called with the status code and reason when the peer sends a close frame.
pub type CloseHandler = Arc<dyn Fn(u16, &str) -> Result<(), BoxError> + Send + Sync>;

/// Called with the payload of a native ping frame.
pub type PingHandler = Arc<dyn Fn(&[u8]) -> Result<(), BoxError> + Send + Sync>;

/// Called with the payload of a native pong frame.
pub type PongHandler = Arc<dyn Fn(&[u8]) -> Result<(), BoxError> + Send + Sync>;

/// Called with every non-sentinel text message.
pub type TextHandler =
    Arc<dyn Fn(Session, String) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Called with a reader over every binary message.
pub type StreamHandler =
    Arc<dyn Fn(Session, StreamReader) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Independently optional callbacks for one session.
///
/// An empty slot falls back to the default: any origin is accepted,
/// ping/pong/close are left to the transport library and data messages
/// without a handler are dropped.
#[derive(Clone, Default)]
pub struct HandlerSet {
    /// Origin predicate.
    pub origin: Option<OriginCheck>,
    /// Close notification.
    pub close: Option<CloseHandler>,
    /// Text message handler.
    pub text: Option<TextHandler>,
    /// Binary message handler.
    pub stream: Option<StreamHandler>,
    /// Native ping handler.
    pub ping: Option<PingHandler>,
    /// Native pong handler.
    pub pong: Option<PongHandler>,
}

impl HandlerSet {
    pub(crate) fn boxed_text<F, Fut>(handler: F) -> TextHandler
    where
        F: Fn(Session, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Arc::new(move |session, text| handler(session, text).boxed())
    }

    pub(crate) fn boxed_stream<F, Fut>(handler: F) -> StreamHandler
    where
        F: Fn(Session, StreamReader) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Arc::new(move |session, reader| handler(session, reader).boxed())
    }
}

impl fmt::Debug for HandlerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerSet")
            .field("origin", &self.origin.is_some())
            .field("close", &self.close.is_some())
            .field("text", &self.text.is_some())
            .field("stream", &self.stream.is_some())
            .field("ping", &self.ping.is_some())
            .field("pong", &self.pong.is_some())
            .finish()
    }
}
