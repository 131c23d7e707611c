//! Receive loop: reads frames, answers sentinels and dispatches handlers.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace};

use wshelper_core::error::{ErrorKind, WsError};
use wshelper_core::result::WsResult;

use super::Session;
use crate::handler::HandlerError;
use crate::message::control::{PONG_SENTINEL, Sentinel};
use crate::message::{Frame, FrameKind};

impl Session {
    /// Reads frames until the connection ends or a frame cannot be handled.
    ///
    /// `liveness` exists only while a keepalive supervisor is reading it.
    pub(super) async fn receive_loop(&self, liveness: Option<mpsc::Sender<bool>>) -> WsResult<()> {
        let transport = self.transport()?;
        loop {
            let Some(frame) = transport.next_frame().await? else {
                debug!(session_id = %self.id(), "Connection ended");
                return Ok(());
            };
            self.dispatch(frame, liveness.as_ref()).await?;
        }
    }

    async fn dispatch(&self, frame: Frame, liveness: Option<&mpsc::Sender<bool>>) -> WsResult<()> {
        match frame {
            Frame::Text(payload) => {
                let text = String::from_utf8(payload.to_vec()).map_err(|e| {
                    WsError::with_source(ErrorKind::Decode, "text message is not valid UTF-8", e)
                })?;

                match Sentinel::parse(&text) {
                    Some(Sentinel::Ping) => {
                        trace!(session_id = %self.id(), "Answering liveness ping");
                        self.write_message(FrameKind::Text, PONG_SENTINEL).await
                    }
                    Some(Sentinel::Pong) => {
                        self.signal_alive(liveness);
                        Ok(())
                    }
                    None => {
                        let Some(handler) = self.inner.handlers.text.clone() else {
                            debug!(session_id = %self.id(), "No text handler, message dropped");
                            return Ok(());
                        };
                        trace!(session_id = %self.id(), len = text.len(), "Received a text message");
                        handler(self.clone(), text).await.map_err(handler_failure)
                    }
                }
            }
            Frame::Stream(reader) => {
                let Some(handler) = self.inner.handlers.stream.clone() else {
                    debug!(session_id = %self.id(), "No stream handler, message dropped");
                    return Ok(());
                };
                trace!(session_id = %self.id(), "Received a binary message");
                handler(self.clone(), reader).await.map_err(handler_failure)
            }
            other => {
                trace!(
                    session_id = %self.id(),
                    kind = %other.kind(),
                    "Control frame left to the transport"
                );
                Ok(())
            }
        }
    }

    fn signal_alive(&self, liveness: Option<&mpsc::Sender<bool>>) {
        let Some(liveness) = liveness else {
            debug!(session_id = %self.id(), "Pong sentinel received with keepalive disabled");
            return;
        };
        match liveness.try_send(true) {
            Ok(()) => trace!(session_id = %self.id(), "Peer is alive"),
            Err(TrySendError::Full(_)) => trace!(session_id = %self.id(), "Liveness already signalled"),
            Err(TrySendError::Closed(_)) => trace!(session_id = %self.id(), "Keepalive supervisor gone"),
        }
    }
}

/// Maps a handler failure onto the terminal session error, keeping the cause.
fn handler_failure(err: HandlerError) -> WsError {
    match err {
        HandlerError::StreamRead(e) => {
            WsError::with_source(ErrorKind::StreamRead, "failed to read streamed message", e)
        }
        HandlerError::Failed(e) => WsError::with_source(ErrorKind::Handler, "fail to write data", e),
    }
}
