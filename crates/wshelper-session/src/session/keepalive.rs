//! Application-level keepalive supervisor.

use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{trace, warn};

use wshelper_core::error::{ErrorKind, WsError};
use wshelper_core::result::WsResult;

use super::Session;
use crate::message::FrameKind;
use crate::message::control::PING_SENTINEL;

impl Session {
    /// Pings the peer every tick and fails once it stops answering.
    ///
    /// Never returns `Ok`; the caller closes the transport when this ends.
    pub(super) async fn supervise(&self, mut liveness: mpsc::Receiver<bool>) -> WsResult<()> {
        let config = &self.inner.config.keepalive;
        let period = config.tick_interval();
        let grace_ticks = config.timeout_ticks.saturating_sub(1).max(1);

        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            // An answer that arrived between pings must not satisfy this one.
            while liveness.try_recv().is_ok() {}

            if let Err(e) = self.write_message(FrameKind::Text, PING_SENTINEL).await {
                if config.close_on_ping_failure {
                    return Err(WsError::with_source(
                        ErrorKind::Transport,
                        "keepalive ping could not be written",
                        e,
                    ));
                }
                warn!(session_id = %self.id(), error = %e, "Keepalive ping write failed");
            }

            let mut missed = 0;
            loop {
                tokio::select! {
                    signal = liveness.recv() => match signal {
                        Some(true) => {
                            trace!(session_id = %self.id(), "Keepalive answered");
                            break;
                        }
                        Some(false) | None => {
                            warn!(session_id = %self.id(), "Peer is not alive, closing the connection");
                            return Err(WsError::new(
                                ErrorKind::PeerNotAlive,
                                "peer reported as not alive",
                            ));
                        }
                    },
                    _ = ticker.tick() => {
                        missed += 1;
                        if missed >= grace_ticks {
                            warn!(
                                session_id = %self.id(),
                                timeout = ?config.timeout(),
                                "Keepalive timeout, peer is not alive, closing the connection"
                            );
                            return Err(WsError::new(
                                ErrorKind::KeepaliveTimeout,
                                format!("no keepalive answer within {:?}", config.timeout()),
                            ));
                        }
                    }
                }
            }
        }
    }
}
