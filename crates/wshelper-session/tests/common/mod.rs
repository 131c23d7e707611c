//! Scripted in-memory transport for session tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{Mutex, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use wshelper_core::error::WsError;
use wshelper_core::result::WsResult;
use wshelper_session::handler::{CloseHandler, PingHandler, PongHandler};
use wshelper_session::transport::ControlHandlers;
use wshelper_session::{Frame, FrameKind, Session, SessionState, Transport};

type Inbound = WsResult<Option<Frame>>;

struct Shared {
    written: StdMutex<Vec<(FrameKind, Bytes)>>,
    close_calls: AtomicUsize,
    fail_writes: AtomicBool,
    dropped: AtomicBool,
    shutdown: CancellationToken,
}

/// Transport half handed to the session.
pub struct MockTransport {
    inbound: Mutex<mpsc::UnboundedReceiver<Inbound>>,
    writes: mpsc::UnboundedSender<(FrameKind, Bytes)>,
    handlers: ControlHandlers,
    shared: Arc<Shared>,
}

/// Test-side half: feeds frames in and observes writes and closes.
pub struct MockPeer {
    pub inbound: mpsc::UnboundedSender<Inbound>,
    pub writes: mpsc::UnboundedReceiver<(FrameKind, Bytes)>,
    shared: Arc<Shared>,
}

pub fn mock_pair() -> (MockTransport, MockPeer) {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (writes_tx, writes_rx) = mpsc::unbounded_channel();
    let shared = Arc::new(Shared {
        written: StdMutex::new(Vec::new()),
        close_calls: AtomicUsize::new(0),
        fail_writes: AtomicBool::new(false),
        dropped: AtomicBool::new(false),
        shutdown: CancellationToken::new(),
    });

    let transport = MockTransport {
        inbound: Mutex::new(inbound_rx),
        writes: writes_tx,
        handlers: ControlHandlers::default(),
        shared: shared.clone(),
    };
    let peer = MockPeer {
        inbound: inbound_tx,
        writes: writes_rx,
        shared,
    };
    (transport, peer)
}

impl MockPeer {
    pub fn send(&self, frame: Frame) {
        self.inbound.send(Ok(Some(frame))).expect("session dropped its transport");
    }

    pub fn send_text(&self, text: &str) {
        self.send(Frame::text(text));
    }

    pub fn send_error(&self, message: &str) {
        self.inbound
            .send(Err(WsError::transport(message)))
            .expect("session dropped its transport");
    }

    /// Ends the inbound stream the way a peer close does.
    pub fn hang_up(&self) {
        let _ = self.inbound.send(Ok(None));
    }

    pub fn fail_writes(&self) {
        self.shared.fail_writes.store(true, Ordering::SeqCst);
    }

    pub async fn next_write(&mut self) -> (FrameKind, Bytes) {
        tokio::time::timeout(Duration::from_secs(60), self.writes.recv())
            .await
            .expect("timed out waiting for a write")
            .expect("transport dropped")
    }

    pub fn written(&self) -> Vec<(FrameKind, Bytes)> {
        self.shared.written.lock().unwrap().clone()
    }

    pub fn written_texts(&self) -> Vec<String> {
        self.written()
            .into_iter()
            .filter(|(kind, _)| *kind == FrameKind::Text)
            .map(|(_, payload)| String::from_utf8(payload.to_vec()).unwrap())
            .collect()
    }

    pub fn close_calls(&self) -> usize {
        self.shared.close_calls.load(Ordering::SeqCst)
    }

    /// Whether the session has let go of its transport.
    pub fn transport_dropped(&self) -> bool {
        self.shared.dropped.load(Ordering::SeqCst)
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        self.shared.dropped.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn next_frame(&self) -> WsResult<Option<Frame>> {
        let mut inbound = self.inbound.lock().await;
        loop {
            let next = tokio::select! {
                _ = self.shared.shutdown.cancelled() => return Ok(None),
                next = inbound.recv() => next,
            };
            match next {
                Some(Ok(Some(Frame::Ping(payload)))) => self.handlers.on_ping(&payload)?,
                Some(Ok(Some(Frame::Pong(payload)))) => self.handlers.on_pong(&payload)?,
                Some(Ok(Some(Frame::Close(reason)))) => {
                    self.handlers.on_close(reason.as_ref())?;
                    return Ok(None);
                }
                Some(item) => return item,
                None => return Ok(None),
            }
        }
    }

    async fn write_frame(&self, kind: FrameKind, payload: Bytes) -> WsResult<()> {
        if self.shared.fail_writes.load(Ordering::SeqCst) {
            return Err(WsError::transport("write refused"));
        }
        self.shared
            .written
            .lock()
            .unwrap()
            .push((kind, payload.clone()));
        let _ = self.writes.send((kind, payload));
        Ok(())
    }

    async fn write_control_frame(
        &self,
        kind: FrameKind,
        payload: Bytes,
        _deadline: Instant,
    ) -> WsResult<()> {
        self.write_frame(kind, payload).await
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
        self.shared.close_calls.fetch_add(1, Ordering::SeqCst);
        self.shared.shutdown.cancel();
        Ok(())
    }
}

/// Yields until the session reaches `state`.
pub async fn wait_for_state(session: &Session, state: SessionState) {
    for _ in 0..10_000 {
        if session.state() == state {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("session never reached {state:?}, stuck in {:?}", session.state());
}
