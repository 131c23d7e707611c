//! Shared test helpers for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use wshelper_core::config::AppConfig;
use wshelper_core::result::WsResult;
use wshelper_session::Session;

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Echo server running on ephemeral ports.
pub struct TestApp {
    /// Address of the axum listener
    pub http_addr: SocketAddr,
    /// Address of the raw tungstenite listener
    pub raw_addr: SocketAddr,
    /// Application config
    pub config: Arc<AppConfig>,
    shutdown: watch::Sender<bool>,
}

impl TestApp {
    /// Start both listeners with the given configuration.
    pub async fn start(config: AppConfig) -> Self {
        let config = Arc::new(config);
        let (shutdown, shutdown_rx) = watch::channel(false);

        let http = TcpListener::bind("127.0.0.1:0").await.expect("bind http");
        let http_addr = http.local_addr().unwrap();
        let router = wshelper::build_router(Arc::clone(&config));
        let mut http_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            axum::serve(http, router)
                .with_graceful_shutdown(async move {
                    let _ = http_shutdown.changed().await;
                })
                .await
                .expect("axum server");
        });

        let raw = TcpListener::bind("127.0.0.1:0").await.expect("bind raw");
        let raw_addr = raw.local_addr().unwrap();
        tokio::spawn(wshelper::serve_raw(raw, Arc::clone(&config), shutdown_rx));

        Self {
            http_addr,
            raw_addr,
            config,
            shutdown,
        }
    }

    /// Start with default configuration.
    pub async fn new() -> Self {
        Self::start(AppConfig::default()).await
    }

    pub fn http_url(&self) -> String {
        format!("ws://{}{}", self.http_addr, self.config.server.path)
    }

    pub fn raw_url(&self) -> String {
        format!("ws://{}/", self.raw_addr)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

/// Serves exactly one connection with `session` and hands back its result.
pub async fn serve_one(session: Session) -> (SocketAddr, JoinHandle<WsResult<()>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        session.start_handle(stream).await
    });
    (addr, handle)
}

/// Next text or binary message, skipping control frames.
pub async fn next_data(client: &mut Client) -> Message {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(10), client.next())
            .await
            .expect("timed out waiting for a message")
            .expect("connection ended")
            .expect("read failed");
        match message {
            Message::Text(_) | Message::Binary(_) => return message,
            _ => continue,
        }
    }
}

/// Waits for the server to end the connection, returning the close frame if any.
pub async fn expect_closed(client: &mut Client) -> Option<Message> {
    loop {
        let next = tokio::time::timeout(Duration::from_secs(10), client.next())
            .await
            .expect("connection still open");
        match next {
            Some(Ok(message @ Message::Close(_))) => return Some(message),
            Some(Ok(_)) => continue,
            Some(Err(_)) | None => return None,
        }
    }
}
