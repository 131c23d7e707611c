//! Router, upgrade handler and raw listener for the echo server.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Request, State};
use axum::http::header::ORIGIN;
use axum::response::Response;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use wshelper_core::config::AppConfig;
use wshelper_core::error::WsError;
use wshelper_session::{FrameKind, Session, StreamReader};

/// Builds the axum router serving echo sessions on `config.server.path`.
pub fn build_router(config: Arc<AppConfig>) -> Router {
    let path = config.server.path.clone();
    Router::new()
        .route(&path, get(upgrade))
        .with_state(config)
}

async fn upgrade(
    State(config): State<Arc<AppConfig>>,
    request: Request,
) -> Result<Response, WsError> {
    echo_session(&config).accept(request).await
}

/// Creates a session that writes every message back to its sender.
///
/// Upgrades are refused unless the request's `Origin` header passes the
/// configured allow-list.
pub fn echo_session(config: &AppConfig) -> Session {
    let server = config.server.clone();
    Session::from_config(&config.session)
        .check_origin(move |request| {
            let origin = request
                .headers()
                .get(ORIGIN)
                .and_then(|value| value.to_str().ok());
            server.origin_allowed(origin)
        })
        .on_text(|session: Session, text: String| async move {
            session.write_message(FrameKind::Text, text).await?;
            Ok(())
        })
        .on_stream(|session: Session, mut reader: StreamReader| async move {
            let data = reader.read_all()?;
            session.write_message(FrameKind::Binary, data).await?;
            Ok(())
        })
        .on_close(|code, reason| {
            debug!(code, reason, "Peer closed the connection");
            Ok(())
        })
        .build()
}

/// Accepts raw TCP connections and serves an echo session on each until
/// `shutdown` flips.
pub async fn serve_raw(
    listener: TcpListener,
    config: Arc<AppConfig>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let session = echo_session(&config);
                    debug!(%peer, session_id = %session.id(), "Raw connection accepted");
                    tokio::spawn(async move {
                        if let Err(e) = session.start_handle(stream).await {
                            debug!(%peer, kind = %e.kind, "Raw session ended with error");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "Failed to accept raw connection"),
            },
            _ = shutdown.changed() => {
                info!("Raw listener stopping");
                break;
            }
        }
    }
}
