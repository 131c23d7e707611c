//! Integration tests for WebSocket upgrade, echo and teardown.

use std::time::Duration;

use futures::SinkExt;
use http::{HeaderValue, StatusCode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::{self, Message};

use wshelper_core::config::{AppConfig, KeepaliveConfig, SessionConfig};
use wshelper_core::error::ErrorKind;
use wshelper_session::Session;

use crate::helpers::{self, TestApp};

fn fast_keepalive() -> KeepaliveConfig {
    KeepaliveConfig {
        enabled: true,
        tick_interval_seconds: 1,
        timeout_ticks: 2,
        ..KeepaliveConfig::default()
    }
}

#[tokio::test]
async fn test_axum_route_echoes_text() {
    let app = TestApp::new().await;
    let (mut client, response) = connect_async(app.http_url()).await.unwrap();
    assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);

    client.send(Message::text("hello")).await.unwrap();
    assert_eq!(helpers::next_data(&mut client).await, Message::text("hello"));

    client.send(Message::text("ünïcödé")).await.unwrap();
    assert_eq!(helpers::next_data(&mut client).await, Message::text("ünïcödé"));
}

#[tokio::test]
async fn test_raw_listener_echoes_text() {
    let app = TestApp::new().await;
    let (mut client, _) = connect_async(app.raw_url()).await.unwrap();

    client.send(Message::text("over raw tcp")).await.unwrap();
    assert_eq!(
        helpers::next_data(&mut client).await,
        Message::text("over raw tcp")
    );
}

#[tokio::test]
async fn test_binary_round_trip() {
    let app = TestApp::new().await;
    let (mut client, _) = connect_async(app.http_url()).await.unwrap();

    let payload: Vec<u8> = (0..64 * 1024u32).map(|i| (i % 256) as u8).collect();
    client.send(Message::binary(payload.clone())).await.unwrap();

    match helpers::next_data(&mut client).await {
        Message::Binary(data) => assert_eq!(data.as_ref(), payload.as_slice()),
        other => panic!("expected binary echo, got {other:?}"),
    }
}

#[tokio::test]
async fn test_ping_sentinel_is_answered() {
    let app = TestApp::new().await;
    let (mut client, _) = connect_async(app.http_url()).await.unwrap();

    client.send(Message::text("control:ping")).await.unwrap();
    assert_eq!(
        helpers::next_data(&mut client).await,
        Message::text("control:pong")
    );

    // The pong sentinel is consumed, not echoed.
    client.send(Message::text("control:pong")).await.unwrap();
    client.send(Message::text("after")).await.unwrap();
    assert_eq!(helpers::next_data(&mut client).await, Message::text("after"));
}

#[tokio::test]
async fn test_disallowed_origin_is_forbidden() {
    let mut config = AppConfig::default();
    config.server.allowed_origins = vec!["https://app.example".to_string()];
    let app = TestApp::start(config).await;

    for url in [app.http_url(), app.raw_url()] {
        let mut request = url.clone().into_client_request().unwrap();
        request
            .headers_mut()
            .insert(http::header::ORIGIN, HeaderValue::from_static("https://evil.example"));

        match connect_async(request).await {
            Err(tungstenite::Error::Http(response)) => {
                assert_eq!(response.status(), StatusCode::FORBIDDEN, "{url}");
            }
            Err(other) => panic!("unexpected error for {url}: {other}"),
            Ok(_) => panic!("upgrade should have been refused for {url}"),
        }
    }

    let mut request = app.http_url().into_client_request().unwrap();
    request
        .headers_mut()
        .insert(http::header::ORIGIN, HeaderValue::from_static("https://APP.example"));
    let (mut client, _) = connect_async(request).await.unwrap();
    client.send(Message::text("let me in")).await.unwrap();
    assert_eq!(
        helpers::next_data(&mut client).await,
        Message::text("let me in")
    );
}

#[tokio::test]
async fn test_rejected_origin_reports_authorization() {
    let session = Session::builder(SessionConfig::default())
        .check_origin(|_request| false)
        .build();
    let (addr, handle) = helpers::serve_one(session.clone()).await;

    let err = connect_async(format!("ws://{addr}/")).await.unwrap_err();
    assert!(matches!(err, tungstenite::Error::Http(ref r) if r.status() == StatusCode::FORBIDDEN));

    let result = handle.await.unwrap();
    assert_eq!(result.unwrap_err().kind, ErrorKind::Authorization);
    assert!(!session.is_closed());
}

#[tokio::test]
async fn test_failed_handshake_reports_upgrade_error() {
    let (addr, handle) = helpers::serve_one(Session::new(1024, 1024)).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"POST / HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    drop(stream);

    let result = handle.await.unwrap();
    assert_eq!(result.unwrap_err().kind, ErrorKind::Upgrade);
}

#[tokio::test]
async fn test_plain_request_to_ws_route_is_bad_request() {
    let app = TestApp::new().await;

    let mut stream = TcpStream::connect(app.http_addr).await.unwrap();
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        app.config.server.path
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 400"), "got: {response}");
}

#[tokio::test]
async fn test_client_close_ends_session_cleanly() {
    let config = AppConfig::default();
    let session = wshelper::echo_session(&config);
    let (addr, handle) = helpers::serve_one(session.clone()).await;

    let (mut client, _) = connect_async(format!("ws://{addr}/")).await.unwrap();
    client.send(Message::text("one")).await.unwrap();
    assert_eq!(helpers::next_data(&mut client).await, Message::text("one"));

    client.close(None).await.unwrap();
    helpers::expect_closed(&mut client).await;

    let result = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("session did not finish")
        .unwrap();
    assert!(result.is_ok(), "{result:?}");
    assert!(session.is_closed());
}

#[tokio::test]
async fn test_silent_client_is_disconnected_by_keepalive() {
    let mut config = AppConfig::default();
    config.session.keepalive = fast_keepalive();
    let session = wshelper::echo_session(&config);
    let (addr, handle) = helpers::serve_one(session).await;

    let (mut client, _) = connect_async(format!("ws://{addr}/")).await.unwrap();
    assert_eq!(
        helpers::next_data(&mut client).await,
        Message::text("control:ping")
    );

    helpers::expect_closed(&mut client).await;

    let result = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("session did not finish")
        .unwrap();
    assert_eq!(result.unwrap_err().kind, ErrorKind::KeepaliveTimeout);
}

#[tokio::test]
async fn test_answering_client_is_kept_alive() {
    let mut config = AppConfig::default();
    config.session.keepalive = fast_keepalive();
    let session = wshelper::echo_session(&config);
    let (addr, handle) = helpers::serve_one(session.clone()).await;

    let (mut client, _) = connect_async(format!("ws://{addr}/")).await.unwrap();

    let mut answered = 0;
    while answered < 4 {
        let message = helpers::next_data(&mut client).await;
        assert_eq!(message, Message::text("control:ping"));
        client.send(Message::text("control:pong")).await.unwrap();
        answered += 1;
    }

    client.send(Message::text("still here")).await.unwrap();
    loop {
        let message = helpers::next_data(&mut client).await;
        if message == Message::text("still here") {
            break;
        }
        assert_eq!(message, Message::text("control:ping"));
        client.send(Message::text("control:pong")).await.unwrap();
    }
    assert!(!session.is_closed());

    client.close(None).await.unwrap();
    helpers::expect_closed(&mut client).await;
    assert!(handle.await.unwrap().is_ok());
}
