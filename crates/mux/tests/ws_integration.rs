// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket integration tests using real connections against an in-process
//! axum server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::CancellationToken;

use freeshell_mux::config::Config;
use freeshell_mux::state::AppState;
use freeshell_mux::transport::build_router;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;
type WsTx = futures_util::stream::SplitSink<WsStream, WsMessage>;
type WsRx = futures_util::stream::SplitStream<WsStream>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

async fn spawn_server(config: Config) -> anyhow::Result<SocketAddr> {
    let state = Arc::new(AppState::new(config, CancellationToken::new()));
    let router = build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(addr)
}

async fn ws_connect(addr: &SocketAddr) -> anyhow::Result<(WsTx, WsRx)> {
    let url = format!("ws://{addr}/ws");
    let (stream, _) =
        tokio_tungstenite::connect_async(&url).await.map_err(|e| anyhow::anyhow!("ws connect: {e}"))?;
    Ok(stream.split())
}

async fn ws_send(tx: &mut WsTx, value: &serde_json::Value) -> anyhow::Result<()> {
    let text = serde_json::to_string(value)?;
    tx.send(WsMessage::Text(text.into())).await.map_err(|e| anyhow::anyhow!("ws send: {e}"))?;
    Ok(())
}

async fn ws_recv(rx: &mut WsRx) -> anyhow::Result<serde_json::Value> {
    let msg = tokio::time::timeout(RECV_TIMEOUT, rx.next())
        .await
        .map_err(|_| anyhow::anyhow!("ws recv timeout"))?
        .ok_or_else(|| anyhow::anyhow!("ws stream closed"))?
        .map_err(|e| anyhow::anyhow!("ws recv: {e}"))?;
    match msg {
        WsMessage::Text(text) => Ok(serde_json::from_str(&text)?),
        other => anyhow::bail!("expected Text message, got {other:?}"),
    }
}

async fn hello(tx: &mut WsTx, rx: &mut WsRx, token: &str) -> anyhow::Result<()> {
    ws_send(tx, &serde_json::json!({"type": "hello", "token": token})).await?;
    let resp = ws_recv(rx).await?;
    anyhow::ensure!(resp["type"] == "ready", "expected ready, got {resp}");
    Ok(())
}

#[tokio::test]
async fn hello_then_ping_receives_pong() -> anyhow::Result<()> {
    let addr = spawn_server(Config::parse_test()).await?;
    let (mut tx, mut rx) = ws_connect(&addr).await?;

    hello(&mut tx, &mut rx, "").await?;
    ws_send(&mut tx, &serde_json::json!({"type": "ping"})).await?;
    let resp = ws_recv(&mut rx).await?;
    assert_eq!(resp["type"], "pong");
    Ok(())
}

#[tokio::test]
async fn wrong_token_is_rejected() -> anyhow::Result<()> {
    let mut config = Config::parse_test();
    config.auth_token = Some("right-token".to_owned());
    let addr = spawn_server(config).await?;
    let (mut tx, mut rx) = ws_connect(&addr).await?;

    ws_send(&mut tx, &serde_json::json!({"type": "hello", "token": "wrong-token"})).await?;
    let result = tokio::time::timeout(RECV_TIMEOUT, rx.next()).await?;
    match result {
        Some(Ok(WsMessage::Close(_))) | None => {}
        other => panic!("expected connection to close, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn create_attach_input_kill_roundtrip() -> anyhow::Result<()> {
    let addr = spawn_server(Config::parse_test()).await?;
    let (mut tx, mut rx) = ws_connect(&addr).await?;
    hello(&mut tx, &mut rx, "").await?;

    ws_send(
        &mut tx,
        &serde_json::json!({"type": "terminal.create", "request_id": "r1", "mode": "shell"}),
    )
    .await?;
    let created = ws_recv(&mut rx).await?;
    assert_eq!(created["type"], "terminal.created");
    assert_eq!(created["request_id"], "r1");
    let terminal_id = created["terminal_id"].as_str().unwrap().to_owned();

    ws_send(&mut tx, &serde_json::json!({"type": "terminal.attach", "terminal_id": terminal_id})).await?;
    let attached = ws_recv(&mut rx).await?;
    assert_eq!(attached["type"], "terminal.attached");
    assert_eq!(attached["terminal_id"], terminal_id);

    ws_send(
        &mut tx,
        &serde_json::json!({"type": "terminal.input", "terminal_id": terminal_id, "data": "echo hi\n"}),
    )
    .await?;

    ws_send(&mut tx, &serde_json::json!({"type": "terminal.kill", "terminal_id": terminal_id})).await?;

    // The exit notification may race with intervening output chunks; drain
    // until we see it or time out.
    let exit = loop {
        let msg = ws_recv(&mut rx).await?;
        if msg["type"] == "terminal.exit" {
            break msg;
        }
    };
    assert_eq!(exit["terminal_id"], terminal_id);
    Ok(())
}

#[tokio::test]
async fn create_is_idempotent_per_request_id() -> anyhow::Result<()> {
    let addr = spawn_server(Config::parse_test()).await?;
    let (mut tx, mut rx) = ws_connect(&addr).await?;
    hello(&mut tx, &mut rx, "").await?;

    let create = serde_json::json!({"type": "terminal.create", "request_id": "dup", "mode": "shell"});
    ws_send(&mut tx, &create).await?;
    let first = ws_recv(&mut rx).await?;

    ws_send(&mut tx, &create).await?;
    let second = ws_recv(&mut rx).await?;

    assert_eq!(first["terminal_id"], second["terminal_id"]);
    Ok(())
}

#[tokio::test]
async fn backpressure_overflow_closes_with_4008() -> anyhow::Result<()> {
    let mut config = Config::parse_test();
    // Small enough that even the `ready` response overflows it.
    config.max_ws_buffered_amount = 1;
    let addr = spawn_server(config).await?;
    let (mut tx, mut rx) = ws_connect(&addr).await?;

    ws_send(&mut tx, &serde_json::json!({"type": "hello", "token": ""})).await?;
    let msg = tokio::time::timeout(RECV_TIMEOUT, rx.next())
        .await?
        .ok_or_else(|| anyhow::anyhow!("ws stream closed with no frame"))?
        .map_err(|e| anyhow::anyhow!("ws recv: {e}"))?;
    match msg {
        WsMessage::Close(Some(frame)) => assert_eq!(u16::from(frame.code), 4008),
        other => panic!("expected a 4008 close frame, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn unknown_terminal_input_returns_error() -> anyhow::Result<()> {
    let addr = spawn_server(Config::parse_test()).await?;
    let (mut tx, mut rx) = ws_connect(&addr).await?;
    hello(&mut tx, &mut rx, "").await?;

    ws_send(
        &mut tx,
        &serde_json::json!({"type": "terminal.input", "terminal_id": "does-not-exist", "data": "x"}),
    )
    .await?;
    let resp = ws_recv(&mut rx).await?;
    assert_eq!(resp["type"], "error");
    assert_eq!(resp["code"], "INVALID_TERMINAL_ID");
    Ok(())
}
