// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests for the mux HTTP surface.
//!
//! Uses `axum_test::TestServer` — no real TCP needed.

use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use tokio_util::sync::CancellationToken;

use freeshell_mux::config::Config;
use freeshell_mux::state::AppState;
use freeshell_mux::transport::build_router;

fn test_state() -> Arc<AppState> {
    Arc::new(AppState::new(Config::parse_test(), CancellationToken::new()))
}

fn test_server(state: Arc<AppState>) -> TestServer {
    TestServer::new(build_router(state)).expect("failed to create test server")
}

#[tokio::test]
async fn health_reports_zero_terminals_and_connections() {
    let server = test_server(test_state());
    let resp = server.get("/api/v1/health").await;
    resp.assert_status(StatusCode::OK);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["connections"], 0);
    assert_eq!(body["terminals"], 0);
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let server = test_server(test_state());
    let resp = server.get("/api/v1/does-not-exist").await;
    resp.assert_status(StatusCode::NOT_FOUND);
}
