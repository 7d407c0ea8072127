// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket transport for the terminal multiplexer.

pub mod auth;
pub mod http;
pub mod ws;
pub mod ws_msg;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::state::AppState;

/// Build the axum `Router`: a health check plus the single WebSocket route
/// that carries the entire terminal protocol.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = build_cors_layer(&state);
    Router::new()
        .route("/api/v1/health", get(http::health))
        .route("/ws", get(ws::ws_handler))
        .layer(cors)
        .with_state(state)
}

fn build_cors_layer(state: &Arc<AppState>) -> CorsLayer {
    if state.config.allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<_> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    CorsLayer::new().allow_origin(origins).allow_methods(tower_http::cors::Any)
}
