// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! freeshell-mux: cross-platform PTY multiplexing over a single WebSocket.

pub mod backpressure;
pub mod config;
pub mod error;
pub mod pty;
pub mod registry;
pub mod ring;
pub mod spawn;
pub mod state;
pub mod transport;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::state::AppState;
use crate::transport::build_router;

/// Run the server until shutdown is requested (Ctrl-C or an internal
/// cancellation), gracefully draining in-flight PTYs first.
pub async fn run(config: Config) -> anyhow::Result<()> {
    config.validate()?;
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();
    let shutdown_timeout = config.shutdown_timeout();

    let state = Arc::new(AppState::new(config, shutdown.clone()));
    let router = build_router(Arc::clone(&state));
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!(%addr, "freeshell-mux listening");

    let shutdown_signal = {
        let shutdown = shutdown.clone();
        async move {
            let ctrl_c = async { tokio::signal::ctrl_c().await.expect("install ctrl-c handler") };
            tokio::select! {
                _ = ctrl_c => {},
                _ = shutdown.cancelled() => {},
            }
        }
    };

    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal).await?;

    tracing::info!("draining running terminals");
    shutdown.cancel();
    state.registry.shutdown_gracefully(shutdown_timeout).await;

    Ok(())
}
