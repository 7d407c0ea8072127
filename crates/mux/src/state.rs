// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::registry::TerminalRegistry;

/// Shared server state, reachable from every WebSocket connection handler.
pub struct AppState {
    pub registry: Arc<TerminalRegistry>,
    pub config: Arc<Config>,
    pub shutdown: CancellationToken,
    connection_count: AtomicUsize,
    next_connection_id: AtomicU64,
}

impl AppState {
    pub fn new(config: Config, shutdown: CancellationToken) -> Self {
        let config = Arc::new(config);
        let registry = Arc::new(TerminalRegistry::new(Arc::clone(&config), shutdown.clone()));
        registry.spawn_idle_monitor();
        registry.spawn_perf_monitor();
        Self {
            registry,
            config,
            shutdown,
            connection_count: AtomicUsize::new(0),
            next_connection_id: AtomicU64::new(1),
        }
    }

    /// Reserve a new connection slot, or return `None` if the server is at
    /// `max_connections`.
    pub fn try_acquire_connection(&self) -> Option<ConnectionGuard<'_>> {
        loop {
            let current = self.connection_count.load(Ordering::Acquire);
            if current >= self.config.max_connections {
                return None;
            }
            if self
                .connection_count
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
                return Some(ConnectionGuard { state: self, id });
            }
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connection_count.load(Ordering::Acquire)
    }
}

/// RAII handle for a reserved connection slot; decrements the counter on drop
/// so a connection that disconnects always frees its slot.
pub struct ConnectionGuard<'a> {
    state: &'a AppState,
    id: u64,
}

impl ConnectionGuard<'_> {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        self.state.connection_count.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
