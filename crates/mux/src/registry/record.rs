// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::pty::PtyProcess;
use crate::ring::ChunkRingBuffer;
use crate::spawn::Mode;

pub type TerminalId = String;
pub type ConnectionId = u64;

pub fn new_terminal_id() -> TerminalId {
    Uuid::new_v4().to_string()
}

/// Status of a terminal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Running,
    Exited,
}

/// Output events broadcast to attached clients of a single terminal.
#[derive(Debug, Clone)]
pub enum TerminalOutput {
    Data(String),
    Exit { exit_code: Option<i32> },
}

/// A queued chunk awaiting delivery to a client mid-attach-snapshot.
#[derive(Debug, Clone, Default)]
pub struct PendingQueue {
    pub chunks: Vec<String>,
    pub queued_chars: usize,
}

/// A single managed terminal: its PTY, scrollback, and attached clients.
pub struct TerminalRecord {
    pub id: TerminalId,
    pub mode: Mode,
    pub title: String,
    pub cwd: Option<String>,
    pub resume_session_id: Option<String>,
    pub created_at: Instant,
    pub last_activity_at: RwLock<Instant>,
    pub status: RwLock<Status>,
    pub exit_code: RwLock<Option<i32>>,
    pub cols: RwLock<u16>,
    pub rows: RwLock<u16>,
    pub clients: RwLock<HashSet<ConnectionId>>,
    pub pending_snapshots: RwLock<HashMap<ConnectionId, PendingQueue>>,
    pub scrollback: RwLock<ChunkRingBuffer>,
    pub pty: PtyProcess,
    pub output_tx: broadcast::Sender<TerminalOutput>,
    /// Signals a specific attached client's forwarder to close its
    /// connection — used when the registry evicts a client for falling too
    /// far behind on its attach snapshot and has no direct handle to that
    /// client's sink.
    pub kick_tx: broadcast::Sender<ConnectionId>,
    pub warned_idle: RwLock<bool>,
    pub bytes_out: AtomicU64,
    pub bytes_in: AtomicU64,
    pub dropped_messages: AtomicU64,
    pub pending_input_at: RwLock<Option<Instant>>,
    pub max_input_lag_ms: AtomicU64,
}

impl TerminalRecord {
    pub async fn touch_activity(&self) {
        *self.last_activity_at.write().await = Instant::now();
        *self.warned_idle.write().await = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.status.read().await == Status::Running
    }

    pub async fn mark_exited(&self, exit_code: Option<i32>) -> bool {
        let mut status = self.status.write().await;
        if *status == Status::Exited {
            return false;
        }
        *status = Status::Exited;
        let mut code = self.exit_code.write().await;
        if code.is_none() {
            *code = Some(exit_code.unwrap_or(0));
        }
        true
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Mark an input write: records the pending-input timestamp if one isn't
    /// already outstanding, so a burst of keystrokes measures lag from the
    /// first unanswered one rather than the most recent.
    pub async fn mark_input_pending(&self) {
        let mut pending = self.pending_input_at.write().await;
        if pending.is_none() {
            *pending = Some(Instant::now());
        }
    }

    /// Resolve the outstanding input marker against an output chunk, folding
    /// the observed lag into the running max.
    pub async fn resolve_input_lag(&self) {
        let mut pending = self.pending_input_at.write().await;
        if let Some(at) = pending.take() {
            let lag_ms = at.elapsed().as_millis() as u64;
            self.max_input_lag_ms.fetch_max(lag_ms, Ordering::Relaxed);
        }
    }
}
