// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal registry: owns every PTY-backed terminal record. All mutation
//! goes through these methods; callers never see the record's fields exposed
//! for direct write access outside this module's own locks.

pub mod record;

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::pty::PtyProcess;
use crate::ring::ChunkRingBuffer;
use crate::spawn::{self, HostInfo, Mode, ShellKind, SpawnRequest};

pub use record::{ConnectionId, PendingQueue, Status, TerminalId, TerminalOutput, TerminalRecord};

/// Options for creating a new terminal.
#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub mode: Mode,
    pub shell: ShellKind,
    pub cwd: Option<String>,
    pub resume_session_id: Option<String>,
    pub permission_mode: Option<String>,
    pub cols: u16,
    pub rows: u16,
    pub tab_id: Option<String>,
    pub pane_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateError {
    MaxTerminalsReached,
    InvalidResumeSessionId,
    SpawnFailed,
}

/// Outcome of a successful create: either a fresh record, or reuse of an
/// existing Running record owned by the same (mode, resume_session_id).
pub struct CreateOutcome {
    pub record: Arc<TerminalRecord>,
    pub reused: bool,
}

/// Public-facing terminal summary for `terminal.list`.
#[derive(Debug, Clone, Serialize)]
pub struct TerminalDescriptor {
    pub id: TerminalId,
    pub mode: &'static str,
    pub title: String,
    pub status: &'static str,
    pub cols: u16,
    pub rows: u16,
    pub client_count: usize,
    pub exit_code: Option<i32>,
}

pub struct TerminalRegistry {
    records: RwLock<HashMap<TerminalId, Arc<TerminalRecord>>>,
    exited_order: RwLock<VecDeque<TerminalId>>,
    config: Arc<Config>,
    host: HostInfo,
    max_scrollback_chars: std::sync::atomic::AtomicUsize,
    shutdown: CancellationToken,
}

impl TerminalRegistry {
    pub fn new(config: Arc<Config>, shutdown: CancellationToken) -> Self {
        let max_scrollback_chars = config.max_scrollback_chars;
        Self {
            records: RwLock::new(HashMap::new()),
            exited_order: RwLock::new(VecDeque::new()),
            host: HostInfo::detect(),
            config,
            max_scrollback_chars: std::sync::atomic::AtomicUsize::new(max_scrollback_chars),
            shutdown,
        }
    }

    pub fn set_max_scrollback_chars(&self, n: usize) {
        self.max_scrollback_chars.store(n, Ordering::Relaxed);
    }

    async fn reap_exited_overflow(&self) {
        let mut order = self.exited_order.write().await;
        let mut records = self.records.write().await;
        while order.len() > self.config.max_exited_terminals {
            if let Some(oldest) = order.pop_front() {
                records.remove(&oldest);
            } else {
                break;
            }
        }
    }

    async fn running_count(&self) -> usize {
        let mut count = 0;
        for record in self.records.read().await.values() {
            if record.is_running().await {
                count += 1;
            }
        }
        count
    }

    pub async fn find_running_terminal_by_session(
        &self,
        mode: Mode,
        session_id: &str,
    ) -> Option<Arc<TerminalRecord>> {
        for record in self.records.read().await.values() {
            if record.mode == mode
                && record.resume_session_id.as_deref() == Some(session_id)
                && record.is_running().await
            {
                return Some(Arc::clone(record));
            }
        }
        None
    }

    pub async fn create(&self, opts: CreateOptions) -> Result<CreateOutcome, CreateError> {
        self.reap_exited_overflow().await;

        if let Some(ref session_id) = opts.resume_session_id {
            if spawn::normalize_resume_session_id(opts.mode, Some(session_id)).is_err() {
                return Err(CreateError::InvalidResumeSessionId);
            }
            if let Some(existing) =
                self.find_running_terminal_by_session(opts.mode, session_id).await
            {
                return Ok(CreateOutcome { record: existing, reused: true });
            }
        }

        if self.running_count().await >= self.config.max_terminals {
            return Err(CreateError::MaxTerminalsReached);
        }

        let server_env: HashMap<String, String> = std::env::vars().collect();
        let req = SpawnRequest {
            mode: opts.mode,
            shell: opts.shell,
            cwd: opts.cwd.as_deref(),
            resume_session_id: opts.resume_session_id.as_deref(),
            permission_mode: opts.permission_mode.as_deref(),
            tab_id: opts.tab_id.as_deref(),
            pane_id: opts.pane_id.as_deref(),
        };
        let spec = spawn::resolve(&self.config, &self.host, &server_env, &req);

        let (pty, output_rx, exit_rx) = PtyProcess::spawn(&spec, opts.cols, opts.rows)
            .map_err(|e| {
                tracing::error!(error = %e, "terminal.spawn_failed");
                CreateError::SpawnFailed
            })?;

        let id = record::new_terminal_id();
        let (output_tx, _) = tokio::sync::broadcast::channel(1024);
        let (kick_tx, _) = tokio::sync::broadcast::channel(64);
        let max_scrollback = self.max_scrollback_chars.load(Ordering::Relaxed);

        let record = Arc::new(TerminalRecord {
            id: id.clone(),
            mode: opts.mode,
            title: opts.mode.label().to_owned(),
            cwd: opts.cwd,
            resume_session_id: opts.resume_session_id,
            created_at: Instant::now(),
            last_activity_at: RwLock::new(Instant::now()),
            status: RwLock::new(Status::Running),
            exit_code: RwLock::new(None),
            cols: RwLock::new(opts.cols),
            rows: RwLock::new(opts.rows),
            clients: RwLock::new(Default::default()),
            pending_snapshots: RwLock::new(HashMap::new()),
            scrollback: RwLock::new(ChunkRingBuffer::new(max_scrollback)),
            pty,
            output_tx,
            kick_tx,
            warned_idle: RwLock::new(false),
            bytes_out: Default::default(),
            bytes_in: Default::default(),
            dropped_messages: Default::default(),
            pending_input_at: RwLock::new(None),
            max_input_lag_ms: Default::default(),
        });

        self.records.write().await.insert(id.clone(), Arc::clone(&record));
        spawn_output_pump(Arc::clone(&record), output_rx, exit_rx, self.max_pending_snapshot_chars());

        tracing::info!(terminal_id = %id, mode = record.mode.label(), "terminal.created");
        Ok(CreateOutcome { record, reused: false })
    }

    fn max_pending_snapshot_chars(&self) -> usize {
        self.config.max_pending_snapshot_chars
    }

    pub async fn get(&self, id: &str) -> Option<Arc<TerminalRecord>> {
        self.records.read().await.get(id).cloned()
    }

    pub async fn attach(
        &self,
        id: &str,
        client: ConnectionId,
        pending_snapshot: bool,
    ) -> Option<Arc<TerminalRecord>> {
        let record = self.get(id).await?;
        record.clients.write().await.insert(client);
        if pending_snapshot {
            record.pending_snapshots.write().await.insert(client, PendingQueue::default());
        }
        record.touch_activity().await;
        Some(record)
    }

    /// Remove the pending queue for `client` and return its buffered chunks
    /// in arrival order, for the caller to flush before live streaming begins.
    pub async fn finish_attach_snapshot(&self, id: &str, client: ConnectionId) -> Vec<String> {
        let Some(record) = self.get(id).await else { return Vec::new() };
        record
            .pending_snapshots
            .write()
            .await
            .remove(&client)
            .map(|q| q.chunks)
            .unwrap_or_default()
    }

    pub async fn detach(&self, id: &str, client: ConnectionId) -> bool {
        let Some(record) = self.get(id).await else { return false };
        let removed = record.clients.write().await.remove(&client);
        record.pending_snapshots.write().await.remove(&client);
        removed
    }

    /// Remove `client` from every terminal it touched (connection teardown).
    pub async fn detach_all(&self, client: ConnectionId) {
        let records: Vec<Arc<TerminalRecord>> = self.records.read().await.values().cloned().collect();
        for record in records {
            record.clients.write().await.remove(&client);
            record.pending_snapshots.write().await.remove(&client);
        }
    }

    pub async fn input(&self, id: &str, data: Bytes) -> bool {
        let Some(record) = self.get(id).await else { return false };
        if !record.is_running().await {
            return false;
        }
        record.bytes_in.fetch_add(data.len() as u64, Ordering::Relaxed);
        record.mark_input_pending().await;
        record.touch_activity().await;
        record.pty.write(data)
    }

    pub async fn resize(&self, id: &str, cols: u16, rows: u16) -> bool {
        let Some(record) = self.get(id).await else { return false };
        *record.cols.write().await = cols;
        *record.rows.write().await = rows;
        record.pty.resize(cols, rows)
    }

    pub async fn kill(&self, id: &str) -> bool {
        let Some(record) = self.get(id).await else { return false };
        if !record.mark_exited(Some(0)).await {
            return true;
        }
        record.pty.kill();
        record.clients.write().await.clear();
        record.pending_snapshots.write().await.clear();
        let _ = record.output_tx.send(TerminalOutput::Exit { exit_code: *record.exit_code.read().await });
        self.exited_order.write().await.push_back(id.to_owned());
        self.reap_exited_overflow().await;
        tracing::info!(terminal_id = %id, "terminal.exit");
        true
    }

    pub async fn remove(&self, id: &str) -> bool {
        self.kill(id).await;
        self.records.write().await.remove(id).is_some()
    }

    pub async fn list(&self) -> Vec<TerminalDescriptor> {
        let mut out = Vec::new();
        for record in self.records.read().await.values() {
            out.push(TerminalDescriptor {
                id: record.id.clone(),
                mode: record.mode.label(),
                title: record.title.clone(),
                status: if record.is_running().await { "running" } else { "exited" },
                cols: *record.cols.read().await,
                rows: *record.rows.read().await,
                client_count: record.client_count().await,
                exit_code: *record.exit_code.read().await,
            });
        }
        out
    }

    /// Send SIGTERM-equivalent to every Running PTY, then wait for either all
    /// processes to exit or `timeout` to elapse, force-killing survivors.
    pub async fn shutdown_gracefully(&self, timeout: std::time::Duration) {
        let running: Vec<Arc<TerminalRecord>> = {
            let records = self.records.read().await;
            let mut out = Vec::new();
            for record in records.values() {
                if record.is_running().await {
                    out.push(Arc::clone(record));
                }
            }
            out
        };
        for record in &running {
            record.pty.terminate();
        }
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);
        loop {
            let mut all_exited = true;
            for record in &running {
                if record.is_running().await {
                    all_exited = false;
                    break;
                }
            }
            if all_exited {
                break;
            }
            tokio::select! {
                _ = &mut deadline => break,
                _ = tokio::time::sleep(std::time::Duration::from_millis(50)) => {}
            }
        }
        for record in &running {
            if record.is_running().await {
                record.pty.kill();
            }
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Background task: periodically warn-then-kill idle (zero-client) terminals.
    pub fn spawn_idle_monitor(self: &Arc<Self>) {
        if self.config.auto_kill_idle_minutes == 0 {
            return;
        }
        let registry = Arc::clone(self);
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(30));
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => registry.run_idle_sweep().await,
                }
            }
        });
    }

    async fn run_idle_sweep(&self) {
        let kill_after = std::time::Duration::from_secs(self.config.auto_kill_idle_minutes * 60);
        let warn_before = std::time::Duration::from_secs(self.config.warn_before_kill_minutes * 60);

        let candidates: Vec<Arc<TerminalRecord>> = {
            let records = self.records.read().await;
            let mut out = Vec::new();
            for record in records.values() {
                if record.is_running().await && record.client_count().await == 0 {
                    out.push(Arc::clone(record));
                }
            }
            out
        };

        for record in candidates {
            let idle_for = record.last_activity_at.read().await.elapsed();
            if idle_for >= kill_after {
                self.kill(&record.id).await;
                continue;
            }
            if warn_before > std::time::Duration::ZERO
                && idle_for >= kill_after.saturating_sub(warn_before)
            {
                let mut warned = record.warned_idle.write().await;
                if !*warned {
                    *warned = true;
                    tracing::warn!(terminal_id = %record.id, "terminal.idle.warning");
                }
            }
        }
    }

    /// Background task: periodically drain and log per-terminal perf counters.
    pub fn spawn_perf_monitor(self: &Arc<Self>) {
        if self.config.perf_monitor_interval_seconds == 0 {
            return;
        }
        let registry = Arc::clone(self);
        let shutdown = self.shutdown.clone();
        let interval = std::time::Duration::from_secs(self.config.perf_monitor_interval_seconds);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => registry.run_perf_sweep().await,
                }
            }
        });
    }

    /// Drains each record's counters and logs them, escalating to
    /// `perf_severity = "warn"` when drops occurred or input lag crossed the
    /// configured threshold. The event always logs at `tracing::info`; the
    /// severity field (not the tracing level) carries the escalation so a
    /// single log sink/filter config covers both the routine and the noisy
    /// case without a second subscriber target.
    async fn run_perf_sweep(&self) {
        let warn_threshold_ms = self.config.perf_lag_warn_ms;
        let records: Vec<Arc<TerminalRecord>> = self.records.read().await.values().cloned().collect();
        for record in records {
            let bytes_in = record.bytes_in.swap(0, Ordering::Relaxed);
            let bytes_out = record.bytes_out.swap(0, Ordering::Relaxed);
            let dropped = record.dropped_messages.swap(0, Ordering::Relaxed);
            let max_lag_ms = record.max_input_lag_ms.swap(0, Ordering::Relaxed);

            if bytes_in == 0 && bytes_out == 0 && dropped == 0 && max_lag_ms == 0 {
                continue;
            }

            let severity = if dropped > 0 || max_lag_ms >= warn_threshold_ms { "warn" } else { "info" };
            tracing::info!(
                terminal_id = %record.id,
                bytes_in,
                bytes_out,
                dropped,
                max_lag_ms,
                perf_severity = severity,
                "terminal.perf",
            );
        }
    }
}

/// Drain PTY output into the scrollback buffer and fan it out to attached
/// clients (directly, or into their pending-snapshot queue), and observe
/// process exit.
fn spawn_output_pump(
    record: Arc<TerminalRecord>,
    mut output_rx: tokio::sync::mpsc::Receiver<Bytes>,
    exit_rx: tokio::sync::oneshot::Receiver<crate::pty::PtyExitStatus>,
    max_pending_snapshot_chars: usize,
) {
    tokio::spawn(async move {
        tokio::pin!(exit_rx);
        loop {
            tokio::select! {
                chunk = output_rx.recv() => {
                    match chunk {
                        Some(bytes) => handle_output_chunk(&record, bytes, max_pending_snapshot_chars).await,
                        None => break,
                    }
                }
                status = &mut exit_rx => {
                    let exit_code = status.ok().and_then(|s| s.code);
                    if record.mark_exited(exit_code).await {
                        record.clients.write().await.clear();
                        record.pending_snapshots.write().await.clear();
                        let _ = record.output_tx.send(TerminalOutput::Exit { exit_code });
                        tracing::info!(terminal_id = %record.id, ?exit_code, "terminal.exit");
                    }
                    break;
                }
            }
        }
    });
}

async fn handle_output_chunk(record: &Arc<TerminalRecord>, bytes: Bytes, max_pending_snapshot_chars: usize) {
    let text = String::from_utf8_lossy(&bytes).into_owned();
    record.touch_activity().await;
    record.bytes_out.fetch_add(bytes.len() as u64, Ordering::Relaxed);
    record.resolve_input_lag().await;
    record.scrollback.write().await.append(text.clone());

    let clients: Vec<ConnectionId> = record.clients.read().await.iter().copied().collect();
    let mut overflowed = Vec::new();
    {
        let mut pending = record.pending_snapshots.write().await;
        for client in &clients {
            if let Some(queue) = pending.get_mut(client) {
                queue.queued_chars += text.chars().count();
                queue.chunks.push(text.clone());
                if queue.queued_chars > max_pending_snapshot_chars {
                    overflowed.push(*client);
                }
            }
        }
        for client in &overflowed {
            pending.remove(client);
        }
    }
    if !overflowed.is_empty() {
        let mut clients = record.clients.write().await;
        for client in &overflowed {
            clients.remove(client);
        }
        record.dropped_messages.fetch_add(overflowed.len() as u64, Ordering::Relaxed);
        for client in &overflowed {
            // The output pump has no handle to this client's WebSocket sink;
            // the client's own forwarder task holds it and closes on this signal.
            let _ = record.kick_tx.send(*client);
        }
    }

    let _ = record.output_tx.send(TerminalOutput::Data(text));
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
