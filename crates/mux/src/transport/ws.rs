// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-endpoint WebSocket session handler: `hello` handshake, then
//! dispatch of `terminal.*` messages against the shared registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backpressure::{safe_send, wait_for_drain, ConnSink, SendOutcome};
use crate::error::{close_code, ErrorCode};
use crate::registry::{CreateError, CreateOptions, TerminalId, TerminalOutput};
use crate::spawn::{Mode, ShellKind};
use crate::state::AppState;
use crate::transport::auth;
use crate::transport::ws_msg::{ws_error, ws_error_for_request, ClientMessage, ServerMessage};

/// `GET /ws` — single upgrade route for the whole wire protocol.
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let origin = headers.get("origin").and_then(|v| v.to_str().ok());
    if !auth::origin_allowed(origin, &state.config.allowed_origins) {
        return axum::http::StatusCode::FORBIDDEN.into_response();
    }

    // Reserve the slot before upgrading, but defer rejection to a proper WS
    // close frame (4003) rather than an HTTP status — a client that already
    // negotiated the upgrade expects a close frame, not a bare status code.
    let guard = state.try_acquire_connection();

    ws.on_upgrade(move |socket| async move {
        let Some(guard) = guard else {
            let (mut sink, _) = socket.split();
            let _ = sink.send(close_with(close_code::TOO_MANY_CONNECTIONS, "Too many connections")).await;
            return;
        };
        let connection_id = guard.id();
        handle_ws(socket, state, connection_id).await;
        drop(guard);
    })
    .into_response()
}

fn close_with(code: u16, reason: &'static str) -> Message {
    Message::Close(Some(CloseFrame { code, reason: reason.into() }))
}

/// Per-connection bookkeeping that outlives any single `terminal.attach`:
/// a monotonic generation counter, and a lock per terminal this connection
/// has attached to, so two snapshot deliveries for the same terminal can
/// never interleave their `start`/`chunk*`/`end` frames on the wire.
struct ConnectionState {
    generation: AtomicU64,
    stream_locks: Mutex<HashMap<TerminalId, Arc<Mutex<()>>>>,
}

impl ConnectionState {
    fn new() -> Self {
        Self { generation: AtomicU64::new(0), stream_locks: Mutex::new(HashMap::new()) }
    }

    /// Bump and return this connection's generation. Later attaches to the
    /// same terminal observe a higher value, letting an in-flight, now-stale
    /// snapshot delivery notice it's been superseded and cut itself short.
    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    async fn stream_lock(&self, terminal_id: &TerminalId) -> Arc<Mutex<()>> {
        let mut locks = self.stream_locks.lock().await;
        Arc::clone(locks.entry(terminal_id.clone()).or_insert_with(|| Arc::new(Mutex::new(()))))
    }
}

/// Per-connection handler: owns the handshake state machine and the dispatch
/// loop for every message type in the wire protocol.
async fn handle_ws(socket: WebSocket, state: Arc<AppState>, connection_id: u64) {
    let (sink, mut stream) = socket.split();
    let conn = Arc::new(ConnSink::new(sink));
    let conn_state = Arc::new(ConnectionState::new());

    if !authenticate(&mut stream, &conn, &state).await {
        return;
    }

    let _ =
        safe_send(&conn, to_message(&ServerMessage::Ready {}), state.config.max_ws_buffered_amount, None).await;

    let mut created_by_request: HashMap<String, TerminalId> = HashMap::new();
    let mut forwarders: HashMap<TerminalId, JoinHandle<()>> = HashMap::new();

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => break,
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if !dispatch(
                            &text,
                            &state,
                            &conn,
                            &conn_state,
                            connection_id,
                            &mut created_by_request,
                            &mut forwarders,
                        ).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    for (_, handle) in forwarders.drain() {
        handle.abort();
    }
    state.registry.detach_all(connection_id).await;
}

/// Wait for a `hello` message within the configured timeout and validate its
/// token. Returns `true` if the connection should proceed to dispatch.
async fn authenticate(
    stream: &mut (impl StreamExt<Item = Result<Message, axum::Error>> + Unpin),
    conn: &ConnSink,
    state: &Arc<AppState>,
) -> bool {
    let hello = tokio::time::timeout(state.config.hello_timeout(), stream.next()).await;
    let text = match hello {
        Ok(Some(Ok(Message::Text(text)))) => text,
        _ => {
            conn.close(close_code::AUTH_FAILED, "hello timeout").await;
            return false;
        }
    };

    let Ok(ClientMessage::Hello { token, .. }) = serde_json::from_str::<ClientMessage>(&text) else {
        conn.close(close_code::AUTH_FAILED, "expected hello").await;
        return false;
    };

    if !auth::validate_token(&token, state.config.auth_token.as_deref()) {
        conn.close(close_code::AUTH_FAILED, "invalid token").await;
        return false;
    }

    true
}

fn to_message(msg: &ServerMessage) -> Message {
    Message::Text(serde_json::to_string(msg).unwrap_or_default().into())
}

/// Handle one post-auth client message. Returns `false` if the connection
/// should close.
async fn dispatch(
    text: &str,
    state: &Arc<AppState>,
    sink: &Arc<ConnSink>,
    conn_state: &Arc<ConnectionState>,
    connection_id: u64,
    created_by_request: &mut HashMap<String, TerminalId>,
    forwarders: &mut HashMap<TerminalId, JoinHandle<()>>,
) -> bool {
    let max_buffered = state.config.max_ws_buffered_amount;
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            send(sink, max_buffered, ws_error(ErrorCode::InvalidMessage, e.to_string())).await;
            return true;
        }
    };

    match message {
        ClientMessage::Hello { .. } => {
            send(sink, max_buffered, ServerMessage::Ready {}).await;
        }
        ClientMessage::Ping {} => {
            send(sink, max_buffered, ServerMessage::Pong { timestamp: epoch_secs() }).await;
        }
        ClientMessage::TerminalCreate {
            request_id,
            mode,
            shell,
            cwd,
            cols,
            rows,
            resume_session_id,
            env_context,
            permission_mode,
        } => {
            if let Some(existing) = created_by_request.get(&request_id) {
                send(
                    sink,
                    max_buffered,
                    ServerMessage::TerminalCreated {
                        request_id,
                        terminal_id: existing.clone(),
                        snapshot: None,
                        snapshot_chunked: None,
                        effective_resume_session_id: None,
                    },
                )
                .await;
                return true;
            }

            let Some(mode) = parse_mode(&mode) else {
                send(
                    sink,
                    max_buffered,
                    ws_error_for_request(ErrorCode::InvalidMessage, "unknown mode", request_id),
                )
                .await;
                return true;
            };
            let shell = shell.as_deref().map(parse_shell).unwrap_or(ShellKind::System);

            let opts = CreateOptions {
                mode,
                shell,
                cwd,
                resume_session_id,
                permission_mode,
                cols: cols.unwrap_or(80),
                rows: rows.unwrap_or(24),
                tab_id: env_context.as_ref().and_then(|c| c.tab_id.clone()),
                pane_id: env_context.as_ref().and_then(|c| c.pane_id.clone()),
            };

            match state.registry.create(opts).await {
                Ok(outcome) => {
                    created_by_request.insert(request_id.clone(), outcome.record.id.clone());
                    send(
                        sink,
                        max_buffered,
                        ServerMessage::TerminalCreated {
                            request_id,
                            terminal_id: outcome.record.id.clone(),
                            snapshot: None,
                            snapshot_chunked: None,
                            effective_resume_session_id: if outcome.reused {
                                outcome.record.resume_session_id.clone()
                            } else {
                                None
                            },
                        },
                    )
                    .await;
                }
                Err(CreateError::MaxTerminalsReached) => {
                    send(
                        sink,
                        max_buffered,
                        ws_error_for_request(ErrorCode::MaxTerminalsReached, "too many terminals", request_id),
                    )
                    .await;
                }
                Err(CreateError::InvalidResumeSessionId) => {
                    send(
                        sink,
                        max_buffered,
                        ws_error_for_request(ErrorCode::InvalidMessage, "invalid resume session id", request_id),
                    )
                    .await;
                }
                Err(CreateError::SpawnFailed) => {
                    send(
                        sink,
                        max_buffered,
                        ws_error_for_request(ErrorCode::Internal, "failed to spawn terminal", request_id),
                    )
                    .await;
                }
            }
        }
        ClientMessage::TerminalAttach { terminal_id } => {
            handle_attach(state, sink, conn_state, connection_id, terminal_id, forwarders).await;
        }
        ClientMessage::TerminalDetach { terminal_id } => {
            state.registry.detach(&terminal_id, connection_id).await;
            if let Some(handle) = forwarders.remove(&terminal_id) {
                handle.abort();
            }
        }
        ClientMessage::TerminalInput { terminal_id, data } => {
            if !state.registry.input(&terminal_id, bytes::Bytes::from(data.into_bytes())).await {
                send(
                    sink,
                    max_buffered,
                    ws_error(ErrorCode::InvalidTerminalId, "terminal not found or not running"),
                )
                .await;
            }
        }
        ClientMessage::TerminalResize { terminal_id, cols, rows } => {
            state.registry.resize(&terminal_id, cols, rows).await;
        }
        ClientMessage::TerminalKill { terminal_id } => {
            state.registry.kill(&terminal_id).await;
            if let Some(handle) = forwarders.remove(&terminal_id) {
                handle.abort();
            }
        }
        ClientMessage::TerminalList { request_id } => {
            let terminals = state.registry.list().await;
            send(sink, max_buffered, ServerMessage::TerminalListResponse { request_id, terminals }).await;
        }
    }

    true
}

fn parse_mode(raw: &str) -> Option<Mode> {
    match raw {
        "shell" => Some(Mode::Shell),
        "claude" => Some(Mode::Claude),
        "codex" => Some(Mode::Codex),
        "opencode" => Some(Mode::OpenCode),
        "gemini" => Some(Mode::Gemini),
        "kimi" => Some(Mode::Kimi),
        _ => None,
    }
}

fn parse_shell(raw: &str) -> ShellKind {
    match raw {
        "cmd" => ShellKind::Cmd,
        "powershell" => ShellKind::PowerShell,
        "wsl" => ShellKind::Wsl,
        _ => ShellKind::System,
    }
}

async fn send(sink: &ConnSink, max_buffered: usize, msg: ServerMessage) -> SendOutcome {
    safe_send(sink, to_message(&msg), max_buffered, None).await
}

/// Attach a client to a terminal: flush its historical scrollback (chunked if
/// large), flush anything queued during the attach window, then spawn a task
/// that forwards further broadcast output live.
async fn handle_attach(
    state: &Arc<AppState>,
    sink: &Arc<ConnSink>,
    conn_state: &Arc<ConnectionState>,
    connection_id: u64,
    terminal_id: TerminalId,
    forwarders: &mut HashMap<TerminalId, JoinHandle<()>>,
) {
    let max_buffered = state.config.max_ws_buffered_amount;
    let Some(record) = state.registry.attach(&terminal_id, connection_id, true).await else {
        send(sink, max_buffered, ws_error(ErrorCode::InvalidTerminalId, "terminal not found")).await;
        return;
    };

    // Serialize the snapshot bracket against any other attach/reattach this
    // connection performs for the same terminal, and mark this attempt with
    // the connection's current generation so a superseding attach can cut a
    // slow, stale chunk delivery short instead of letting two brackets
    // interleave on the wire.
    let my_generation = conn_state.next_generation();
    let stream_lock = conn_state.stream_lock(&terminal_id).await;
    let serialize_guard = stream_lock.lock().await;
    let cancel = CancellationToken::new();

    let mut output_rx = record.output_tx.subscribe();
    let mut kick_rx = record.kick_tx.subscribe();
    let snapshot = record.scrollback.read().await.snapshot();

    if snapshot.len() <= state.config.max_ws_chunk_bytes {
        safe_send(
            sink,
            to_message(&ServerMessage::TerminalAttached { terminal_id: terminal_id.clone(), snapshot }),
            max_buffered,
            Some(&record.dropped_messages),
        )
        .await;
    } else {
        let chunks: Vec<String> = chunk_by_bytes(&snapshot, state.config.max_ws_chunk_bytes);
        let total_chunks = chunks.len();
        safe_send(
            sink,
            to_message(&ServerMessage::AttachedStart { terminal_id: terminal_id.clone(), total_chunks }),
            max_buffered,
            Some(&record.dropped_messages),
        )
        .await;
        for (index, data) in chunks.into_iter().enumerate() {
            if conn_state.current_generation() != my_generation {
                cancel.cancel();
                break;
            }
            safe_send(
                sink,
                to_message(&ServerMessage::AttachedChunk { terminal_id: terminal_id.clone(), index, data }),
                max_buffered,
                Some(&record.dropped_messages),
            )
            .await;
            wait_for_drain(
                || sink.buffered(),
                state.config.max_ws_chunk_bytes,
                state.config.attach_drain_timeout(),
                &cancel,
            )
            .await;
        }
        safe_send(
            sink,
            to_message(&ServerMessage::AttachedEnd { terminal_id: terminal_id.clone() }),
            max_buffered,
            Some(&record.dropped_messages),
        )
        .await;
    }

    let flushed = state.registry.finish_attach_snapshot(&terminal_id, connection_id).await;
    // These chunks were queued into the pending-snapshot queue and
    // broadcast on `output_tx` by the same call in the output pump; since
    // we've been subscribed to `output_tx` since before this flush, the
    // broadcast backlog replays the same chunks next. Skip exactly this
    // many `Data` messages once the live forwarder takes over.
    let skip_data_count = flushed.len();
    for data in flushed {
        safe_send(
            sink,
            to_message(&ServerMessage::TerminalOutput { terminal_id: terminal_id.clone(), data }),
            max_buffered,
            Some(&record.dropped_messages),
        )
        .await;
    }
    drop(serialize_guard);

    let forwarder_sink = Arc::clone(sink);
    let forwarder_id = terminal_id.clone();
    let forwarder_record = Arc::clone(&record);
    let handle = tokio::spawn(async move {
        let mut skip_remaining = skip_data_count;
        loop {
            tokio::select! {
                kicked = kick_rx.recv() => {
                    match kicked {
                        Ok(id) if id == connection_id => {
                            forwarder_sink
                                .close(close_code::BACKPRESSURE, "Attach snapshot queue overflow")
                                .await;
                            break;
                        }
                        Ok(_) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
                output = output_rx.recv() => {
                    match output {
                        Ok(TerminalOutput::Data(data)) => {
                            if skip_remaining > 0 {
                                skip_remaining -= 1;
                                continue;
                            }
                            let msg = ServerMessage::TerminalOutput { terminal_id: forwarder_id.clone(), data };
                            let outcome = safe_send(
                                &forwarder_sink,
                                to_message(&msg),
                                max_buffered,
                                Some(&forwarder_record.dropped_messages),
                            )
                            .await;
                            if outcome == SendOutcome::Dropped || outcome == SendOutcome::ConnectionClosed {
                                break;
                            }
                        }
                        Ok(TerminalOutput::Exit { exit_code }) => {
                            let msg = ServerMessage::TerminalExit { terminal_id: forwarder_id.clone(), exit_code };
                            let _ = safe_send(&forwarder_sink, to_message(&msg), max_buffered, None).await;
                            break;
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
    });
    forwarders.insert(terminal_id, handle);
}

fn chunk_by_bytes(text: &str, max_bytes: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if current.len() + ch.len_utf8() > max_bytes && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
