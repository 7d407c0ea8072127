// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backpressure gate for WebSocket sends: a client that can't keep up gets
//! its connection closed rather than left to grow an unbounded outbound
//! buffer.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::close_code;

/// Outcome of attempting to send a message to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    Dropped,
    ConnectionClosed,
}

/// A connection's outbound half, plus an approximate count of bytes still in
/// flight so `wait_for_drain` has something real to poll.
pub struct ConnSink {
    sink: Mutex<SplitSink<WebSocket, Message>>,
    buffered: AtomicUsize,
}

impl ConnSink {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self { sink: Mutex::new(sink), buffered: AtomicUsize::new(0) }
    }

    /// Approximate bytes queued for this connection that haven't finished
    /// sending yet.
    pub fn buffered(&self) -> usize {
        self.buffered.load(Ordering::Relaxed)
    }

    /// Close the connection directly, bypassing the size gate — used when an
    /// overflow is detected by the caller rather than at send time (e.g. a
    /// pending-snapshot queue overflow).
    pub async fn close(&self, code: u16, reason: &'static str) {
        let _ = self.sink.lock().await.send(Message::Close(Some(CloseFrame { code, reason: reason.into() }))).await;
    }
}

/// Send `message` unless the socket's outbound buffer is already over
/// `max_buffered_amount`. On overflow the message is dropped, the socket is
/// closed with 4008, and `dropped_messages` — when given; most connection
/// control messages aren't attributed to any one terminal — is incremented.
pub async fn safe_send(
    conn: &ConnSink,
    message: Message,
    max_buffered_amount: usize,
    dropped_messages: Option<&AtomicU64>,
) -> SendOutcome {
    let size = estimate_buffered(&message);
    if size > max_buffered_amount {
        if let Some(counter) = dropped_messages {
            counter.fetch_add(1, Ordering::Relaxed);
        }
        conn.close(close_code::BACKPRESSURE, "Backpressure").await;
        return SendOutcome::Dropped;
    }

    conn.buffered.fetch_add(size, Ordering::Relaxed);
    let result = conn.sink.lock().await.send(message).await;
    conn.buffered.fetch_sub(size, Ordering::Relaxed);
    match result {
        Ok(()) => SendOutcome::Sent,
        Err(_) => SendOutcome::ConnectionClosed,
    }
}

/// `axum`'s `WebSocket` doesn't expose its OS write-buffer depth, so we
/// approximate "is this client keeping up" with the size of the message
/// about to be queued; a genuinely backed-up client accumulates messages
/// faster than this check can catch any single one, so combine with
/// `wait_for_drain` at the call site for the real gate.
fn estimate_buffered(message: &Message) -> usize {
    match message {
        Message::Text(text) => text.len(),
        Message::Binary(data) => data.len(),
        _ => 0,
    }
}

/// Poll until the outbound buffer drains below `threshold`, the `timeout`
/// elapses, or `should_cancel` fires — whichever comes first.
///
/// Returns `true` if the caller should proceed (drained or no real signal to
/// wait on), `false` if the wait was cut short by cancellation.
pub async fn wait_for_drain(
    current_buffered: impl Fn() -> usize,
    threshold: usize,
    timeout: Duration,
    should_cancel: &CancellationToken,
) -> bool {
    if current_buffered() <= threshold {
        return true;
    }
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);
    loop {
        if current_buffered() <= threshold {
            return true;
        }
        tokio::select! {
            _ = should_cancel.cancelled() => return false,
            _ = &mut deadline => return false,
            _ = tokio::time::sleep(Duration::from_millis(20)) => {}
        }
    }
}

#[cfg(test)]
#[path = "backpressure_tests.rs"]
mod tests;
