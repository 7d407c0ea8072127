// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket message types and conversions.

use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::registry::TerminalDescriptor;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Hello {
        token: String,
        #[serde(default)]
        capabilities: HelloCapabilities,
    },
    Ping {},
    #[serde(rename = "terminal.create")]
    TerminalCreate {
        request_id: String,
        mode: String,
        #[serde(default)]
        shell: Option<String>,
        #[serde(default)]
        cwd: Option<String>,
        #[serde(default)]
        cols: Option<u16>,
        #[serde(default)]
        rows: Option<u16>,
        #[serde(default)]
        resume_session_id: Option<String>,
        #[serde(default)]
        env_context: Option<EnvContext>,
        #[serde(default)]
        permission_mode: Option<String>,
    },
    #[serde(rename = "terminal.attach")]
    TerminalAttach { terminal_id: String },
    #[serde(rename = "terminal.detach")]
    TerminalDetach { terminal_id: String },
    #[serde(rename = "terminal.input")]
    TerminalInput { terminal_id: String, data: String },
    #[serde(rename = "terminal.resize")]
    TerminalResize { terminal_id: String, cols: u16, rows: u16 },
    #[serde(rename = "terminal.kill")]
    TerminalKill { terminal_id: String },
    #[serde(rename = "terminal.list")]
    TerminalList { request_id: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HelloCapabilities {
    #[serde(default, rename = "sessionsPatchV1")]
    pub sessions_patch_v1: bool,
    #[serde(default, rename = "terminalAttachChunkV1")]
    pub terminal_attach_chunk_v1: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvContext {
    #[serde(default)]
    pub tab_id: Option<String>,
    #[serde(default)]
    pub pane_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Ready {},
    Pong {
        timestamp: u64,
    },
    #[serde(rename = "terminal.created")]
    TerminalCreated {
        request_id: String,
        terminal_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        snapshot: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        snapshot_chunked: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        effective_resume_session_id: Option<String>,
    },
    #[serde(rename = "terminal.attached")]
    TerminalAttached {
        terminal_id: String,
        snapshot: String,
    },
    #[serde(rename = "attached.start")]
    AttachedStart {
        terminal_id: String,
        total_chunks: usize,
    },
    #[serde(rename = "attached.chunk")]
    AttachedChunk {
        terminal_id: String,
        index: usize,
        data: String,
    },
    #[serde(rename = "attached.end")]
    AttachedEnd {
        terminal_id: String,
    },
    #[serde(rename = "terminal.output")]
    TerminalOutput {
        terminal_id: String,
        data: String,
    },
    #[serde(rename = "terminal.exit")]
    TerminalExit {
        terminal_id: String,
        exit_code: Option<i32>,
    },
    #[serde(rename = "terminal.list.response")]
    TerminalListResponse {
        request_id: String,
        terminals: Vec<TerminalDescriptor>,
    },
    #[serde(rename = "terminal.list.updated")]
    TerminalListUpdated {},
    Error {
        code: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
}

/// Build a WebSocket error message.
pub fn ws_error(code: ErrorCode, message: impl Into<String>) -> ServerMessage {
    ServerMessage::Error { code: code.as_str().to_owned(), message: message.into(), request_id: None }
}

pub fn ws_error_for_request(
    code: ErrorCode,
    message: impl Into<String>,
    request_id: impl Into<String>,
) -> ServerMessage {
    ServerMessage::Error {
        code: code.as_str().to_owned(),
        message: message.into(),
        request_id: Some(request_id.into()),
    }
}

#[cfg(test)]
#[path = "ws_msg_tests.rs"]
mod tests;
