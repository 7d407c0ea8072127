// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Provider dispatch table: one entry per supported CLI agent.
//!
//! Mirrors the closed-enum-plus-lookup-table shape used for dispatching on
//! agent identity elsewhere in this codebase, adapted here for spawn-argument
//! construction rather than output-state detection.

use uuid::Uuid;

use crate::config::Config;

/// Terminal mode: a plain shell, or one of a closed set of CLI agent providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Shell,
    Claude,
    Codex,
    OpenCode,
    Gemini,
    Kimi,
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Shell => "shell",
            Self::Claude => "claude",
            Self::Codex => "codex",
            Self::OpenCode => "opencode",
            Self::Gemini => "gemini",
            Self::Kimi => "kimi",
        }
    }

    /// Whether a resume session id for this mode must be a well-formed UUID.
    pub fn requires_uuid_session_id(&self) -> bool {
        matches!(self, Self::Claude)
    }

    fn default_executable(&self) -> &'static str {
        match self {
            Self::Shell => "",
            Self::Claude => "claude",
            Self::Codex => "codex",
            Self::OpenCode => "opencode",
            Self::Gemini => "gemini",
            Self::Kimi => "kimi",
        }
    }

    fn override_from_config<'a>(&self, config: &'a Config) -> Option<&'a str> {
        match self {
            Self::Shell => None,
            Self::Claude => config.claude_cmd.as_deref(),
            Self::Codex => config.codex_cmd.as_deref(),
            Self::OpenCode => config.opencode_cmd.as_deref(),
            Self::Gemini => config.gemini_cmd.as_deref(),
            Self::Kimi => config.kimi_cmd.as_deref(),
        }
    }

    /// Resolve the executable to launch for this provider, honoring a config override.
    pub fn executable(&self, config: &Config) -> String {
        self.override_from_config(config).unwrap_or_else(|| self.default_executable()).to_owned()
    }

    /// Build resume-session arguments, if this provider supports resuming.
    /// Returns `None` when the provider has no resume concept (request is
    /// logged and ignored by the caller).
    pub fn resume_args(&self, session_id: &str) -> Option<Vec<String>> {
        match self {
            Self::Claude => Some(vec!["--resume".to_owned(), session_id.to_owned()]),
            Self::Codex => Some(vec!["resume".to_owned(), session_id.to_owned()]),
            Self::Gemini | Self::OpenCode | Self::Kimi | Self::Shell => None,
        }
    }

    /// Extra fixed arguments for a non-resume launch of this provider, applied
    /// when a non-default permission mode is requested (currently Claude-only).
    pub fn permission_mode_args(&self, permission_mode: Option<&str>) -> Vec<String> {
        match (self, permission_mode) {
            (Self::Claude, Some(mode)) if mode != "default" => {
                vec!["--permission-mode".to_owned(), mode.to_owned()]
            }
            _ => vec![],
        }
    }
}

/// Validate and normalize a resume session id for the given mode.
///
/// Returns `Err` if the mode requires a UUID-shaped id and the given string
/// does not parse as one.
pub fn normalize_resume_session_id(mode: Mode, session_id: Option<&str>) -> Result<Option<String>, String> {
    let Some(id) = session_id else { return Ok(None) };
    if id.is_empty() {
        return Ok(None);
    }
    if mode.requires_uuid_session_id() && Uuid::parse_str(id).is_err() {
        return Err(format!("{} requires a UUID resume session id, got {id:?}", mode.label()));
    }
    Ok(Some(id.to_owned()))
}

#[cfg(test)]
#[path = "providers_tests.rs"]
mod tests;
