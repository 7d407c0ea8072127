// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process configuration for the freeshell-mux server.

use clap::Parser;

/// Top-level process configuration, parsed from CLI flags with env fallbacks.
#[derive(Debug, Clone, Parser)]
#[command(name = "freeshell-mux", version, about)]
pub struct Config {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 7680, env = "PORT")]
    pub port: u16,

    /// Bearer/WS token clients must present. If unset, auth is disabled (dev only).
    #[arg(long, env = "AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// Comma-separated list of additional allowed `Origin` header values.
    #[arg(long, env = "ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,

    /// Milliseconds to wait for the post-upgrade `hello` message before closing.
    #[arg(long, default_value_t = 10_000, env = "HELLO_TIMEOUT_MS")]
    pub hello_timeout_ms: u64,

    /// Maximum concurrent WebSocket connections.
    #[arg(long, default_value_t = 100, env = "MAX_CONNECTIONS")]
    pub max_connections: usize,

    /// Maximum simultaneously Running terminals.
    #[arg(long, default_value_t = 50, env = "MAX_TERMINALS")]
    pub max_terminals: usize,

    /// Maximum retained Exited terminal records (FIFO eviction beyond this).
    #[arg(long, default_value_t = 200, env = "MAX_EXITED_TERMINALS")]
    pub max_exited_terminals: usize,

    /// Per-connection buffered-bytes threshold before a send is refused and
    /// the socket is closed with code 4008.
    #[arg(long, default_value_t = 2 * 1024 * 1024, env = "MAX_WS_BUFFERED_AMOUNT")]
    pub max_ws_buffered_amount: usize,

    /// Maximum bytes per `attached.chunk` frame before a snapshot is split further.
    #[arg(long, default_value_t = 500 * 1024, env = "MAX_WS_CHUNK_BYTES")]
    pub max_ws_chunk_bytes: usize,

    /// Milliseconds to wait for the outbound buffer to drain between
    /// `attached.chunk` frames before sending the next one regardless.
    #[arg(long, default_value_t = 2_000, env = "ATTACH_DRAIN_TIMEOUT_MS")]
    pub attach_drain_timeout_ms: u64,

    /// Maximum characters queued per client while an attach snapshot is pending.
    #[arg(long, default_value_t = 512 * 1024, env = "MAX_PENDING_SNAPSHOT_CHARS")]
    pub max_pending_snapshot_chars: usize,

    /// Default scrollback cap in characters for newly created terminals.
    #[arg(long, default_value_t = 64 * 1024, env = "MAX_SCROLLBACK_CHARS")]
    pub max_scrollback_chars: usize,

    /// Minutes of zero-client idleness before a running terminal is killed.
    /// `0` disables idle eviction.
    #[arg(long, default_value_t = 0, env = "AUTO_KILL_IDLE_MINUTES")]
    pub auto_kill_idle_minutes: u64,

    /// Minutes before the idle kill to emit a one-shot warning. Must be less
    /// than `auto_kill_idle_minutes` when idle eviction is enabled.
    #[arg(long, default_value_t = 0, env = "WARN_BEFORE_KILL_MINUTES")]
    pub warn_before_kill_minutes: u64,

    /// Timeout for graceful shutdown drain before force-killing survivors.
    #[arg(long, default_value_t = 5_000, env = "SHUTDOWN_TIMEOUT_MS")]
    pub shutdown_timeout_ms: u64,

    /// Seconds between perf-counter sweeps. `0` disables the perf monitor.
    #[arg(long, default_value_t = 60, env = "PERF_MONITOR_INTERVAL_SECONDS")]
    pub perf_monitor_interval_seconds: u64,

    /// Input-to-output lag, in milliseconds, above which a sweep logs at `perf_severity="warn"`.
    #[arg(long, default_value_t = 2_000, env = "PERF_LAG_WARN_MS")]
    pub perf_lag_warn_ms: u64,

    /// Shell to use for native Windows terminals: `cmd` or `powershell`.
    #[arg(long, default_value = "cmd", env = "WINDOWS_SHELL")]
    pub windows_shell: String,

    /// Path to `wsl.exe`.
    #[arg(long, default_value = "wsl.exe", env = "WSL_EXE")]
    pub wsl_exe: String,

    /// WSL distro name to target; empty uses the default distro.
    #[arg(long, default_value = "", env = "WSL_DISTRO")]
    pub wsl_distro: String,

    /// Path to the Windows `System32` directory, used to derive the WSL mount prefix.
    #[arg(long, env = "WSL_WINDOWS_SYS32")]
    pub wsl_windows_sys32: Option<String>,

    /// Path to `powershell.exe`.
    #[arg(long, default_value = "powershell.exe", env = "POWERSHELL_EXE")]
    pub powershell_exe: String,

    /// Override executable for the Claude provider mode.
    #[arg(long, env = "CLAUDE_CMD")]
    pub claude_cmd: Option<String>,

    /// Override executable for the Codex provider mode.
    #[arg(long, env = "CODEX_CMD")]
    pub codex_cmd: Option<String>,

    /// Override executable for the OpenCode provider mode.
    #[arg(long, env = "OPENCODE_CMD")]
    pub opencode_cmd: Option<String>,

    /// Override executable for the Gemini provider mode.
    #[arg(long, env = "GEMINI_CMD")]
    pub gemini_cmd: Option<String>,

    /// Override executable for the Kimi provider mode.
    #[arg(long, env = "KIMI_CMD")]
    pub kimi_cmd: Option<String>,

    /// `TERM` to set for spawned PTYs if unset in the server environment.
    #[arg(long, default_value = "xterm-256color", env = "TERM_OVERRIDE")]
    pub term: String,

    /// `COLORTERM` to set for spawned PTYs if unset in the server environment.
    #[arg(long, default_value = "truecolor", env = "COLORTERM_OVERRIDE")]
    pub colorterm: String,

    /// Log output format: `text` or `json`.
    #[arg(long, default_value = "text", env = "LOG_FORMAT")]
    pub log_format: String,

    /// `tracing_subscriber::EnvFilter` directive string, e.g. `info` or `freeshell_mux=debug`.
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,
}

impl Config {
    /// Cross-field validation that cannot be expressed with `clap` attributes alone.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.auto_kill_idle_minutes > 0 && self.warn_before_kill_minutes > 0 {
            anyhow::ensure!(
                self.warn_before_kill_minutes < self.auto_kill_idle_minutes,
                "warn-before-kill-minutes ({}) must be less than auto-kill-idle-minutes ({})",
                self.warn_before_kill_minutes,
                self.auto_kill_idle_minutes,
            );
        }
        anyhow::ensure!(
            matches!(self.windows_shell.as_str(), "cmd" | "powershell"),
            "windows-shell must be \"cmd\" or \"powershell\", got {:?}",
            self.windows_shell,
        );
        anyhow::ensure!(
            matches!(self.log_format.as_str(), "text" | "json"),
            "log-format must be \"text\" or \"json\", got {:?}",
            self.log_format,
        );
        Ok(())
    }

    pub fn hello_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.hello_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn attach_drain_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.attach_drain_timeout_ms)
    }

    /// Build a `Config` with all defaults, for use by other modules' tests.
    #[cfg(test)]
    pub fn parse_test() -> Config {
        Config::parse_from(["freeshell-mux"])
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
