// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawn spec resolver: a pure translation from a logical terminal request
//! into the concrete `(executable, args, cwd, env)` tuple for process
//! creation on the current host. Never touches the filesystem or process
//! table itself so it stays directly unit-testable.

pub mod escape;
pub mod providers;

use std::collections::HashMap;

pub use providers::{normalize_resume_session_id, Mode};

use crate::config::Config;

/// Env vars that exist for the server's own configuration and must never
/// leak into a spawned child's environment.
const RESERVED_ENV_KEYS: &[&str] = &["AUTH_TOKEN", "PORT", "VITE_PORT", "HOST", "ALLOWED_ORIGINS"];

/// Requested shell family for `shell`-mode terminals (or the host shell a
/// provider mode is launched under, on Windows).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellKind {
    System,
    Cmd,
    PowerShell,
    Wsl,
}

/// Static facts about the host, queried once at startup so the resolver
/// itself stays a pure function of its explicit inputs.
#[derive(Debug, Clone)]
pub struct HostInfo {
    pub is_windows: bool,
    pub is_wsl: bool,
    pub is_macos: bool,
    pub shell_env: Option<String>,
}

impl HostInfo {
    /// Inspect the real host: OS family plus a `/proc/version` sniff for WSL.
    pub fn detect() -> Self {
        let is_windows = cfg!(target_os = "windows");
        let is_macos = cfg!(target_os = "macos");
        let is_wsl = !is_windows
            && std::fs::read_to_string("/proc/version")
                .map(|v| v.to_ascii_lowercase().contains("microsoft"))
                .unwrap_or(false);
        let shell_env = std::env::var("SHELL").ok();
        Self { is_windows, is_wsl, is_macos, shell_env }
    }
}

/// Request to resolve into a spawn spec.
#[derive(Debug, Clone)]
pub struct SpawnRequest<'a> {
    pub mode: Mode,
    pub shell: ShellKind,
    pub cwd: Option<&'a str>,
    pub resume_session_id: Option<&'a str>,
    pub permission_mode: Option<&'a str>,
    pub tab_id: Option<&'a str>,
    pub pane_id: Option<&'a str>,
}

/// The resolved, immutable tuple handed to the process launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnSpec {
    pub executable: String,
    pub args: Vec<String>,
    pub cwd: Option<String>,
    pub env: HashMap<String, String>,
}

/// Build the child environment: copy the server env, strip server-only keys,
/// set `TERM`/`COLORTERM` if unset, inject tab/pane context, and (for provider
/// modes) the turn-complete stop-hook command.
fn build_env(
    config: &Config,
    host: &HostInfo,
    mode: Mode,
    server_env: &HashMap<String, String>,
    tab_id: Option<&str>,
    pane_id: Option<&str>,
) -> HashMap<String, String> {
    let mut env: HashMap<String, String> = server_env
        .iter()
        .filter(|(k, _)| !RESERVED_ENV_KEYS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    env.entry("TERM".to_owned()).or_insert_with(|| config.term.clone());
    env.entry("COLORTERM".to_owned()).or_insert_with(|| config.colorterm.clone());
    if let Some(tab_id) = tab_id {
        env.insert("FRESHELL_TAB_ID".to_owned(), tab_id.to_owned());
    }
    if let Some(pane_id) = pane_id {
        env.insert("FRESHELL_PANE_ID".to_owned(), pane_id.to_owned());
    }
    if mode != Mode::Shell {
        env.insert("FRESHELL_STOP_HOOK_CMD".to_owned(), stop_hook_command(host));
    }
    env
}

/// Bell-on-turn-complete stop-hook command, platform-appropriate: a provider
/// reads `FRESHELL_STOP_HOOK_CMD` from its environment and runs it when a
/// turn finishes. Unix and WSL shells get a BEL written straight to the
/// controlling tty; native Windows shells have no `/dev/tty`, so this rings
/// the console bell through PowerShell instead.
fn stop_hook_command(host: &HostInfo) -> String {
    if host.is_windows && !host.is_wsl {
        "powershell -NoProfile -Command \"[console]::beep(800,200)\"".to_owned()
    } else {
        "printf '\\a' > /dev/tty 2>/dev/null || true".to_owned()
    }
}

/// Normalize a requested shell against the detected host: collapse
/// Windows-only choices on non-Windows, non-WSL hosts, and vice versa.
fn normalize_shell(host: &HostInfo, requested: ShellKind) -> ShellKind {
    if host.is_windows {
        match requested {
            ShellKind::System => ShellKind::Cmd,
            other => other,
        }
    } else if host.is_wsl {
        match requested {
            ShellKind::System | ShellKind::Wsl => ShellKind::Wsl,
            other => other,
        }
    } else {
        ShellKind::System
    }
}

/// Resolve a unix shell executable using `$SHELL`, falling back to a
/// platform default, then `/bin/sh`.
fn resolve_unix_shell(host: &HostInfo) -> String {
    if let Some(ref shell) = host.shell_env {
        if !shell.is_empty() && std::path::Path::new(shell).exists() {
            return shell.clone();
        }
    }
    if host.is_macos {
        "/bin/zsh".to_owned()
    } else {
        "/bin/bash".to_owned()
    }
}

/// Build `(args, optional executable)` for a provider or shell launch, not
/// including the launching shell itself. `executable` is `Some` only for
/// `Mode::Shell`/provider modes that resolve directly (Unix, WSL); on native
/// Windows the caller wraps these tokens through cmd/PowerShell instead.
fn provider_invocation(config: &Config, req: &SpawnRequest<'_>) -> (String, Vec<String>) {
    match req.mode {
        Mode::Shell => (String::new(), vec!["-l".to_owned()]),
        mode => {
            let executable = mode.executable(config);
            let mut args = Vec::new();
            if let Some(session_id) = req.resume_session_id {
                if let Some(resume) = mode.resume_args(session_id) {
                    args.extend(resume);
                }
            } else {
                args.extend(mode.permission_mode_args(req.permission_mode));
            }
            (executable, args)
        }
    }
}

/// Resolve a logical spawn request into a concrete spec for the detected host.
pub fn resolve(
    config: &Config,
    host: &HostInfo,
    server_env: &HashMap<String, String>,
    req: &SpawnRequest<'_>,
) -> SpawnSpec {
    let env = build_env(config, host, req.mode, server_env, req.tab_id, req.pane_id);
    let resolved_shell = normalize_shell(host, req.shell);

    let wants_wsl = resolved_shell == ShellKind::Wsl
        || (host.is_windows && req.cwd.map(escape::is_unix_style_path).unwrap_or(false));

    if host.is_windows && wants_wsl {
        resolve_wsl(config, req, env)
    } else if host.is_windows {
        resolve_windows_native(config, req, resolved_shell, env)
    } else {
        // WSL (Linux-shell side) or plain Unix share the same resolution path.
        resolve_unix_like(config, host, req, env)
    }
}

fn resolve_wsl(config: &Config, req: &SpawnRequest<'_>, env: HashMap<String, String>) -> SpawnSpec {
    let mut args = Vec::new();
    if !config.wsl_distro.is_empty() {
        args.push("-d".to_owned());
        args.push(config.wsl_distro.clone());
    }
    if let Some(cwd) = req.cwd {
        let unix_cwd = if escape::is_unix_style_path(cwd) {
            Some(cwd.to_owned())
        } else {
            escape::windows_path_to_wsl(cwd, "/mnt")
        };
        if let Some(unix_cwd) = unix_cwd {
            args.push("--cd".to_owned());
            args.push(unix_cwd);
        }
    }
    let (executable, invocation_args) = match req.mode {
        Mode::Shell => (resolve_unix_shell(&HostInfo { is_windows: false, is_wsl: true, is_macos: false, shell_env: None }), vec!["-l".to_owned()]),
        _ => provider_invocation(config, req),
    };
    args.push("--".to_owned());
    args.push(executable);
    args.extend(invocation_args);
    SpawnSpec { executable: config.wsl_exe.clone(), args, cwd: None, env }
}

fn resolve_windows_native(
    config: &Config,
    req: &SpawnRequest<'_>,
    shell: ShellKind,
    env: HashMap<String, String>,
) -> SpawnSpec {
    let (executable, invocation_args) = match req.mode {
        Mode::Shell => (config.windows_shell.clone(), vec![]),
        _ => provider_invocation(config, req),
    };
    let mut tokens = vec![executable];
    tokens.extend(invocation_args);

    match shell {
        ShellKind::PowerShell => {
            let command =
                tokens.iter().map(|a| escape::quote_powershell(a)).collect::<Vec<_>>().join(" ");
            SpawnSpec {
                executable: config.powershell_exe.clone(),
                args: vec!["-NoLogo".to_owned(), "-Command".to_owned(), command],
                cwd: req.cwd.map(str::to_owned),
                env,
            }
        }
        _ => {
            let escaped: Vec<String> = tokens.iter().map(|a| escape::escape_cmd_exe(a)).collect();
            SpawnSpec {
                executable: "cmd.exe".to_owned(),
                args: vec!["/C".to_owned(), escaped.join(" ")],
                cwd: req.cwd.map(str::to_owned),
                env,
            }
        }
    }
}

fn resolve_unix_like(
    config: &Config,
    host: &HostInfo,
    req: &SpawnRequest<'_>,
    env: HashMap<String, String>,
) -> SpawnSpec {
    match req.mode {
        Mode::Shell => SpawnSpec {
            executable: resolve_unix_shell(host),
            args: vec!["-l".to_owned()],
            cwd: req.cwd.map(str::to_owned),
            env,
        },
        _ => {
            let (executable, args) = provider_invocation(config, req);
            SpawnSpec { executable, args, cwd: req.cwd.map(str::to_owned), env }
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
