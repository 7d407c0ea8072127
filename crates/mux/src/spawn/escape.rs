// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Platform-specific argument escaping and path translation, kept as pure
//! functions so they stay unit-testable without touching a real shell.

/// Escape a single argument for `cmd.exe`, applying substitutions in the
/// fixed order the shell actually needs: caret first, then the characters
/// that would otherwise be interpreted by `cmd.exe` itself.
pub fn escape_cmd_exe(arg: &str) -> String {
    let mut out = String::with_capacity(arg.len());
    for ch in arg.chars() {
        match ch {
            '^' => out.push_str("^^"),
            '&' => out.push_str("^&"),
            '|' => out.push_str("^|"),
            '<' => out.push_str("^<"),
            '>' => out.push_str("^>"),
            '%' => out.push_str("%%"),
            '"' => out.push_str("\\\""),
            other => out.push(other),
        }
    }
    out
}

/// Quote a literal for PowerShell using its backtick escape rule, wrapped in
/// single quotes for the common case and doubled single-quotes when the
/// literal itself contains one (PowerShell's single-quote-literal escape).
pub fn quote_powershell(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', "''"))
}

/// Translate a Windows path (`C:\Users\me`) into its WSL mount-point form
/// (`/mnt/c/Users/me`) using the configured mount prefix (`/mnt` by default).
pub fn windows_path_to_wsl(path: &str, mount_prefix: &str) -> Option<String> {
    let mut chars = path.chars();
    let drive = chars.next()?;
    if !drive.is_ascii_alphabetic() {
        return None;
    }
    if chars.next()? != ':' {
        return None;
    }
    let rest = &path[2..];
    let rest = rest.replace('\\', "/");
    let rest = rest.trim_start_matches('/');
    let drive_lower = drive.to_ascii_lowercase();
    if rest.is_empty() {
        Some(format!("{mount_prefix}/{drive_lower}"))
    } else {
        Some(format!("{mount_prefix}/{drive_lower}/{rest}"))
    }
}

/// Is this a Unix-style absolute path (as opposed to a Windows drive path)?
pub fn is_unix_style_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//")
}

#[cfg(test)]
#[path = "escape_tests.rs"]
mod tests;
