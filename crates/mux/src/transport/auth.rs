// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token validation for the WebSocket `hello` handshake.

/// Constant-time string comparison to prevent timing side-channel attacks.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

/// Validate the token presented in a `hello` message against the configured
/// token. `expected = None` means auth is disabled (dev only) and any token
/// is accepted.
pub fn validate_token(presented: &str, expected: Option<&str>) -> bool {
    match expected {
        Some(expected) => constant_time_eq(presented, expected),
        None => true,
    }
}

/// Check an `Origin` header value against the configured allow-list.
/// A missing `Origin` (non-browser client) is always allowed — browsers are
/// the only clients that send it, and same-origin loopback tooling often
/// omits it entirely.
pub fn origin_allowed(origin: Option<&str>, allowed: &[String]) -> bool {
    let Some(origin) = origin else { return true };
    if allowed.is_empty() {
        return is_loopback_origin(origin);
    }
    allowed.iter().any(|a| a == origin) || is_loopback_origin(origin)
}

fn is_loopback_origin(origin: &str) -> bool {
    origin
        .split("://")
        .nth(1)
        .map(|rest| {
            let host = rest.split(':').next().unwrap_or(rest);
            host == "localhost" || host == "127.0.0.1" || host == "[::1]"
        })
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
