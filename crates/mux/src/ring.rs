// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded scrollback buffer for a single terminal.
//!
//! Unlike a byte-oriented ring keyed by a write offset, this buffer trims on
//! decoded `char` counts so multi-byte UTF-8 sequences are never split
//! mid-codepoint. Callers must hand `append` already-decoded text; PTY output
//! handlers perform lossy UTF-8 decoding before reaching this buffer.

use std::collections::VecDeque;

/// A FIFO of text chunks bounded by total character count.
#[derive(Debug, Default)]
pub struct ChunkRingBuffer {
    chunks: VecDeque<String>,
    total_chars: usize,
    max_chars: usize,
}

impl ChunkRingBuffer {
    pub fn new(max_chars: usize) -> Self {
        Self { chunks: VecDeque::new(), total_chars: 0, max_chars }
    }

    /// Append a chunk, discarding the oldest chunks (or trimming the new one)
    /// to keep the total within `max_chars`.
    pub fn append(&mut self, chunk: impl Into<String>) {
        let mut chunk = chunk.into();
        if chunk.is_empty() || self.max_chars == 0 {
            return;
        }

        let chunk_len = chunk.chars().count();
        if chunk_len > self.max_chars {
            let skip = chunk_len - self.max_chars;
            chunk = chunk.chars().skip(skip).collect();
        }
        let chunk_len = chunk.chars().count();

        self.chunks.push_back(chunk);
        self.total_chars += chunk_len;
        self.trim_to_cap();
    }

    /// Change the retention cap. `n <= 0` clears the buffer entirely.
    pub fn set_max_chars(&mut self, n: usize) {
        self.max_chars = n;
        if n == 0 {
            self.clear();
        } else {
            self.trim_to_cap();
        }
    }

    /// Concatenate all retained chunks in order. Does not mutate.
    pub fn snapshot(&self) -> String {
        self.chunks.iter().map(String::as_str).collect()
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.total_chars = 0;
    }

    pub fn total_chars(&self) -> usize {
        self.total_chars
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    fn trim_to_cap(&mut self) {
        while self.total_chars > self.max_chars {
            let Some(front) = self.chunks.front() else { break };
            let front_len = front.chars().count();
            if self.total_chars - front_len >= self.max_chars {
                self.total_chars -= front_len;
                self.chunks.pop_front();
                continue;
            }
            // Oldest chunk is partially retained: keep its trailing slice.
            let keep = front_len - (self.total_chars - self.max_chars);
            let trimmed: String = front.chars().skip(front_len - keep).collect();
            self.total_chars -= front_len - keep;
            self.chunks.pop_front();
            self.chunks.push_front(trimmed);
        }
    }
}

#[cfg(test)]
#[path = "ring_tests.rs"]
mod tests;
