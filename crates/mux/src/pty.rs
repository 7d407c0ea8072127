// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Native PTY process wrapper built on `portable-pty`.
//!
//! `portable-pty`'s I/O is synchronous, so each process gets two dedicated OS
//! threads (reader, writer) that bridge to async channels consumed by the
//! registry's per-terminal task.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use tokio::sync::{mpsc, oneshot};

use crate::spawn::SpawnSpec;

/// Exit status reported once the child process has terminated.
#[derive(Debug, Clone, Copy)]
pub struct PtyExitStatus {
    pub code: Option<i32>,
}

/// A running PTY-backed child process.
pub struct PtyProcess {
    writer_tx: mpsc::UnboundedSender<Bytes>,
    master: Arc<Mutex<Box<dyn MasterPty + Send>>>,
    child: Arc<Mutex<Box<dyn Child + Send + Sync>>>,
    pid: Option<u32>,
}

impl PtyProcess {
    /// Spawn the process described by `spec` inside a new PTY of the given size.
    ///
    /// Returns the handle, a channel of output chunks, and a one-shot that
    /// resolves when the process exits.
    pub fn spawn(
        spec: &SpawnSpec,
        cols: u16,
        rows: u16,
    ) -> anyhow::Result<(Self, mpsc::Receiver<Bytes>, oneshot::Receiver<PtyExitStatus>)> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize { rows, cols, pixel_width: 0, pixel_height: 0 })
            .map_err(|e| anyhow::anyhow!("pty allocation failed: {e}"))?;

        let mut command = CommandBuilder::new(&spec.executable);
        for arg in &spec.args {
            command.arg(arg);
        }
        if let Some(ref cwd) = spec.cwd {
            command.cwd(cwd);
        }
        command.env_clear();
        for (k, v) in &spec.env {
            command.env(k, v);
        }

        let child = pair
            .slave
            .spawn_command(command)
            .map_err(|e| anyhow::anyhow!("pty spawn failed: {e}"))?;
        let pid = child.process_id();
        drop(pair.slave);

        let (output_tx, output_rx) = mpsc::channel::<Bytes>(256);
        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| anyhow::anyhow!("pty reader clone failed: {e}"))?;
        std::thread::spawn(move || {
            use std::io::Read;
            let mut buf = [0u8; 8192];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if output_tx.blocking_send(Bytes::copy_from_slice(&buf[..n])).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });

        let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<Bytes>();
        let mut writer = pair
            .master
            .take_writer()
            .map_err(|e| anyhow::anyhow!("pty writer take failed: {e}"))?;
        std::thread::spawn(move || {
            use std::io::Write;
            while let Some(data) = writer_rx.blocking_recv() {
                if writer.write_all(&data).is_err() {
                    break;
                }
                let _ = writer.flush();
            }
        });

        let child = Arc::new(Mutex::new(child));
        let master = Arc::new(Mutex::new(pair.master));

        let (exit_tx, exit_rx) = oneshot::channel();
        let wait_child = Arc::clone(&child);
        std::thread::spawn(move || {
            let status = loop {
                let mut guard = match wait_child.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                match guard.try_wait() {
                    Ok(Some(status)) => break status,
                    Ok(None) => {
                        drop(guard);
                        std::thread::sleep(std::time::Duration::from_millis(50));
                    }
                    Err(_) => break portable_pty::ExitStatus::with_exit_code(1),
                }
            };
            let code = if status.success() { Some(0) } else { Some(1) };
            let _ = exit_tx.send(PtyExitStatus { code });
        });

        Ok((Self { writer_tx, master, child, pid }, output_rx, exit_rx))
    }

    pub fn write(&self, data: Bytes) -> bool {
        self.writer_tx.send(data).is_ok()
    }

    pub fn resize(&self, cols: u16, rows: u16) -> bool {
        let guard = match self.master.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.resize(PtySize { rows, cols, pixel_width: 0, pixel_height: 0 }).is_ok()
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Ask the child to terminate gracefully. On Unix this sends SIGHUP to
    /// the process; other platforms fall back to `kill`.
    #[cfg(unix)]
    pub fn terminate(&self) {
        if let Some(pid) = self.pid {
            let _ = nix::sys::signal::kill(
                nix::unistd::Pid::from_raw(pid as i32),
                nix::sys::signal::Signal::SIGHUP,
            );
        }
    }

    #[cfg(not(unix))]
    pub fn terminate(&self) {
        self.kill();
    }

    /// Forcibly terminate the child (SIGKILL on Unix, `TerminateProcess` on Windows).
    pub fn kill(&self) {
        let mut guard = match self.child.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = guard.kill();
    }

    pub fn is_alive(&self) -> bool {
        let mut guard = match self.child.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        matches!(guard.try_wait(), Ok(None))
    }
}
