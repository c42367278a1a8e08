// src/exec/child_runner.rs

//! Owns the long-running child started after a successful build.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::SupervisorEvent;
use crate::errors::{Result, SupervisorError};
use crate::exec::backend::Termination;
use crate::exec::command::child_command;

struct TerminateRequest {
    grace: Duration,
    reply: oneshot::Sender<Termination>,
}

/// Internal handle for the currently-running child.
///
/// - `terminate` asks the supervising task to stop the process gracefully.
/// - `handle` is the Tokio task that owns the `Child`; once it has finished
///   the process has been reaped.
pub struct ActiveChild {
    pub pid: u32,
    terminate: Option<oneshot::Sender<TerminateRequest>>,
    handle: JoinHandle<()>,
}

impl ActiveChild {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Terminate the child and wait until it is reaped.
    ///
    /// Returns `None` if the child had already exited on its own.
    pub async fn terminate(mut self, grace: Duration) -> Option<Termination> {
        let (reply_tx, reply_rx) = oneshot::channel();

        let sent = match self.terminate.take() {
            Some(tx) => tx
                .send(TerminateRequest {
                    grace,
                    reply: reply_tx,
                })
                .is_ok(),
            None => false,
        };

        let termination = if sent { reply_rx.await.ok() } else { None };

        if let Err(e) = self.handle.await {
            warn!(pid = self.pid, error = %e, "child supervision task failed");
        }

        termination
    }
}

/// Spawn `command` with inherited stdio and supervise it in the background.
///
/// The child stays in the supervisor's process group so it keeps reading the
/// terminal; simple commands are `exec`ed so the pid is the program itself.
/// A natural exit is reported as `ChildExited`; a requested termination is
/// not.
pub fn spawn_child(
    command: &str,
    cwd: &Path,
    runtime_tx: mpsc::Sender<SupervisorEvent>,
) -> Result<ActiveChild> {
    let mut cmd = child_command(command, cwd);
    cmd.stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .map_err(|source| SupervisorError::ProcessSpawnError {
            command: command.to_string(),
            source,
        })?;

    let pid = child.id().ok_or_else(|| SupervisorError::ProcessSpawnError {
        command: command.to_string(),
        source: std::io::Error::other("spawned process has no pid"),
    })?;

    info!(pid, cmd = %command, "child started");

    let (terminate_tx, terminate_rx) = oneshot::channel();
    let handle = tokio::spawn(supervise(child, pid, terminate_rx, runtime_tx));

    Ok(ActiveChild {
        pid,
        terminate: Some(terminate_tx),
        handle,
    })
}

async fn supervise(
    mut child: Child,
    pid: u32,
    mut terminate_rx: oneshot::Receiver<TerminateRequest>,
    runtime_tx: mpsc::Sender<SupervisorEvent>,
) {
    tokio::select! {
        status_res = child.wait() => {
            let code = match status_res {
                Ok(status) => status.code(),
                Err(e) => {
                    warn!(pid, error = %e, "failed waiting for child");
                    None
                }
            };
            info!(pid, exit_code = ?code, "child exited on its own");

            // The runtime may be busy terminating this child while the
            // mailbox is full; answer that request instead of waiting.
            tokio::select! {
                res = runtime_tx.send(SupervisorEvent::ChildExited { pid, code }) => {
                    if res.is_err() {
                        debug!(pid, "runtime gone; dropping child exit");
                    }
                }
                _ = &mut terminate_rx => {
                    debug!(pid, "terminate requested for an exited child");
                }
            }
        }

        request = &mut terminate_rx => {
            match request {
                Ok(TerminateRequest { grace, reply }) => {
                    let termination = terminate_gracefully(&mut child, pid, grace).await;
                    let _ = reply.send(termination);
                }
                Err(_) => {
                    debug!(pid, "child handle dropped; killing child");
                    kill_child(&mut child, pid).await;
                }
            }
        }
    }
}

/// SIGTERM, wait up to `grace`, then SIGKILL.
///
/// `timed_out` is set only when the grace period ran out. On non-unix
/// platforms the child is killed immediately.
async fn terminate_gracefully(child: &mut Child, pid: u32, grace: Duration) -> Termination {
    #[cfg(unix)]
    {
        use nix::sys::signal::Signal;

        debug!(pid, ?grace, "sending SIGTERM to child");
        if let Err(e) = crate::exec::command::signal_process(pid, Signal::SIGTERM) {
            debug!(pid, error = %e, "SIGTERM failed; child may already be gone");
        }

        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                info!(pid, exit_code = ?status.code(), "child terminated");
                return Termination { pid, timed_out: false };
            }
            Ok(Err(e)) => {
                warn!(pid, error = %e, "failed waiting for child after SIGTERM");
            }
            Err(_) => {
                warn!(pid, ?grace, "child ignored SIGTERM; killing");
                kill_child(child, pid).await;
                return Termination { pid, timed_out: true };
            }
        }
    }

    #[cfg(not(unix))]
    let _ = grace;

    kill_child(child, pid).await;
    Termination { pid, timed_out: false }
}

async fn kill_child(child: &mut Child, pid: u32) {
    debug!(pid, "killing child");
    if let Err(e) = child.kill().await {
        debug!(pid, error = %e, "failed to kill child");
    }
}
