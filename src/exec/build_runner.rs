// src/exec/build_runner.rs

//! Runs a single build command with captured output.

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::{CycleId, SupervisorEvent};
use crate::exec::BuildOutput;
use crate::exec::command::{isolate_process_group, kill_process_tree, shell_command};

/// Handle for the build currently in flight.
///
/// - `cancel` asks the runner to kill the build's process group.
/// - `handle` is the Tokio task running the build; it has finished once the
///   build process is reaped.
pub struct ActiveBuild {
    pub cycle: CycleId,
    cancel: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl ActiveBuild {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Kill the build (if still running) and wait until it has been reaped.
    pub async fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            if cancel.send(()).is_err() {
                debug!(cycle = self.cycle, "build already finished while cancelling");
            }
        }
        if let Err(e) = self.handle.await {
            warn!(cycle = self.cycle, error = %e, "build runner task failed");
        }
    }
}

/// Start `command` in the background for `cycle`.
///
/// Exactly one `BuildCompleted` event is sent for the cycle unless the build
/// is cancelled. Failure to even start the shell is reported as a failed
/// build whose stderr carries the error.
pub fn spawn_build(
    cycle: CycleId,
    command: String,
    cwd: PathBuf,
    runtime_tx: mpsc::Sender<SupervisorEvent>,
) -> ActiveBuild {
    let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        let output = match run_build_inner(cycle, &command, &cwd, &mut cancel_rx).await {
            Ok(Some(output)) => output,
            Ok(None) => return,
            Err(err) => {
                error!(cycle, error = %err, "build execution error");
                BuildOutput::failed(None, String::new(), format!("{err:#}"))
            }
        };

        // A cancel that arrives while the mailbox is full wins; the runtime
        // is waiting for this task and no longer wants the result.
        tokio::select! {
            res = runtime_tx.send(SupervisorEvent::BuildCompleted { cycle, output }) => {
                if res.is_err() {
                    debug!(cycle, "runtime gone; dropping build result");
                }
            }
            _ = &mut cancel_rx => {
                debug!(cycle, "build cancelled while reporting; dropping result");
            }
        }
    });

    ActiveBuild {
        cycle,
        cancel: Some(cancel_tx),
        handle,
    }
}

/// Returns `Ok(None)` when the build was cancelled.
async fn run_build_inner(
    cycle: CycleId,
    command: &str,
    cwd: &std::path::Path,
    cancel_rx: &mut oneshot::Receiver<()>,
) -> Result<Option<BuildOutput>> {
    info!(cycle, cmd = %command, "starting build");

    let mut cmd = shell_command(command, cwd);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    isolate_process_group(&mut cmd);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning build command `{command}`"))?;

    let stdout = tokio::spawn(read_all(child.stdout.take()));
    let stderr = tokio::spawn(read_all(child.stderr.take()));

    // Either the build exits on its own, or we are asked to stop it.
    tokio::select! {
        status_res = child.wait() => {
            let status = status_res
                .with_context(|| format!("waiting for build command `{command}`"))?;

            let stdout = stdout.await.unwrap_or_default();
            let stderr = stderr.await.unwrap_or_default();
            let code = status.code();

            info!(
                cycle,
                exit_code = ?code,
                success = status.success(),
                "build exited"
            );

            let output = if status.success() {
                BuildOutput::succeeded(stdout, stderr)
            } else {
                BuildOutput::failed(code, stdout, stderr)
            };
            Ok(Some(output))
        }

        cancel = cancel_rx => {
            if cancel.is_err() {
                debug!(cycle, "build handle dropped; killing build");
            } else {
                info!(cycle, "cancelling in-flight build");
            }
            kill_process_tree(&mut child).await;
            Ok(None)
        }
    }
}

async fn read_all<R: AsyncRead + Unpin>(reader: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        if let Err(e) = reader.read_to_end(&mut buf).await {
            debug!(error = %e, "error reading build output");
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
