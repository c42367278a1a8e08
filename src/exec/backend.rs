// src/exec/backend.rs

//! Pluggable process launcher abstraction.
//!
//! The runtime talks to a `ProcessLauncher` instead of spawning processes
//! itself. This makes it easy to swap in a fake launcher in tests and assert
//! on the exact sequence of terminate / build / spawn calls.
//!
//! - `RealProcessLauncher` is the implementation used by `relaunch`. It owns
//!   the in-flight build and the single running child.
//! - Tests provide their own `ProcessLauncher` that records calls and emits
//!   `SupervisorEvent::BuildCompleted` on demand.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use crate::engine::{CycleId, SupervisorEvent};
use crate::errors::Result;

use super::build_runner::{spawn_build, ActiveBuild};
use super::child_runner::{spawn_child, ActiveChild};

/// Boxed future returned by launcher operations.
pub type LaunchFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// How a child was stopped by [`ProcessLauncher::terminate_child`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Termination {
    pub pid: u32,
    /// The child outlived the grace period and had to be killed.
    pub timed_out: bool,
}

/// Capability interface for everything that touches processes.
///
/// Production code uses [`RealProcessLauncher`]; tests can provide their own
/// implementation that doesn't spawn real processes.
pub trait ProcessLauncher: Send {
    /// Start the build for `cycle` without waiting for it.
    ///
    /// The implementation must report the result as a
    /// `SupervisorEvent::BuildCompleted { cycle, .. }` on the runtime channel,
    /// unless the build is cancelled first.
    fn start_build(&mut self, cycle: CycleId, command: &str) -> LaunchFuture<'_, ()>;

    /// Kill the in-flight build, if any, and wait until it is gone.
    fn cancel_build(&mut self) -> LaunchFuture<'_, ()>;

    /// Start the run command with inherited stdio; returns its pid.
    ///
    /// Fails with `SupervisorError::ProcessSpawnError`.
    fn spawn_child(&mut self, command: &str) -> LaunchFuture<'_, u32>;

    /// Stop the current child: terminate, wait at most `grace`, then kill.
    ///
    /// Returns `None` if there was no running child.
    fn terminate_child(&mut self, grace: Duration) -> LaunchFuture<'_, Option<Termination>>;

    /// Release everything: cancel the build, then terminate the child.
    fn shutdown(&mut self, grace: Duration) -> LaunchFuture<'_, Option<Termination>> {
        Box::pin(async move {
            self.cancel_build().await?;
            self.terminate_child(grace).await
        })
    }
}

/// Real launcher used in production.
///
/// Holds at most one [`ActiveBuild`] and at most one [`ActiveChild`]; both
/// report back to the runtime through `runtime_tx`.
pub struct RealProcessLauncher {
    runtime_tx: mpsc::Sender<SupervisorEvent>,
    working_dir: PathBuf,
    build: Option<ActiveBuild>,
    child: Option<ActiveChild>,
}

impl RealProcessLauncher {
    /// Create a launcher whose commands run in `working_dir`.
    pub fn new(runtime_tx: mpsc::Sender<SupervisorEvent>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            runtime_tx,
            working_dir: working_dir.into(),
            build: None,
            child: None,
        }
    }
}

impl ProcessLauncher for RealProcessLauncher {
    fn start_build(&mut self, cycle: CycleId, command: &str) -> LaunchFuture<'_, ()> {
        let command = command.to_string();
        Box::pin(async move {
            if let Some(previous) = self.build.take() {
                if !previous.is_finished() {
                    debug!(
                        previous = previous.cycle,
                        cycle, "previous build still registered; cancelling it"
                    );
                }
                previous.cancel().await;
            }

            let build = spawn_build(
                cycle,
                command,
                self.working_dir.clone(),
                self.runtime_tx.clone(),
            );
            self.build = Some(build);
            Ok(())
        })
    }

    fn cancel_build(&mut self) -> LaunchFuture<'_, ()> {
        Box::pin(async move {
            if let Some(build) = self.build.take() {
                build.cancel().await;
            }
            Ok(())
        })
    }

    fn spawn_child(&mut self, command: &str) -> LaunchFuture<'_, u32> {
        let command = command.to_string();
        Box::pin(async move {
            // The runtime always terminates first; this only catches misuse.
            if let Some(stale) = self.child.take() {
                if !stale.is_finished() {
                    debug!(pid = stale.pid, "replacing child that was not terminated");
                }
                stale.terminate(Duration::ZERO).await;
            }

            let child = spawn_child(&command, &self.working_dir, self.runtime_tx.clone())?;
            let pid = child.pid;
            self.child = Some(child);
            Ok(pid)
        })
    }

    fn terminate_child(&mut self, grace: Duration) -> LaunchFuture<'_, Option<Termination>> {
        Box::pin(async move {
            match self.child.take() {
                Some(child) => Ok(child.terminate(grace).await),
                None => Ok(None),
            }
        })
    }
}
