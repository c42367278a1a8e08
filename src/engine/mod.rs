// src/engine/mod.rs

//! Orchestration engine for relaunch.
//!
//! This module ties together:
//! - the rebuild queue (what happens when triggers arrive while a build runs)
//! - the pure core state machine that decides when to terminate, build and
//!   spawn
//! - the async runtime loop that reacts to:
//!   - file-change triggers
//!   - build completion events
//!   - child exits
//!   - shutdown requests
//!
//! The pure core lives in [`core`]; the async/IO shell is implemented in
//! [`runtime`].

use std::path::PathBuf;

use crate::errors::SupervisorError;
use crate::exec::BuildOutput;
use crate::types::ChangeKind;

/// Monotonic id of a rebuild cycle. The first cycle is 1.
pub type CycleId = u64;

/// Why a rebuild was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// The initial cycle performed by `start`.
    Startup,
    /// Triggered by a filesystem event.
    FileWatch,
    /// Requested through the supervisor handle.
    Manual,
}

/// Events flowing into the runtime from the watcher, the launcher, and the
/// supervisor handle.
#[derive(Debug, Clone)]
pub enum SupervisorEvent {
    /// A watched file changed.
    FileChanged { path: PathBuf, kind: ChangeKind },
    /// A rebuild was requested without a file change.
    RebuildRequested { reason: TriggerReason },
    /// The build of `cycle` finished (successfully or not).
    BuildCompleted { cycle: CycleId, output: BuildOutput },
    /// The run command of `cycle` was started as `pid`.
    ChildSpawned { cycle: CycleId, pid: u32 },
    /// The run command of `cycle` could not be started.
    SpawnFailed { cycle: CycleId },
    /// The child exited on its own (not through termination).
    ChildExited { pid: u32, code: Option<i32> },
    /// Graceful shutdown requested (e.g. Ctrl-C or `stop()`).
    ShutdownRequested,
}

/// Observable outcomes, published by the runtime for callers that subscribe
/// via `Supervisor::notices`.
#[derive(Debug)]
pub enum SupervisorNotice {
    BuildStarted { cycle: CycleId, triggers: usize },
    BuildSucceeded { cycle: CycleId, output: BuildOutput },
    /// Always carries a [`SupervisorError::BuildFailure`].
    BuildFailed { cycle: CycleId, error: SupervisorError },
    ChildSpawned { cycle: CycleId, pid: u32 },
    /// Always carries a [`SupervisorError::ProcessSpawnError`].
    SpawnFailed { cycle: CycleId, error: SupervisorError },
    ChildTerminated { pid: u32 },
    /// Always carries a [`SupervisorError::TerminationTimeout`].
    TerminationTimeout { error: SupervisorError },
    ChildExited { pid: u32, code: Option<i32> },
    Stopped,
}

pub mod core;
pub mod event_handlers;
pub mod queue;
pub mod runtime;

pub use core::{CoreSupervisor, Phase, RunSummary};
pub use event_handlers::{CoreCommand, CoreStep};
pub use queue::{PendingRebuild, RebuildQueue};
pub use runtime::{Runtime, RuntimeOptions, ShutdownTrigger};
