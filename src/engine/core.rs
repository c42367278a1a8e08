// src/engine/core.rs

//! Pure core supervisor state machine.
//!
//! This module contains a synchronous, deterministic "core" that consumes
//! [`SupervisorEvent`]s and produces:
//! - an updated core state
//! - a list of commands describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from the mailbox
//! - terminating, building and spawning through a `ProcessLauncher`
//! - reporting build output
//!
//! The core has no Tokio types, channels, or processes, so every ordering and
//! coalescing rule can be tested by feeding it events directly.

use crate::engine::event_handlers::{
    handle_build_completed, handle_child_exited, handle_child_spawned, handle_shutdown,
    handle_spawn_failed, handle_trigger, CoreStep,
};
use crate::engine::queue::RebuildQueue;
use crate::engine::{CycleId, SupervisorEvent, TriggerReason};
use crate::types::SupervisorMode;

/// Whether a build is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Building { cycle: CycleId },
}

/// Mutable state shared by the event handlers.
#[derive(Debug)]
pub struct CoreState {
    pub(crate) mode: SupervisorMode,
    pub(crate) phase: Phase,
    pub(crate) queue: RebuildQueue,
    /// Id of the most recently started cycle (0 before the first one).
    pub(crate) last_cycle: CycleId,
    /// Pid of the child the core believes is running.
    pub(crate) child: Option<u32>,
    /// Whether the last finished cycle ended with a running child.
    pub(crate) last_cycle_ok: Option<bool>,
    pub(crate) stopping: bool,
}

/// What happened over the lifetime of a runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub mode: SupervisorMode,
    pub cycles: CycleId,
    pub last_cycle_ok: Option<bool>,
}

impl RunSummary {
    /// Process exit code: non-zero only when a compile-once run failed.
    pub fn exit_code(&self) -> i32 {
        match (self.mode, self.last_cycle_ok) {
            (SupervisorMode::CompileOnce, Some(false)) => 1,
            _ => 0,
        }
    }
}

/// Pure core supervisor.
#[derive(Debug)]
pub struct CoreSupervisor {
    state: CoreState,
}

impl CoreSupervisor {
    pub fn new(mode: SupervisorMode) -> Self {
        Self {
            state: CoreState {
                mode,
                phase: Phase::Idle,
                queue: RebuildQueue::new(),
                last_cycle: 0,
                child: None,
                last_cycle_ok: None,
                stopping: false,
            },
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn is_building(&self) -> bool {
        matches!(self.state.phase, Phase::Building { .. })
    }

    /// Expose whether a follow-up rebuild is pending (for tests).
    pub fn has_pending_rebuild(&self) -> bool {
        !self.state.queue.is_empty()
    }

    /// Pid of the child the core believes is running.
    pub fn child(&self) -> Option<u32> {
        self.state.child
    }

    pub fn cycles_started(&self) -> CycleId {
        self.state.last_cycle
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            mode: self.state.mode,
            cycles: self.state.last_cycle,
            last_cycle_ok: self.state.last_cycle_ok,
        }
    }

    /// Handle a single event, updating core state and returning the resulting
    /// commands for the IO shell.
    pub fn step(&mut self, event: SupervisorEvent) -> CoreStep {
        let state = &mut self.state;
        match event {
            SupervisorEvent::FileChanged { path, .. } => {
                handle_trigger(state, TriggerReason::FileWatch, Some(path))
            }
            SupervisorEvent::RebuildRequested { reason } => handle_trigger(state, reason, None),
            SupervisorEvent::BuildCompleted { cycle, output } => {
                handle_build_completed(state, cycle, output)
            }
            SupervisorEvent::ChildSpawned { cycle, pid } => handle_child_spawned(state, cycle, pid),
            SupervisorEvent::SpawnFailed { cycle } => handle_spawn_failed(state, cycle),
            SupervisorEvent::ChildExited { pid, code } => handle_child_exited(state, pid, code),
            SupervisorEvent::ShutdownRequested => handle_shutdown(state),
        }
    }
}
