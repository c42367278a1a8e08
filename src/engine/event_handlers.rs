// src/engine/event_handlers.rs

//! Event handling logic for the core supervisor.

use std::path::PathBuf;

use tracing::{debug, info};

use crate::engine::core::{CoreState, Phase};
use crate::engine::{CycleId, TriggerReason};
use crate::exec::BuildOutput;
use crate::types::SupervisorMode;

/// Command produced by the pure core, to be executed by the outer IO shell.
///
/// Commands of one step must be executed in order: `TerminateChild` has to
/// complete before `RunBuild` is issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Stop the current child (grace period, then kill). No-op if none.
    TerminateChild,
    /// Start the build for `cycle` in the background.
    RunBuild { cycle: CycleId, triggers: usize },
    /// Kill the in-flight build, if any.
    CancelBuild,
    /// Surface the captured output of a finished build.
    ReportBuild { cycle: CycleId, output: BuildOutput },
    /// Start the run command for `cycle`.
    SpawnChild { cycle: CycleId },
    /// Request that the runtime exits (compile-once mode).
    RequestExit,
}

/// Decision returned by the core after handling a single `SupervisorEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    pub(crate) fn continue_with(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    pub(crate) fn exit_with(mut commands: Vec<CoreCommand>) -> Self {
        commands.push(CoreCommand::RequestExit);
        Self {
            commands,
            keep_running: false,
        }
    }
}

/// Handle a rebuild trigger (file change, startup, manual request).
///
/// - Idle: start a new cycle right away.
/// - Building: coalesce into the single pending rebuild.
pub fn handle_trigger(
    state: &mut CoreState,
    reason: TriggerReason,
    path: Option<PathBuf>,
) -> CoreStep {
    if state.stopping {
        debug!(?reason, "ignoring trigger during shutdown");
        return CoreStep::continue_with(Vec::new());
    }

    match state.phase {
        Phase::Idle => {
            debug!(?reason, ?path, "trigger while idle; starting rebuild cycle");
            CoreStep::continue_with(start_cycle(state, 1))
        }
        Phase::Building { cycle } => {
            debug!(cycle, ?reason, "build in progress; coalescing trigger");
            state.queue.record_trigger(path);
            CoreStep::continue_with(Vec::new())
        }
    }
}

/// Handle the completion of a build.
///
/// Completions for any cycle other than the one in flight are stale and
/// ignored.
pub fn handle_build_completed(
    state: &mut CoreState,
    cycle: CycleId,
    output: BuildOutput,
) -> CoreStep {
    match state.phase {
        Phase::Building { cycle: current } if current == cycle => {}
        _ => {
            debug!(cycle, phase = ?state.phase, "ignoring stale build completion");
            return CoreStep::continue_with(Vec::new());
        }
    }

    state.phase = Phase::Idle;
    let success = output.success;
    state.last_cycle_ok = Some(success);

    let mut commands = vec![CoreCommand::ReportBuild { cycle, output }];

    if success {
        commands.push(CoreCommand::SpawnChild { cycle });
    } else if state.mode == SupervisorMode::CompileOnce {
        return CoreStep::exit_with(commands);
    }

    if let Some(pending) = state.queue.drain_pending() {
        info!(
            triggers = pending.triggers,
            "changes arrived during the build; starting follow-up rebuild"
        );
        commands.extend(start_cycle(state, pending.triggers));
    }

    CoreStep::continue_with(commands)
}

/// Record the pid of a freshly spawned child.
pub fn handle_child_spawned(state: &mut CoreState, cycle: CycleId, pid: u32) -> CoreStep {
    if state.phase != Phase::Idle || cycle != state.last_cycle {
        // A newer cycle already terminated this child.
        debug!(cycle, pid, "child spawned for superseded cycle");
        return CoreStep::continue_with(Vec::new());
    }
    state.child = Some(pid);
    CoreStep::continue_with(Vec::new())
}

/// The run command could not be started. The supervisor keeps running and
/// waits for the next change, except in compile-once mode.
pub fn handle_spawn_failed(state: &mut CoreState, cycle: CycleId) -> CoreStep {
    state.child = None;
    if cycle == state.last_cycle {
        state.last_cycle_ok = Some(false);
    }
    if state.mode == SupervisorMode::CompileOnce && state.phase == Phase::Idle {
        return CoreStep::exit_with(Vec::new());
    }
    CoreStep::continue_with(Vec::new())
}

/// The child exited on its own. It is not restarted until the next change.
pub fn handle_child_exited(state: &mut CoreState, pid: u32, code: Option<i32>) -> CoreStep {
    if state.child != Some(pid) {
        debug!(pid, "exit of a child that is no longer current");
        return CoreStep::continue_with(Vec::new());
    }

    info!(pid, ?code, "child exited; waiting for the next change to restart it");
    state.child = None;

    if state.mode == SupervisorMode::CompileOnce
        && state.phase == Phase::Idle
        && state.queue.is_empty()
    {
        return CoreStep::exit_with(Vec::new());
    }

    CoreStep::continue_with(Vec::new())
}

/// Shut everything down: kill an in-flight build, terminate the child.
pub fn handle_shutdown(state: &mut CoreState) -> CoreStep {
    state.stopping = true;
    state.queue.clear();

    let mut commands = Vec::new();
    if let Phase::Building { cycle } = state.phase {
        debug!(cycle, "cancelling in-flight build for shutdown");
        commands.push(CoreCommand::CancelBuild);
    }
    commands.push(CoreCommand::TerminateChild);
    state.phase = Phase::Idle;
    state.child = None;

    CoreStep {
        commands,
        keep_running: false,
    }
}

/// Begin a new cycle: terminate the child, then build.
fn start_cycle(state: &mut CoreState, triggers: usize) -> Vec<CoreCommand> {
    state.last_cycle += 1;
    let cycle = state.last_cycle;
    state.phase = Phase::Building { cycle };
    state.child = None;

    vec![
        CoreCommand::TerminateChild,
        CoreCommand::RunBuild { cycle, triggers },
    ]
}
