// tests/core_properties.rs

use std::collections::VecDeque;
use std::path::PathBuf;

use proptest::prelude::*;
use relaunch::engine::{CoreCommand, CoreSupervisor, SupervisorEvent, TriggerReason};
use relaunch::exec::BuildOutput;
use relaunch::types::{ChangeKind, SupervisorMode};

#[derive(Debug, Clone, Copy)]
enum Op {
    Change,
    Complete { success: bool },
    Crash,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => Just(Op::Change),
        3 => any::<bool>().prop_map(|success| Op::Complete { success }),
        1 => Just(Op::Crash),
    ]
}

/// Minimal stand-in for the processes: executes core commands the way the
/// runtime does and checks mutual exclusion on the way.
#[derive(Default)]
struct World {
    in_flight: Option<u64>,
    child: Option<u32>,
    next_pid: u32,
    builds: usize,
    spawns: usize,
}

impl World {
    fn execute(&mut self, core: &mut CoreSupervisor, event: SupervisorEvent) -> Vec<CoreCommand> {
        let mut pending = VecDeque::from([event]);
        let mut executed = Vec::new();

        while let Some(event) = pending.pop_front() {
            let step = core.step(event);
            for command in step.commands {
                match command {
                    CoreCommand::TerminateChild => self.child = None,
                    CoreCommand::RunBuild { cycle, .. } => {
                        assert!(self.in_flight.is_none(), "overlapping builds");
                        assert!(self.child.is_none(), "build started with a child running");
                        self.in_flight = Some(cycle);
                        self.builds += 1;
                    }
                    CoreCommand::CancelBuild => self.in_flight = None,
                    CoreCommand::SpawnChild { cycle } => {
                        assert!(self.child.is_none(), "two children running");
                        self.next_pid += 1;
                        self.child = Some(self.next_pid);
                        self.spawns += 1;
                        pending.push_back(SupervisorEvent::ChildSpawned {
                            cycle,
                            pid: self.next_pid,
                        });
                    }
                    CoreCommand::ReportBuild { .. } | CoreCommand::RequestExit => {}
                }
                executed.push(command);
            }
        }
        executed
    }
}

fn output(success: bool) -> BuildOutput {
    if success {
        BuildOutput::succeeded("", "")
    } else {
        BuildOutput::failed(Some(1), "", "error: X")
    }
}

proptest! {
    #[test]
    fn any_interleaving_keeps_builds_and_children_exclusive(
        ops in proptest::collection::vec(op_strategy(), 1..60)
    ) {
        let mut core = CoreSupervisor::new(SupervisorMode::Watch);
        let mut world = World::default();
        world.execute(&mut core, SupervisorEvent::RebuildRequested { reason: TriggerReason::Startup });

        let mut changes_during_build = 0usize;

        for op in ops {
            match op {
                Op::Change => {
                    let was_building = world.in_flight.is_some();
                    let commands = world.execute(&mut core, SupervisorEvent::FileChanged {
                        path: PathBuf::from("a.src"),
                        kind: ChangeKind::Modified,
                    });
                    if was_building {
                        prop_assert!(commands.is_empty());
                        changes_during_build += 1;
                    } else {
                        prop_assert_eq!(commands.len(), 2);
                    }
                }
                Op::Complete { success } => {
                    let Some(cycle) = world.in_flight.take() else { continue };
                    let commands = world.execute(&mut core, SupervisorEvent::BuildCompleted {
                        cycle,
                        output: output(success),
                    });

                    let follow_ups = commands
                        .iter()
                        .filter(|c| matches!(c, CoreCommand::RunBuild { .. }))
                        .count();
                    prop_assert_eq!(follow_ups, usize::from(changes_during_build > 0));

                    let spawned = commands
                        .iter()
                        .any(|c| matches!(c, CoreCommand::SpawnChild { .. }));
                    prop_assert_eq!(spawned, success);

                    changes_during_build = 0;
                }
                Op::Crash => {
                    let Some(pid) = world.child.take() else { continue };
                    let commands = world.execute(&mut core, SupervisorEvent::ChildExited {
                        pid,
                        code: Some(1),
                    });
                    prop_assert!(commands.is_empty());
                }
            }

            prop_assert_eq!(core.child(), world.child);
            prop_assert_eq!(core.is_building(), world.in_flight.is_some());
        }

        let commands = world.execute(&mut core, SupervisorEvent::ShutdownRequested);
        prop_assert!(commands.contains(&CoreCommand::TerminateChild));
        prop_assert!(world.child.is_none());
        prop_assert!(world.in_flight.is_none());
        prop_assert!(world.spawns <= world.builds);
    }
}
