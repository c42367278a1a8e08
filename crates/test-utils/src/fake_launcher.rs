use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;

use relaunch::engine::{CycleId, SupervisorEvent};
use relaunch::errors::SupervisorError;
use relaunch::exec::{BuildOutput, LaunchFuture, ProcessLauncher, Termination};

/// One call made by the runtime into the launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LauncherCall {
    /// `terminate_child`; `pid` is the child that was running, if any.
    Terminate { pid: Option<u32> },
    Build { cycle: CycleId },
    CancelBuild,
    /// `spawn_child`; `pid` is `None` when the spawn was scripted to fail.
    Spawn { pid: Option<u32> },
}

#[derive(Debug)]
struct FakeState {
    runtime_tx: Option<mpsc::Sender<SupervisorEvent>>,
    calls: Vec<LauncherCall>,
    auto_complete: bool,
    build_results: VecDeque<bool>,
    in_flight: Option<CycleId>,
    child: Option<u32>,
    next_pid: u32,
    spawn_failures: usize,
    stubborn_children: bool,
    overlapping_builds: bool,
    overlapping_children: bool,
}

/// A fake process launcher that:
/// - records every terminate / build / cancel / spawn call
/// - tracks the single "running" child and the in-flight build
/// - completes builds either immediately (auto mode, with scripted
///   outcomes) or when the test calls [`FakeControl::complete_build`].
///
/// Nothing is actually spawned; pids are small increasing numbers.
pub struct FakeLauncher {
    state: Arc<Mutex<FakeState>>,
}

/// Test-side handle to the state shared with a [`FakeLauncher`].
#[derive(Clone)]
pub struct FakeControl {
    state: Arc<Mutex<FakeState>>,
}

impl FakeControl {
    /// Builds stay in flight until [`FakeControl::complete_build`] is called.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                runtime_tx: None,
                calls: Vec::new(),
                auto_complete: false,
                build_results: VecDeque::new(),
                in_flight: None,
                child: None,
                next_pid: 1000,
                spawn_failures: 0,
                stubborn_children: false,
                overlapping_builds: false,
                overlapping_children: false,
            })),
        }
    }

    /// Complete every build as soon as it starts. Outcomes are taken from
    /// `results` in order; once exhausted, builds succeed.
    pub fn auto_complete(self, results: impl IntoIterator<Item = bool>) -> Self {
        {
            let mut st = self.lock();
            st.auto_complete = true;
            st.build_results = results.into_iter().collect();
        }
        self
    }

    /// Make the next `n` spawns fail.
    pub fn fail_spawns(self, n: usize) -> Self {
        self.lock().spawn_failures = n;
        self
    }

    /// Children ignore the polite termination request, so every termination
    /// runs out its grace period.
    pub fn stubborn_children(self) -> Self {
        self.lock().stubborn_children = true;
        self
    }

    /// Create the launcher handed to the runtime. Build completions and child
    /// exits are sent on `runtime_tx`.
    pub fn launcher(&self, runtime_tx: mpsc::Sender<SupervisorEvent>) -> FakeLauncher {
        self.lock().runtime_tx = Some(runtime_tx);
        FakeLauncher {
            state: Arc::clone(&self.state),
        }
    }

    pub fn calls(&self) -> Vec<LauncherCall> {
        self.lock().calls.clone()
    }

    pub fn builds(&self) -> Vec<CycleId> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                LauncherCall::Build { cycle } => Some(*cycle),
                _ => None,
            })
            .collect()
    }

    /// Pids of all successful spawns, in order.
    pub fn spawned(&self) -> Vec<u32> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                LauncherCall::Spawn { pid } => *pid,
                _ => None,
            })
            .collect()
    }

    /// The child currently considered running, if any.
    pub fn running_child(&self) -> Option<u32> {
        self.lock().child
    }

    pub fn in_flight_build(&self) -> Option<CycleId> {
        self.lock().in_flight
    }

    /// True if a build was ever started while another was still in flight.
    pub fn saw_overlapping_builds(&self) -> bool {
        self.lock().overlapping_builds
    }

    /// True if a child was ever spawned while another was still running.
    pub fn saw_overlapping_children(&self) -> bool {
        self.lock().overlapping_children
    }

    /// Finish the in-flight build `cycle` with the given outcome.
    pub async fn complete_build(&self, cycle: CycleId, success: bool) {
        let tx = {
            let mut st = self.lock();
            if st.in_flight == Some(cycle) {
                st.in_flight = None;
            }
            st.runtime_tx.clone()
        };
        if let Some(tx) = tx {
            let _ = tx
                .send(SupervisorEvent::BuildCompleted {
                    cycle,
                    output: build_output(cycle, success),
                })
                .await;
        }
    }

    /// Let the running child exit on its own.
    pub async fn exit_child(&self, code: Option<i32>) {
        let (tx, pid) = {
            let mut st = self.lock();
            (st.runtime_tx.clone(), st.child.take())
        };
        if let (Some(tx), Some(pid)) = (tx, pid) {
            let _ = tx.send(SupervisorEvent::ChildExited { pid, code }).await;
        }
    }

    /// Poll until `pred` holds for the recorded calls.
    ///
    /// Never gives up on its own; wrap it in `with_timeout`.
    pub async fn wait_for(&self, pred: impl Fn(&[LauncherCall]) -> bool) {
        loop {
            if pred(&self.lock().calls) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Wait until `n` builds have been started.
    pub async fn wait_for_builds(&self, n: usize) {
        self.wait_for(|calls| {
            calls
                .iter()
                .filter(|c| matches!(c, LauncherCall::Build { .. }))
                .count()
                >= n
        })
        .await
    }

    /// Wait until `n` spawn attempts have been made.
    pub async fn wait_for_spawns(&self, n: usize) {
        self.wait_for(|calls| {
            calls
                .iter()
                .filter(|c| matches!(c, LauncherCall::Spawn { .. }))
                .count()
                >= n
        })
        .await
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

impl Default for FakeControl {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeLauncher {
    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }
}

impl ProcessLauncher for FakeLauncher {
    fn start_build(&mut self, cycle: CycleId, _command: &str) -> LaunchFuture<'_, ()> {
        Box::pin(async move {
            let auto = {
                let mut st = self.lock();
                st.calls.push(LauncherCall::Build { cycle });
                if st.in_flight.is_some() {
                    st.overlapping_builds = true;
                }
                if st.auto_complete {
                    let success = st.build_results.pop_front().unwrap_or(true);
                    Some((st.runtime_tx.clone(), success))
                } else {
                    st.in_flight = Some(cycle);
                    None
                }
            };

            if let Some((Some(tx), success)) = auto {
                // Sent from a task: the runtime is the receiver and is busy
                // executing this very command.
                tokio::spawn(async move {
                    let _ = tx
                        .send(SupervisorEvent::BuildCompleted {
                            cycle,
                            output: build_output(cycle, success),
                        })
                        .await;
                });
            }
            Ok(())
        })
    }

    fn cancel_build(&mut self) -> LaunchFuture<'_, ()> {
        Box::pin(async move {
            let mut st = self.lock();
            st.calls.push(LauncherCall::CancelBuild);
            st.in_flight = None;
            Ok(())
        })
    }

    fn spawn_child(&mut self, command: &str) -> LaunchFuture<'_, u32> {
        let command = command.to_string();
        Box::pin(async move {
            let mut st = self.lock();
            if st.spawn_failures > 0 {
                st.spawn_failures -= 1;
                st.calls.push(LauncherCall::Spawn { pid: None });
                return Err(SupervisorError::ProcessSpawnError {
                    command,
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such program"),
                });
            }

            if st.child.is_some() {
                st.overlapping_children = true;
            }
            st.next_pid += 1;
            let pid = st.next_pid;
            st.child = Some(pid);
            st.calls.push(LauncherCall::Spawn { pid: Some(pid) });
            Ok(pid)
        })
    }

    fn terminate_child(&mut self, _grace: Duration) -> LaunchFuture<'_, Option<Termination>> {
        Box::pin(async move {
            let mut st = self.lock();
            let pid = st.child.take();
            st.calls.push(LauncherCall::Terminate { pid });
            Ok(pid.map(|pid| Termination {
                pid,
                timed_out: st.stubborn_children,
            }))
        })
    }
}

fn build_output(cycle: CycleId, success: bool) -> BuildOutput {
    if success {
        BuildOutput::succeeded(format!("build {cycle} ok\n"), "")
    } else {
        BuildOutput::failed(Some(1), "", format!("error: X (build {cycle})\n"))
    }
}
