// src/engine/runtime.rs

use std::collections::VecDeque;
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, info, warn};

use crate::errors::{Result, SupervisorError};
use crate::exec::{BuildOutput, ProcessLauncher};

use super::core::{CoreSupervisor, RunSummary};
use super::{CoreCommand, CycleId, SupervisorEvent, SupervisorNotice};

/// Commands and timings the shell needs to execute core commands.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub build_command: String,
    pub run_command: String,
    pub grace_period: Duration,
}

/// Out-of-band shutdown request.
///
/// Unlike a `ShutdownRequested` event it does not need room in the mailbox:
/// a request made before the runtime looks is stored and seen on its next
/// turn.
#[derive(Debug, Clone, Default)]
pub struct ShutdownTrigger {
    notify: Arc<Notify>,
}

impl ShutdownTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire(&self) {
        self.notify.notify_one();
    }

    async fn fired(&self) {
        self.notify.notified().await;
    }
}

/// Drives the core supervisor in response to `SupervisorEvent`s and
/// delegates all process work to a `ProcessLauncher`.
///
/// This is a pure IO shell around `CoreSupervisor`, which contains all the
/// rebuild semantics. This struct handles async IO: reading events from the
/// mailbox, calling the launcher, printing build output and publishing
/// notices.
pub struct Runtime<L: ProcessLauncher> {
    core: CoreSupervisor,
    event_rx: mpsc::Receiver<SupervisorEvent>,
    launcher: L,
    options: RuntimeOptions,
    notices: Option<mpsc::UnboundedSender<SupervisorNotice>>,
    shutdown_trigger: Option<ShutdownTrigger>,
}

impl<L: ProcessLauncher> fmt::Debug for Runtime<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<L: ProcessLauncher> Runtime<L> {
    pub fn new(
        core: CoreSupervisor,
        event_rx: mpsc::Receiver<SupervisorEvent>,
        launcher: L,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            core,
            event_rx,
            launcher,
            options,
            notices: None,
            shutdown_trigger: None,
        }
    }

    /// Publish [`SupervisorNotice`]s on `tx` in addition to logging them.
    pub fn with_notices(mut self, tx: mpsc::UnboundedSender<SupervisorNotice>) -> Self {
        self.notices = Some(tx);
        self
    }

    /// Stop when `trigger` fires, ahead of anything queued in the mailbox.
    pub fn with_shutdown(mut self, trigger: ShutdownTrigger) -> Self {
        self.shutdown_trigger = Some(trigger);
        self
    }

    /// Main event loop.
    ///
    /// - Consumes `SupervisorEvent`s from `event_rx`.
    /// - Feeds them into the core.
    /// - Executes commands returned by the core (terminate, build, spawn...).
    ///
    /// Whatever way the loop ends, the launcher is shut down before this
    /// returns, so no build or child outlives the runtime.
    pub async fn run(mut self) -> Result<RunSummary> {
        info!("relaunch runtime started");

        let result = self.event_loop().await;
        if let Err(ref e) = result {
            error!(error = %e, "runtime loop failed");
        }

        self.shutdown().await;
        info!(cycles = self.core.cycles_started(), "runtime exiting");

        result.map(|()| self.core.summary())
    }

    async fn event_loop(&mut self) -> Result<()> {
        loop {
            let shutdown = self.shutdown_trigger.clone();
            let event = tokio::select! {
                biased;

                _ = wait_for_shutdown(shutdown.as_ref()) => {
                    info!("shutdown requested");
                    SupervisorEvent::ShutdownRequested
                }
                received = self.event_rx.recv() => match received {
                    Some(e) => e,
                    None => {
                        info!("supervisor mailbox closed; exiting");
                        return Ok(());
                    }
                },
            };

            if !self.process(event).await? {
                info!("core requested exit; stopping runtime");
                return Ok(());
            }
        }
    }

    /// Feed one event (and any follow-up events produced while executing
    /// its commands) through the core. Returns whether to keep running.
    async fn process(&mut self, event: SupervisorEvent) -> Result<bool> {
        let mut pending = VecDeque::from([event]);
        let mut keep_running = true;

        while let Some(event) = pending.pop_front() {
            debug!(?event, "runtime received event");

            if let SupervisorEvent::ChildExited { pid, code } = event {
                if self.core.child() == Some(pid) {
                    warn!(pid, exit_code = ?code, "program exited; it restarts after the next change");
                    self.notify(SupervisorNotice::ChildExited { pid, code });
                }
            }

            let step = self.core.step(event);
            for command in step.commands {
                if let Some(follow_up) = self.execute_command(command).await? {
                    pending.push_back(follow_up);
                }
            }
            keep_running &= step.keep_running;
        }

        Ok(keep_running)
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<Option<SupervisorEvent>> {
        match command {
            CoreCommand::TerminateChild => {
                self.terminate_child().await?;
            }
            CoreCommand::RunBuild { cycle, triggers } => {
                info!(cycle, triggers, cmd = %self.options.build_command, "rebuilding");
                self.notify(SupervisorNotice::BuildStarted { cycle, triggers });
                self.launcher
                    .start_build(cycle, &self.options.build_command)
                    .await?;
            }
            CoreCommand::CancelBuild => {
                self.launcher.cancel_build().await?;
            }
            CoreCommand::ReportBuild { cycle, output } => {
                self.report_build(cycle, output);
            }
            CoreCommand::SpawnChild { cycle } => {
                return Ok(Some(self.spawn_child(cycle).await));
            }
            CoreCommand::RequestExit => {
                debug!("core issued RequestExit command");
            }
        }
        Ok(None)
    }

    async fn terminate_child(&mut self) -> Result<()> {
        let grace = self.options.grace_period;
        match self.launcher.terminate_child(grace).await? {
            Some(t) if t.timed_out => {
                let error = SupervisorError::TerminationTimeout { pid: t.pid, grace };
                warn!(pid = t.pid, "{error}");
                self.notify(SupervisorNotice::TerminationTimeout { error });
            }
            Some(t) => {
                debug!(pid = t.pid, "previous child terminated");
                self.notify(SupervisorNotice::ChildTerminated { pid: t.pid });
            }
            None => {}
        }
        Ok(())
    }

    async fn spawn_child(&mut self, cycle: CycleId) -> SupervisorEvent {
        match self.launcher.spawn_child(&self.options.run_command).await {
            Ok(pid) => {
                info!(cycle, pid, cmd = %self.options.run_command, "started program");
                self.notify(SupervisorNotice::ChildSpawned { cycle, pid });
                SupervisorEvent::ChildSpawned { cycle, pid }
            }
            Err(error) => {
                error!(cycle, "{error}; waiting for the next change");
                self.notify(SupervisorNotice::SpawnFailed { cycle, error });
                SupervisorEvent::SpawnFailed { cycle }
            }
        }
    }

    /// Print captured build output and publish the outcome. Output is shown
    /// for successful builds too.
    fn report_build(&mut self, cycle: CycleId, output: BuildOutput) {
        echo_build_output(&output);

        if output.success {
            info!(cycle, "build succeeded");
            self.notify(SupervisorNotice::BuildSucceeded { cycle, output });
        } else {
            error!(
                cycle,
                exit_code = ?output.code,
                "build failed; keeping the previous program stopped until the next change"
            );
            self.notify(SupervisorNotice::BuildFailed {
                cycle,
                error: output.into_failure(),
            });
        }
    }

    async fn shutdown(&mut self) {
        let grace = self.options.grace_period;
        match self.launcher.shutdown(grace).await {
            Ok(Some(t)) if t.timed_out => {
                let error = SupervisorError::TerminationTimeout { pid: t.pid, grace };
                warn!(pid = t.pid, "{error}");
                self.notify(SupervisorNotice::TerminationTimeout { error });
            }
            Ok(Some(t)) => {
                self.notify(SupervisorNotice::ChildTerminated { pid: t.pid });
            }
            Ok(None) => {}
            Err(e) => error!(error = %e, "failed to shut down launcher"),
        }
        self.notify(SupervisorNotice::Stopped);
    }

    fn notify(&self, notice: SupervisorNotice) {
        if let Some(tx) = &self.notices {
            // Subscribers may go away; that's fine.
            let _ = tx.send(notice);
        }
    }
}

async fn wait_for_shutdown(trigger: Option<&ShutdownTrigger>) {
    match trigger {
        Some(trigger) => trigger.fired().await,
        None => std::future::pending().await,
    }
}

fn echo_build_output(output: &BuildOutput) {
    if !output.stdout.is_empty() {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(output.stdout.as_bytes());
        let _ = out.flush();
    }
    if !output.stderr.is_empty() {
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(output.stderr.as_bytes());
        let _ = err.flush();
    }
}
