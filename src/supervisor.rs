// src/supervisor.rs

//! Owned, explicitly torn-down supervisor instance.
//!
//! [`Supervisor`] wires the mailbox, the launcher, the optional file watcher
//! and the runtime task together; [`SupervisorHandle`] is what callers keep to
//! trigger rebuilds and to stop everything again.

use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::SupervisorConfig;
use crate::engine::{
    CoreSupervisor, RunSummary, Runtime, RuntimeOptions, ShutdownTrigger, SupervisorEvent,
    SupervisorNotice, TriggerReason,
};
use crate::errors::{Result, SupervisorError};
use crate::exec::{ProcessLauncher, RealProcessLauncher};
use crate::types::{ChangeKind, SupervisorMode};
use crate::watch::{spawn_watcher, WatchSet, WatcherHandle};

/// Builder for a supervisor instance.
pub struct Supervisor {
    config: SupervisorConfig,
    mode: SupervisorMode,
    watch_files: Option<bool>,
    notices: Option<mpsc::UnboundedSender<SupervisorNotice>>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            mode: SupervisorMode::Watch,
            watch_files: None,
            notices: None,
        }
    }

    pub fn mode(mut self, mode: SupervisorMode) -> Self {
        self.mode = mode;
        self
    }

    /// Override whether a filesystem watcher is started. By default it is
    /// started in `Watch` mode and not in `CompileOnce` mode.
    pub fn watch_files(mut self, enabled: bool) -> Self {
        self.watch_files = Some(enabled);
        self
    }

    /// Subscribe to [`SupervisorNotice`]s.
    pub fn notices(&mut self) -> mpsc::UnboundedReceiver<SupervisorNotice> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.notices = Some(tx);
        rx
    }

    /// Start with the real process launcher.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(self) -> Result<SupervisorHandle> {
        let root = self.config.root.clone();
        self.start_with(move |tx| RealProcessLauncher::new(tx, root))
    }

    /// Start with a custom launcher, built from the runtime's event sender.
    ///
    /// Begins watching (if enabled) and immediately queues the first
    /// build-and-run cycle.
    pub fn start_with<L, F>(self, make_launcher: F) -> Result<SupervisorHandle>
    where
        L: ProcessLauncher + 'static,
        F: FnOnce(mpsc::Sender<SupervisorEvent>) -> L,
    {
        let Supervisor {
            config,
            mode,
            watch_files,
            notices,
        } = self;

        let watch_set = WatchSet::new(&config.watch, &config.exclude)
            .map_err(|e| SupervisorError::ConfigError(format!("{e:#}")))?;
        if watch_set.is_empty() {
            return Err(SupervisorError::ConfigError("watch set is empty".to_string()));
        }

        let (tx, rx) = mpsc::channel::<SupervisorEvent>(config.mailbox_capacity);

        let watch_files = watch_files.unwrap_or(mode == SupervisorMode::Watch);
        let watcher = if watch_files {
            Some(spawn_watcher(config.root.clone(), watch_set, tx.clone())?)
        } else {
            None
        };

        tx.try_send(SupervisorEvent::RebuildRequested {
            reason: TriggerReason::Startup,
        })
        .map_err(|e| SupervisorError::Other(anyhow::anyhow!("seeding initial build: {e}")))?;

        let launcher = make_launcher(tx.clone());
        let options = RuntimeOptions {
            build_command: config.build_command.clone(),
            run_command: config.run_command.clone(),
            grace_period: config.grace_period,
        };

        let shutdown = ShutdownTrigger::new();
        let mut runtime = Runtime::new(CoreSupervisor::new(mode), rx, launcher, options)
            .with_shutdown(shutdown.clone());
        if let Some(notices) = notices {
            runtime = runtime.with_notices(notices);
        }

        info!(
            ?mode,
            build = %config.build_command,
            run = %config.run_command,
            "supervisor starting"
        );

        let task = tokio::spawn(runtime.run());

        Ok(SupervisorHandle {
            tx,
            shutdown,
            watcher,
            task: Some(task),
            summary: None,
        })
    }
}

/// Handle to a running supervisor.
///
/// Dropping the handle without calling [`SupervisorHandle::stop`] requests a
/// shutdown but does not wait for it.
pub struct SupervisorHandle {
    tx: mpsc::Sender<SupervisorEvent>,
    shutdown: ShutdownTrigger,
    watcher: Option<WatcherHandle>,
    task: Option<JoinHandle<Result<RunSummary>>>,
    summary: Option<RunSummary>,
}

impl std::fmt::Debug for SupervisorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorHandle")
            .field("watching", &self.is_watching())
            .field("running", &self.is_running())
            .finish()
    }
}

impl SupervisorHandle {
    /// Sender into the supervisor mailbox.
    pub fn sender(&self) -> mpsc::Sender<SupervisorEvent> {
        self.tx.clone()
    }

    /// Requests shutdown without going through the mailbox (e.g. from a
    /// Ctrl-C handler). Takes effect even when the mailbox is full.
    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        self.shutdown.clone()
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.as_ref().is_some_and(WatcherHandle::is_active)
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Report a changed file, exactly as the watcher would.
    pub async fn notify_changed(&self, path: impl Into<PathBuf>) -> Result<()> {
        self.send(SupervisorEvent::FileChanged {
            path: path.into(),
            kind: ChangeKind::Modified,
        })
        .await
    }

    /// Ask for a rebuild without a file change.
    pub async fn request_rebuild(&self) -> Result<()> {
        self.send(SupervisorEvent::RebuildRequested {
            reason: TriggerReason::Manual,
        })
        .await
    }

    async fn send(&self, event: SupervisorEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| SupervisorError::Other(anyhow::anyhow!("supervisor is not running")))
    }

    /// Wait until the runtime exits on its own (compile-once mode, or a
    /// shutdown requested through [`SupervisorHandle::shutdown_trigger`]).
    pub async fn wait(&mut self) -> Result<RunSummary> {
        let summary = self.join().await;
        self.stop_watcher().await;
        summary
    }

    /// Stop watching, kill any in-flight build, terminate the child and wait
    /// for the runtime to finish. Idempotent.
    pub async fn stop(&mut self) -> Result<RunSummary> {
        self.stop_watcher().await;

        if self.task.is_some() {
            debug!("requesting supervisor shutdown");
            self.shutdown.fire();
        }

        self.join().await
    }

    async fn stop_watcher(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            watcher.stop().await;
        }
    }

    async fn join(&mut self) -> Result<RunSummary> {
        if let Some(task) = self.task.take() {
            let summary = task.await.map_err(|e| {
                SupervisorError::Other(anyhow::anyhow!("supervisor runtime panicked: {e}"))
            })??;
            self.summary = Some(summary);
        }
        Ok(self.summary.unwrap_or_default())
    }
}

impl Drop for SupervisorHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            debug!("supervisor handle dropped; requesting shutdown");
            self.shutdown.fire();
        }
    }
}
