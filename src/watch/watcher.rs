// src/watch/watcher.rs

use std::path::PathBuf;

use anyhow::Result;
use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::engine::SupervisorEvent;
use crate::types::ChangeKind;
use crate::watch::path_utils::relative_str;
use crate::watch::patterns::WatchSet;

/// Handle for the filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive. Dropping this handle (or
/// calling [`WatcherHandle::stop`]) removes the watch subscription; the
/// forwarding task then ends on its own.
pub struct WatcherHandle {
    inner: Option<RecommendedWatcher>,
    forwarder: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("active", &self.is_active())
            .finish()
    }
}

impl WatcherHandle {
    /// True while the notify subscription exists.
    pub fn is_active(&self) -> bool {
        self.inner.is_some()
    }

    /// Drop the subscription and wait for the forwarding task to finish.
    pub async fn stop(&mut self) {
        if self.inner.take().is_some() {
            debug!("file watcher stopped");
        }
        if let Some(forwarder) = self.forwarder.take() {
            let _ = forwarder.await;
        }
    }
}

/// Spawn a filesystem watcher that observes `root` recursively and sends
/// `SupervisorEvent::FileChanged` for every changed path matching
/// `watch_set`.
///
/// - `root` is the project root against which all glob patterns are evaluated.
/// - `mailbox` is the supervisor's bounded event channel. When it is full the
///   change is dropped: a full mailbox already holds changes that guarantee
///   a follow-up rebuild.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    watch_set: WatchSet,
    mailbox: mpsc::Sender<SupervisorEvent>,
) -> Result<WatcherHandle> {
    let root = root.into();
    // Canonicalize once so we have a stable base path.
    let root = root.canonicalize().unwrap_or_else(|_| root.clone());

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    // Closure called synchronously by notify whenever an event arrives.
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                // Fails only once the forwarding task is gone.
                let _ = event_tx.send(event);
            }
            Err(err) => {
                warn!("file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;

    info!(root = ?root, patterns = ?watch_set.patterns(), "file watcher started");

    let forwarder = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            trace!(?event, "received notify event");

            let Some(kind) = classify_event_kind(&event.kind) else {
                continue;
            };

            for path in event.paths {
                let Some(rel) = relative_str(&root, &path) else {
                    debug!(?path, ?root, "could not relativize path; ignoring");
                    continue;
                };

                if !watch_set.matches(&rel) {
                    continue;
                }

                debug!(path = %rel, %kind, "watched file changed");

                match mailbox.try_send(SupervisorEvent::FileChanged { path, kind }) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        debug!(path = %rel, "mailbox full; change already covered by a queued trigger");
                    }
                    Err(TrySendError::Closed(_)) => {
                        debug!("supervisor mailbox closed; watcher loop ending");
                        return;
                    }
                }
            }
        }
        debug!("file watcher loop ended");
    });

    Ok(WatcherHandle {
        inner: Some(watcher),
        forwarder: Some(forwarder),
    })
}

/// Map a notify event kind to a [`ChangeKind`].
///
/// Access events (open, read, close) return `None`. Writes are already
/// reported as modify events, and builds reading the sources would otherwise
/// trigger themselves.
pub fn classify_event_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Access(_) => None,
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeKind::Renamed),
        EventKind::Modify(_) => Some(ChangeKind::Modified),
        EventKind::Remove(_) => Some(ChangeKind::Removed),
        EventKind::Any | EventKind::Other => Some(ChangeKind::Other),
    }
}
