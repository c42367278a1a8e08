// src/engine/queue.rs

use std::path::PathBuf;

use tracing::debug;

/// A rebuild that is waiting for the current build to finish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRebuild {
    /// How many triggers were merged into this rebuild.
    pub triggers: usize,
    /// Most recent changed path, if the trigger came from the watcher.
    pub last_path: Option<PathBuf>,
}

/// Holds at most one pending rebuild.
///
/// Triggers that arrive while a build is in flight are coalesced: the first
/// one creates the pending entry, every later one only bumps its counter.
/// When the build completes the runtime drains the entry and starts exactly
/// one follow-up cycle, no matter how many triggers were recorded.
#[derive(Debug, Default)]
pub struct RebuildQueue {
    pending: Option<PendingRebuild>,
}

impl RebuildQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no rebuild is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_none()
    }

    /// Number of triggers merged into the pending rebuild (0 if none).
    pub fn pending_triggers(&self) -> usize {
        self.pending.as_ref().map_or(0, |p| p.triggers)
    }

    /// Record a trigger that arrived while a build is in progress.
    pub fn record_trigger(&mut self, path: Option<PathBuf>) {
        match self.pending.as_mut() {
            Some(pending) => {
                pending.triggers += 1;
                if path.is_some() {
                    pending.last_path = path;
                }
                debug!(
                    triggers = pending.triggers,
                    "coalesced trigger into pending rebuild"
                );
            }
            None => {
                debug!(?path, "queued follow-up rebuild");
                self.pending = Some(PendingRebuild {
                    triggers: 1,
                    last_path: path,
                });
            }
        }
    }

    /// Take the pending rebuild, leaving the queue empty.
    pub fn drain_pending(&mut self) -> Option<PendingRebuild> {
        self.pending.take()
    }

    /// Forget any pending rebuild (used on shutdown).
    pub fn clear(&mut self) {
        self.pending = None;
    }
}
