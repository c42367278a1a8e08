// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Compiling `watch` / `exclude` glob patterns into a [`WatchSet`].
//! - Wiring up a cross-platform filesystem watcher (`notify`) that turns
//!   matching filesystem events into `SupervisorEvent::FileChanged`.
//!
//! It does **not** know about builds or processes.

pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use patterns::WatchSet;
pub use watcher::{classify_event_kind, spawn_watcher, WatcherHandle};
