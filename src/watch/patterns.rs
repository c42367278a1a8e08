// src/watch/patterns.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::watch::path_utils::normalize_pattern;

/// Compiled watch/exclude glob patterns.
///
/// Patterns are relative to the project root, and the watcher passes relative
/// paths (e.g. `"source/main.cpp"`) into [`WatchSet::matches`].
///
/// `*` and `?` never match a path separator, so `source/*.cpp` only covers
/// files directly inside `source/`. Use `**` to recurse.
#[derive(Clone)]
pub struct WatchSet {
    patterns: Vec<String>,
    watch_set: GlobSet,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for WatchSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchSet")
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

impl WatchSet {
    /// Compile a watch set. Blank patterns are skipped; an invalid glob is an
    /// error naming the offending pattern.
    pub fn new(watch: &[String], exclude: &[String]) -> Result<Self> {
        let patterns: Vec<String> = watch
            .iter()
            .map(|p| normalize_pattern(p))
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();

        let watch_set = build_globset(&patterns).context("building watch globset")?;

        let excludes: Vec<String> = exclude
            .iter()
            .map(|p| normalize_pattern(p))
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();

        let exclude_set = if excludes.is_empty() {
            None
        } else {
            Some(build_globset(&excludes).context("building exclude globset")?)
        };

        Ok(Self {
            patterns,
            watch_set,
            exclude_set,
        })
    }

    /// Normalised include patterns.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Returns true if a change to `rel_path` (relative to the project root)
    /// should trigger a rebuild.
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.watch_set.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

/// Build a GlobSet from simple string patterns.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = GlobBuilder::new(pat)
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
