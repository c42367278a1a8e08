// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Grace period given to a child between SIGTERM and SIGKILL.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Capacity of the supervisor's event mailbox.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 64;

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [supervisor]
/// watch = ["source/*.cpp"]
/// build = "make -C ./build"
/// run = "./build/wollemi"
/// grace_period = "5s"
/// ```
///
/// Every field is optional at this stage so that CLI flags can fill gaps;
/// [`SupervisorConfig::try_from`] enforces what is actually required.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub supervisor: SupervisorSection,
}

/// `[supervisor]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupervisorSection {
    /// Globs (relative to `root`) whose changes trigger a rebuild.
    #[serde(default)]
    pub watch: Vec<String>,

    /// Globs removed from the watch set.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Build command, run through the platform shell.
    #[serde(default)]
    pub build: Option<String>,

    /// Long-running command started after each successful build.
    #[serde(default)]
    pub run: Option<String>,

    /// Duration string such as `"5s"` or `"500ms"`.
    #[serde(default)]
    pub grace_period: Option<String>,

    /// Bound on queued supervisor events.
    #[serde(default)]
    pub mailbox_capacity: Option<usize>,

    /// Project root. Relative paths are resolved against the config file's
    /// directory by the loader.
    #[serde(default)]
    pub root: Option<PathBuf>,
}

/// Values given on the command line. `Some`/non-empty values replace the
/// corresponding config file entries.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub watch: Vec<String>,
    pub exclude: Vec<String>,
    pub build: Option<String>,
    pub run: Option<String>,
    pub grace_period: Option<String>,
}

impl ConfigOverrides {
    pub fn apply(&self, section: &mut SupervisorSection) {
        if !self.watch.is_empty() {
            section.watch = self.watch.clone();
        }
        if !self.exclude.is_empty() {
            section.exclude = self.exclude.clone();
        }
        if let Some(ref build) = self.build {
            section.build = Some(build.clone());
        }
        if let Some(ref run) = self.run {
            section.run = Some(run.clone());
        }
        if let Some(ref grace) = self.grace_period {
            section.grace_period = Some(grace.clone());
        }
    }
}

/// Validated supervisor configuration.
///
/// Constructed via `SupervisorConfig::try_from(RawConfigFile)` (see
/// `validate.rs`), which guarantees a non-empty, compilable watch set and
/// non-blank commands.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub watch: Vec<String>,
    pub exclude: Vec<String>,
    pub build_command: String,
    pub run_command: String,
    pub grace_period: Duration,
    pub mailbox_capacity: usize,
    pub root: PathBuf,
}

impl SupervisorConfig {
    /// Validate a raw `[supervisor]` section. Shorthand for building a
    /// `RawConfigFile` around it.
    pub fn from_section(section: SupervisorSection) -> crate::errors::Result<Self> {
        Self::try_from(RawConfigFile {
            supervisor: section,
        })
    }
}
