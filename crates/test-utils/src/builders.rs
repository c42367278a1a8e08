use std::path::{Path, PathBuf};

use relaunch::config::{SupervisorConfig, SupervisorSection};

/// Builder for `SupervisorConfig` to simplify test setup.
///
/// Starts from a valid configuration (`**/*.src`, `true`, `sleep 60`,
/// 100ms grace period) so tests only spell out what they care about.
pub struct SupervisorConfigBuilder {
    section: SupervisorSection,
}

impl SupervisorConfigBuilder {
    pub fn new() -> Self {
        Self {
            section: SupervisorSection {
                watch: vec!["**/*.src".to_string()],
                exclude: vec![],
                build: Some("true".to_string()),
                run: Some("sleep 60".to_string()),
                grace_period: Some("100ms".to_string()),
                mailbox_capacity: None,
                root: None,
            },
        }
    }

    /// Replace the watch list with a single pattern.
    pub fn watch(mut self, pattern: &str) -> Self {
        self.section.watch = vec![pattern.to_string()];
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.section.exclude.push(pattern.to_string());
        self
    }

    pub fn build_cmd(mut self, cmd: &str) -> Self {
        self.section.build = Some(cmd.to_string());
        self
    }

    pub fn run_cmd(mut self, cmd: &str) -> Self {
        self.section.run = Some(cmd.to_string());
        self
    }

    pub fn grace_period(mut self, grace: &str) -> Self {
        self.section.grace_period = Some(grace.to_string());
        self
    }

    pub fn mailbox_capacity(mut self, capacity: usize) -> Self {
        self.section.mailbox_capacity = Some(capacity);
        self
    }

    pub fn root(mut self, root: &Path) -> Self {
        self.section.root = Some(PathBuf::from(root));
        self
    }

    /// The raw section, for validation tests.
    pub fn section(self) -> SupervisorSection {
        self.section
    }

    pub fn build(self) -> SupervisorConfig {
        SupervisorConfig::from_section(self.section)
            .expect("Failed to build valid config from builder")
    }
}

impl Default for SupervisorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
