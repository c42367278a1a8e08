// src/config/validate.rs

use std::path::PathBuf;

use crate::config::model::{
    RawConfigFile, SupervisorConfig, SupervisorSection, DEFAULT_GRACE_PERIOD,
    DEFAULT_MAILBOX_CAPACITY,
};
use crate::errors::{Result, SupervisorError};
use crate::types::parse_duration;
use crate::watch::WatchSet;

impl TryFrom<RawConfigFile> for SupervisorConfig {
    type Error = SupervisorError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let section = raw.supervisor;

        validate_watch_set(&section)?;
        let build_command = require_command(&section.build, "build")?;
        let run_command = require_command(&section.run, "run")?;

        let grace_period = match section.grace_period {
            Some(ref s) => parse_duration(s).map_err(|e| {
                SupervisorError::ConfigError(format!("[supervisor].grace_period: {e}"))
            })?,
            None => DEFAULT_GRACE_PERIOD,
        };

        let mailbox_capacity = section.mailbox_capacity.unwrap_or(DEFAULT_MAILBOX_CAPACITY);
        if mailbox_capacity == 0 {
            return Err(SupervisorError::ConfigError(
                "[supervisor].mailbox_capacity must be >= 1 (got 0)".to_string(),
            ));
        }

        Ok(SupervisorConfig {
            watch: section.watch,
            exclude: section.exclude,
            build_command,
            run_command,
            grace_period,
            mailbox_capacity,
            root: section.root.unwrap_or_else(|| PathBuf::from(".")),
        })
    }
}

fn validate_watch_set(section: &SupervisorSection) -> Result<()> {
    if section.watch.iter().all(|p| p.trim().is_empty()) {
        return Err(SupervisorError::ConfigError(
            "watch set is empty; give at least one glob via [supervisor].watch or --watch"
                .to_string(),
        ));
    }

    WatchSet::new(&section.watch, &section.exclude)
        .map_err(|e| SupervisorError::ConfigError(format!("{e:#}")))?;

    Ok(())
}

fn require_command(value: &Option<String>, key: &str) -> Result<String> {
    match value.as_deref().map(str::trim) {
        Some(cmd) if !cmd.is_empty() => Ok(cmd.to_string()),
        _ => Err(SupervisorError::ConfigError(format!(
            "{key} command is not set; give it via [supervisor].{key} or --{key}"
        ))),
    }
}
