// src/errors.rs

//! Crate-wide error taxonomy.
//!
//! Only `ConfigError` is fatal. Build failures, spawn failures and termination
//! timeouts are reported as notices and the supervisor keeps running.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Build failed (exit code {}):\n{stderr}", display_code(.code))]
    BuildFailure {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Failed to spawn `{command}`: {source}")]
    ProcessSpawnError {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Process {pid} did not exit within {grace:?}; killed")]
    TerminationTimeout { pid: u32, grace: Duration },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("File watch error: {0}")]
    WatchError(#[from] notify::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "none, terminated by signal".to_string(),
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SupervisorError>;
