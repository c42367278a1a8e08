// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for running the build command and the
//! long-running child, using `tokio::process::Command`, and reporting back to
//! the runtime via `SupervisorEvent`s.
//!
//! - [`backend`] provides the `ProcessLauncher` trait and the
//!   `RealProcessLauncher` used in production; tests substitute fakes.
//! - [`command`] builds platform shell commands and sends signals.
//! - [`build_runner`] runs one build with captured output.
//! - [`child_runner`] owns the running child and its graceful termination.

pub mod backend;
pub mod build_runner;
pub mod child_runner;
pub mod command;

pub use backend::{LaunchFuture, ProcessLauncher, RealProcessLauncher, Termination};

use crate::errors::SupervisorError;

/// Result of one build command invocation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BuildOutput {
    /// Exit code; `None` if the build was killed by a signal or could not
    /// be started.
    pub code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl BuildOutput {
    pub fn succeeded(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            success: true,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn failed(
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self {
            code,
            success: false,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Convert a failed build into the `BuildFailure` error reported to
    /// callers.
    pub fn into_failure(self) -> SupervisorError {
        SupervisorError::BuildFailure {
            code: self.code,
            stdout: self.stdout,
            stderr: self.stderr,
        }
    }
}
