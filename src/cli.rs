// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

use crate::types::SupervisorMode;

/// Command-line arguments for `relaunch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "relaunch",
    version,
    about = "Rebuild on file changes and restart the built program.",
    long_about = None
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to the config file (TOML).
    ///
    /// If omitted, `Relaunch.toml` in the current working directory is used
    /// when it exists.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<String>,

    /// Glob of files to watch (repeatable). Replaces the config list.
    #[arg(short = 'w', long = "watch", value_name = "GLOB", global = true)]
    pub watch: Vec<String>,

    /// Glob of files to ignore (repeatable). Replaces the config list.
    #[arg(short = 'x', long = "exclude", value_name = "GLOB", global = true)]
    pub exclude: Vec<String>,

    /// Build command, run through the platform shell.
    #[arg(short = 'b', long, value_name = "CMD", global = true)]
    pub build: Option<String>,

    /// Command to (re)start after every successful build.
    #[arg(short = 'r', long, value_name = "CMD", global = true)]
    pub run: Option<String>,

    /// How long a child gets to exit after SIGTERM before it is killed
    /// (e.g. `500ms`, `5s`).
    #[arg(long, value_name = "DURATION", global = true)]
    pub grace_period: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `RELAUNCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the resolved config, but don't run anything.
    #[arg(long, global = true)]
    pub dry_run: bool,
}

impl CliArgs {
    /// Mode selected by the subcommand; `watch` when none is given.
    pub fn mode(&self) -> SupervisorMode {
        match self.command {
            Some(Command::Compile) => SupervisorMode::CompileOnce,
            Some(Command::Watch) | None => SupervisorMode::Watch,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Run one build cycle (build + spawn) and exit when the program exits.
    Compile,
    /// Watch for changes, starting with one compile cycle (default).
    Watch,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Filter directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
