// src/logging.rs

//! Global `tracing` subscriber for the `relaunch` binary.
//!
//! The filter comes from `--log-level` when given, otherwise from the
//! `RELAUNCH_LOG` directive string (e.g. `relaunch=debug,notify=warn`),
//! otherwise `info`.
//!
//! Logs go to stderr. Stdout belongs to build output and the program.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

use crate::cli::LogLevel;

const LOG_ENV_VAR: &str = "RELAUNCH_LOG";

pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli_level))
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}

fn log_filter(cli_level: Option<LogLevel>) -> EnvFilter {
    if let Some(level) = cli_level {
        return EnvFilter::new(level.as_directive());
    }
    match EnvFilter::try_from_env(LOG_ENV_VAR) {
        Ok(filter) => filter,
        Err(e) => {
            if std::env::var_os(LOG_ENV_VAR).is_some() {
                eprintln!("ignoring invalid {LOG_ENV_VAR}: {e}");
            }
            EnvFilter::new(LogLevel::Info.as_directive())
        }
    }
}
