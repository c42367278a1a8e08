// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod supervisor;
pub mod types;
pub mod watch;

use std::path::Path;

use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{load_config, ConfigOverrides, SupervisorConfig};
use crate::engine::RunSummary;
use crate::errors::Result;
use crate::supervisor::Supervisor;
use crate::types::SupervisorMode;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (file + CLI overrides)
/// - the supervisor (runtime, launcher, optional file watcher)
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<RunSummary> {
    let overrides = ConfigOverrides {
        watch: args.watch.clone(),
        exclude: args.exclude.clone(),
        build: args.build.clone(),
        run: args.run.clone(),
        grace_period: args.grace_period.clone(),
    };
    let cfg = load_config(args.config.as_deref().map(Path::new), &overrides)?;
    let mode = args.mode();

    if args.dry_run {
        print_dry_run(&cfg, mode);
        return Ok(RunSummary {
            mode,
            ..RunSummary::default()
        });
    }

    let mut handle = Supervisor::new(cfg).mode(mode).start()?;

    // Ctrl-C → graceful shutdown.
    {
        let shutdown = handle.shutdown_trigger();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Ctrl+C received; shutting down");
            shutdown.fire();
        });
    }

    let summary = handle.wait().await?;
    debug!(?summary, "supervisor finished");
    Ok(summary)
}

/// Simple dry-run output: print the resolved configuration.
fn print_dry_run(cfg: &SupervisorConfig, mode: SupervisorMode) {
    println!("relaunch dry-run");
    println!("  mode: {mode:?}");
    println!("  root: {}", cfg.root.display());
    println!("  watch: {:?}", cfg.watch);
    if !cfg.exclude.is_empty() {
        println!("  exclude: {:?}", cfg.exclude);
    }
    println!("  build: {}", cfg.build_command);
    println!("  run: {}", cfg.run_command);
    println!("  grace_period: {:?}", cfg.grace_period);
    println!("  mailbox_capacity: {}", cfg.mailbox_capacity);

    debug!("dry-run complete (no execution)");
}
