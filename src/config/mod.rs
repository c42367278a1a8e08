// src/config/mod.rs

//! Configuration loading and validation for relaunch.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk and layer CLI overrides on top (`loader.rs`).
//! - Validate the watch set and commands (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_config, load_from_path};
pub use model::{
    ConfigOverrides, RawConfigFile, SupervisorConfig, SupervisorSection,
    DEFAULT_GRACE_PERIOD, DEFAULT_MAILBOX_CAPACITY,
};
