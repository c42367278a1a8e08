// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigOverrides, RawConfigFile, SupervisorConfig};
use crate::errors::{Result, SupervisorError};

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_config`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        SupervisorError::ConfigError(format!("cannot read config file {}: {e}", path.display()))
    })?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load, merge CLI overrides and validate.
///
/// - `explicit_path = Some(p)`: `p` must exist.
/// - `explicit_path = None`: [`default_config_path`] is used if it exists,
///   otherwise the configuration comes from `overrides` alone.
///
/// The project root defaults to the config file's directory (or the current
/// directory when no file is used); a relative `root` in the file is resolved
/// against that directory.
pub fn load_config(
    explicit_path: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<SupervisorConfig> {
    let (mut raw, base_dir) = match explicit_path {
        Some(path) => (load_from_path(path)?, config_root_dir(path)),
        None => {
            let default = default_config_path();
            if default.is_file() {
                (load_from_path(&default)?, config_root_dir(&default))
            } else {
                debug!(path = ?default, "no default config file; using CLI values only");
                (RawConfigFile::default(), current_dir())
            }
        }
    };

    overrides.apply(&mut raw.supervisor);

    let root = match raw.supervisor.root.take() {
        Some(root) if root.is_absolute() => root,
        Some(root) => base_dir.join(root),
        None => base_dir,
    };
    raw.supervisor.root = Some(root);

    SupervisorConfig::try_from(raw)
}

/// Default config location: `Relaunch.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Relaunch.toml")
}

/// Figure out a sensible project root for a config path.
///
/// - If the config path has a non-empty parent (e.g. "configs/Relaunch.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Relaunch.toml" (parent = ""),
///   we fall back to the current working directory.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => current_dir(),
    }
}

fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
