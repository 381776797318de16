// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    let config: RawConfigFile = toml::from_str(&contents)?;
    Ok(config)
}

/// Load and validate a configuration file.
///
/// Relative paths in the result resolve against the directory holding the
/// file.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let raw_config = load_from_path(path)?;
    let config = ConfigFile::try_from(raw_config)?.with_base_dir(config_root_dir(path));
    debug!(
        config = ?path,
        base_dir = ?config.base_dir,
        modules = config.module.len(),
        steps = config.step.len(),
        "loaded configuration"
    );
    Ok(config)
}

/// Absolute directory the config file lives in.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    match config_path.parent() {
        Some(parent) if parent.is_absolute() => parent.to_path_buf(),
        Some(parent) if !parent.as_os_str().is_empty() => cwd.join(parent),
        _ => cwd,
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("incbuild.toml")
}
