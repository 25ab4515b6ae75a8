//! Command implementations for the `disorder` binary.

pub mod calibrate;
pub mod config;
pub mod process;
mod reveal;

use disorder_core::Config;
use std::path::Path;

/// Load configuration from an explicit file, or the default location.
///
/// A missing default config file yields the built-in defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Config::load_from(path)?
        }
        None => Config::load()?,
    };
    Ok(config)
}
