//! Configuration management for Disorder.
//!
//! Configuration is loaded from the platform config directory with defaults
//! for every field, so an empty file is a valid configuration.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use crate::methods::MethodSpec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for Disorder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Input enumeration and batching
    pub processing: ProcessingConfig,

    /// Scheduling and partitioning
    pub pipeline: PipelineConfig,

    /// Colour space conversion
    pub color: ColorConfig,

    /// Entropy reduction and normalization
    pub entropy: EntropyConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Output settings
    pub output: OutputConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Ordered method battery
    pub methods: Vec<MethodSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            processing: ProcessingConfig::default(),
            pipeline: PipelineConfig::default(),
            color: ColorConfig::default(),
            entropy: EntropyConfig::default(),
            limits: LimitsConfig::default(),
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
            methods: default_methods(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.disorder.disorder/config.toml
    /// - Linux: ~/.config/disorder/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\disorder\config\config.toml
    ///
    /// Falls back to ~/.disorder/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "disorder", "disorder")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".disorder").join("config.toml")
            })
    }

    /// Resolved source path (with ~ expansion).
    pub fn source(&self) -> Option<PathBuf> {
        self.processing.source.as_deref().map(expand)
    }

    /// Resolved destination directory (with ~ expansion).
    pub fn destination(&self) -> PathBuf {
        expand(&self.output.destination)
    }

    /// Resolved normalization table path (with ~ expansion).
    pub fn normalization_table(&self) -> Option<PathBuf> {
        self.entropy.normalization_table.as_deref().map(expand)
    }

    /// Method names in configured order.
    pub fn method_names(&self) -> Vec<String> {
        self.methods.iter().map(|m| m.name.to_string()).collect()
    }

    /// Check configuration values; called by every loader.
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate()
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

fn expand(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&path_str).into_owned())
}
