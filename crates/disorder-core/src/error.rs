//! Error types for the Disorder entropy pipeline.
//!
//! Errors are split by how the pipeline reacts to them: configuration errors
//! abort the run, per-image pipeline errors drop one image and continue, and
//! output errors abort because the destination can no longer be trusted.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for Disorder operations.
#[derive(Error, Debug)]
pub enum DisorderError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Per-image pipeline errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Persistence errors
    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors. All of them are fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// Method name outside the supported vocabulary
    #[error("Unsupported entropy method '{0}'")]
    UnsupportedMethod(String),

    /// Source root is neither a directory nor a supported image file
    #[error("Invalid source root {path}: {reason}")]
    InvalidRoot { path: PathBuf, reason: String },

    /// Normalization table could not be loaded
    #[error("Cannot load normalization table {path}: {message}")]
    NormalizationTable { path: PathBuf, message: String },
}

/// Pipeline processing errors for a single image.
///
/// These never abort a run: the image is logged and dropped from its batch.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Image decoding failed
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// File exceeds size limit
    #[error("File too large: {path} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        path: PathBuf,
        size_mb: u64,
        max_mb: u64,
    },

    /// Image dimensions exceed limit
    #[error("Image too large: {path} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        path: PathBuf,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// Unsupported image format
    #[error("Unsupported format for {path}: {format}")]
    UnsupportedFormat { path: PathBuf, format: String },

    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
}

impl PipelineError {
    /// Path of the image the error belongs to.
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::Decode { path, .. }
            | Self::FileTooLarge { path, .. }
            | Self::ImageTooLarge { path, .. }
            | Self::UnsupportedFormat { path, .. }
            | Self::FileNotFound(path) => path,
        }
    }
}

/// Errors raised while persisting results.
#[derive(Error, Debug)]
pub enum OutputError {
    /// The existing results document is not a well-formed JSON array
    #[error("Malformed results file {path}: {message}")]
    Malformed { path: PathBuf, message: String },

    /// Filesystem failure while reading existing results
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Filesystem failure while writing results
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Record serialization failed
    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Convenience type alias for Disorder results.
pub type Result<T> = std::result::Result<T, DisorderError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Convenience type alias for persistence results.
pub type OutputResult<T> = std::result::Result<T, OutputError>;
