//! Disorder Core - batch image entropy pipeline.
//!
//! Disorder measures how "disordered" images are. Every image is scored by a
//! battery of entropy methods (frequency, wavelet, histogram, texture,
//! co-occurrence, adaptive segmentation), optionally at several spatial
//! resolutions, normalized against a seeded noise reference and persisted
//! incrementally so long runs survive interruption.
//!
//! # Architecture
//!
//! ```text
//! Paths → Load → Preprocess → Partition/Transform → Entropy → Queue → entropy_results.json
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use disorder_core::{Config, Pipeline};
//!
//! fn main() -> disorder_core::Result<()> {
//!     let mut config = Config::load()?;
//!     config.processing.source = Some("./images".into());
//!
//!     let summary = Pipeline::new(config)?.run()?;
//!     println!("Scored {} images", summary.succeeded);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod config;
pub mod entropy;
pub mod error;
pub mod math;
pub mod methods;
pub mod normalization;
pub mod output;
pub mod pipeline;
pub mod types;

// Re-exports for convenient access
pub use config::Config;
pub use entropy::EntropyCalculator;
pub use error::{
    ConfigError, DisorderError, OutputError, OutputResult, PipelineError, PipelineResult, Result,
};
pub use methods::{MethodKind, MethodSpec};
pub use normalization::NormalizationTable;
pub use output::DataSaver;
pub use pipeline::{Pipeline, ProgressCallback, ProgressEvent};
pub use types::{sort_by_method, EntropyRecord, EntropyValue, MethodResult, RunSummary};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_pipeline_new_with_defaults() {
        let mut config = Config::default();
        config.entropy.normalize = false;
        let pipeline = Pipeline::new(config).unwrap();
        assert_eq!(pipeline.config().processing.parallel_workers, 4);
    }
}
