//! Configuration validation with range checks.

use std::collections::HashSet;

use crate::error::ConfigError;
use crate::methods::MethodKind;

use super::Config;

/// Deepest partition; level 8 is a 256×256 grid, ~87k cells per method in total.
const MAX_PARTITION_DEPTH: usize = 8;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.processing.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "processing.batch_size must be > 0".into(),
            ));
        }
        if self.processing.queue_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "processing.queue_capacity must be > 0".into(),
            ));
        }
        if self.processing.parallel_workers == 0 {
            return Err(ConfigError::ValidationError(
                "processing.parallel_workers must be > 0".into(),
            ));
        }
        if self.processing.crop_size == Some(0) {
            return Err(ConfigError::ValidationError(
                "processing.crop_size must be > 0".into(),
            ));
        }
        if self.processing.supported_formats.is_empty() {
            return Err(ConfigError::ValidationError(
                "processing.supported_formats must not be empty".into(),
            ));
        }
        if self.pipeline.partition_depth > MAX_PARTITION_DEPTH {
            return Err(ConfigError::ValidationError(format!(
                "pipeline.partition_depth must be <= {MAX_PARTITION_DEPTH}"
            )));
        }
        if self
            .entropy
            .color_weights
            .iter()
            .any(|w| !w.is_finite() || *w < 0.0)
        {
            return Err(ConfigError::ValidationError(
                "entropy.color_weights must be finite and >= 0".into(),
            ));
        }
        if self.entropy.reference_size == 0 {
            return Err(ConfigError::ValidationError(
                "entropy.reference_size must be > 0".into(),
            ));
        }
        if self.methods.is_empty() {
            return Err(ConfigError::ValidationError(
                "methods must name at least one method".into(),
            ));
        }

        let mut seen = HashSet::new();
        for method in &self.methods {
            if !seen.insert(method.name) {
                return Err(ConfigError::ValidationError(format!(
                    "methods lists '{}' more than once",
                    method.name
                )));
            }
            if method.segments == Some(0) {
                return Err(ConfigError::ValidationError(format!(
                    "methods.{}.segments must be > 0",
                    method.name
                )));
            }
            let wavelet_only =
                method.wavelet.is_some() || method.level.is_some() || method.depth.is_some();
            if wavelet_only && method.name != MethodKind::Wavelet {
                return Err(ConfigError::ValidationError(format!(
                    "methods.{}: wavelet, level and depth apply to dwt only",
                    method.name
                )));
            }
        }

        if image::ImageFormat::from_extension(&self.output.image_extension).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "output.image_extension '{}' is not a known image format",
                self.output.image_extension
            )));
        }
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        Ok(())
    }
}
