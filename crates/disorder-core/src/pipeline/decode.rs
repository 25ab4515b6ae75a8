//! Image loading with validation and format detection.

use image::{DynamicImage, GenericImageView};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::LimitsConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::types::{ImageIdentity, LoadedImage};

use super::progress::{report, ProgressCallback, ProgressEvent};
use super::validate::Validator;

/// Opens batches of paths into owned image records.
pub struct ImageLoader {
    validator: Validator,
}

/// Outcome of loading one batch.
pub struct LoadedBatch {
    /// Successfully decoded images, in path order
    pub images: Vec<LoadedImage>,
    /// Images dropped from the batch
    pub failures: Vec<PipelineError>,
}

impl ImageLoader {
    pub fn new(limits: LimitsConfig) -> Self {
        Self {
            validator: Validator::new(limits),
        }
    }

    /// Load `paths` in order.
    ///
    /// Images that fail validation or decoding are logged and removed from
    /// the batch. Progress is reported after every path.
    pub fn load_batch(
        &self,
        paths: &[PathBuf],
        progress: Option<&ProgressCallback>,
    ) -> LoadedBatch {
        let start = Instant::now();
        let mut images = Vec::with_capacity(paths.len());
        let mut failures = Vec::new();

        for (i, path) in paths.iter().enumerate() {
            match self.load(path) {
                Ok(image) => images.push(image),
                Err(e) => {
                    tracing::error!("Dropping {:?}: {}", path, e);
                    report(
                        progress,
                        ProgressEvent::Failed {
                            path: path.clone(),
                            reason: e.to_string(),
                        },
                    );
                    failures.push(e);
                }
            }
            report(
                progress,
                ProgressEvent::Loaded {
                    completed: i + 1,
                    batch_len: paths.len(),
                    elapsed: start.elapsed(),
                },
            );
        }

        tracing::debug!(
            "Loaded {}/{} images in {:?}",
            images.len(),
            paths.len(),
            start.elapsed()
        );
        LoadedBatch { images, failures }
    }

    /// Validate and decode a single image.
    pub fn load(&self, path: &Path) -> PipelineResult<LoadedImage> {
        let size = self.validator.validate(path)?;
        let raw = decode_file(path)?;
        let (width, height) = raw.dimensions();
        self.validator.check_dimensions(path, width, height)?;

        Ok(LoadedImage {
            identity: ImageIdentity {
                path: path.to_path_buf(),
                size,
                width,
                height,
                label: ImageIdentity::label_for(path),
            },
            raw,
        })
    }
}

/// Decode by content, falling back to the extension when sniffing fails.
fn decode_file(path: &Path) -> PipelineResult<DynamicImage> {
    let reader = image::ImageReader::open(path)
        .map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: format!("Cannot open file: {}", e),
        })?
        .with_guessed_format()
        .map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: format!("Cannot detect image format: {}", e),
        })?;

    if reader.format().is_none() {
        return Err(PipelineError::UnsupportedFormat {
            path: path.to_path_buf(),
            format: path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("unknown")
                .to_string(),
        });
    }

    reader.decode().map_err(|e| PipelineError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
