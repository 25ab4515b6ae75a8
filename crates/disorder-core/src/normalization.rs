//! Reference entropies used to put every method on a comparable scale.
//!
//! A table maps method names to the raw entropy each method produces on a
//! seeded uniform-noise image, shaped like the method's own results. Raw values
//! are divided by their reference element-wise; a scalar reference applies to
//! every element.

use image::{DynamicImage, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::config::{ColorSpace, Config};
use crate::entropy::EntropyCalculator;
use crate::error::ConfigError;
use crate::pipeline::preprocess::Preprocessor;
use crate::pipeline::processor::PartitionedProcessor;
use crate::types::{EntropyValue, ImageIdentity, LoadedImage};

/// Current table format version.
pub const TABLE_VERSION: u32 = 1;

/// How the reference image was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceInfo {
    /// Side of the square noise image
    pub size: u32,
    /// Noise seed
    pub seed: u64,
    /// Partition depth the references were computed at
    pub depth: usize,
    /// Colour space the noise was converted to
    pub color_space: ColorSpace,
}

/// Read-only reference entropies, keyed by method name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationTable {
    pub version: u32,
    pub reference: ReferenceInfo,
    pub methods: BTreeMap<String, EntropyValue>,
}

/// Why a value could not be fully normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degraded {
    /// A reference element was zero
    ZeroReference,
    /// Value and reference shapes differ
    ShapeMismatch,
}

impl NormalizationTable {
    /// Load a stored table.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let fail = |message: String| ConfigError::NormalizationTable {
            path: path.to_path_buf(),
            message,
        };
        let content = std::fs::read_to_string(path).map_err(|e| fail(e.to_string()))?;
        let table: Self = serde_json::from_str(&content).map_err(|e| fail(e.to_string()))?;
        if table.version != TABLE_VERSION {
            return Err(fail(format!(
                "unsupported table version {} (expected {})",
                table.version, TABLE_VERSION
            )));
        }
        Ok(table)
    }

    /// Write the table as pretty JSON.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// Compute references for the configured methods on seeded uniform noise.
    pub fn calibrate(config: &Config) -> Self {
        let size = config.entropy.reference_size;
        let seed = config.entropy.reference_seed;
        let depth = config.pipeline.partition_depth;

        let noise = noise_image(size, seed);
        let loaded = LoadedImage {
            identity: ImageIdentity {
                path: "reference-noise".into(),
                size: 0,
                width: size,
                height: size,
                label: String::new(),
            },
            raw: DynamicImage::ImageRgb8(noise),
        };

        let preprocessor = Preprocessor::new(None, config.color.space);
        let processor =
            PartitionedProcessor::new(config.methods.clone(), depth, config.entropy.color_weights)
                .with_color_space(config.color.space);
        let calculator = EntropyCalculator::unnormalized();
        let scored = calculator.score(processor.process(preprocessor.preprocess(loaded)));

        tracing::info!(
            "Calibrated {} methods on {}x{} noise (seed {}, depth {})",
            scored.results.len(),
            size,
            size,
            seed,
            depth
        );

        Self {
            version: TABLE_VERSION,
            reference: ReferenceInfo {
                size,
                seed,
                depth,
                color_space: config.color.space,
            },
            methods: scored
                .results
                .into_iter()
                .map(|r| (r.method, r.result))
                .collect(),
        }
    }

    /// The table a run should normalize with, or `None` when disabled.
    ///
    /// Loads the configured table, or calibrates one in memory when no path
    /// is configured.
    pub fn resolve(config: &Config) -> Result<Option<Arc<Self>>, ConfigError> {
        if !config.entropy.normalize {
            return Ok(None);
        }
        let table = match config.normalization_table() {
            Some(path) => {
                let table = Self::load(&path)?;
                tracing::info!("Loaded normalization table {:?}", path);
                table
            }
            None => {
                tracing::info!("No normalization table configured, calibrating in memory");
                Self::calibrate(config)
            }
        };
        if table.reference.depth != config.pipeline.partition_depth {
            tracing::warn!(
                "Normalization table was computed at depth {}, run uses depth {}",
                table.reference.depth,
                config.pipeline.partition_depth
            );
        }
        Ok(Some(Arc::new(table)))
    }

    /// Reference for a method.
    pub fn get(&self, method: &str) -> Option<&EntropyValue> {
        self.methods.get(method)
    }
}

/// Uniform RGB noise from a seeded generator.
pub fn noise_image(size: u32, seed: u64) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut img = RgbImage::new(size, size);
    for px in img.pixels_mut() {
        px.0 = [rng.gen(), rng.gen(), rng.gen()];
    }
    img
}

/// Divide `value` by `reference` element-wise.
///
/// Zero references and unmatched elements divide by 1; the first such
/// problem is reported through `degraded`.
pub fn divide(
    value: &EntropyValue,
    reference: &EntropyValue,
    degraded: &mut Option<Degraded>,
) -> EntropyValue {
    match (value, reference) {
        (EntropyValue::Scalar(v), EntropyValue::Scalar(r)) => {
            if *r == 0.0 {
                degraded.get_or_insert(Degraded::ZeroReference);
                EntropyValue::Scalar(*v)
            } else {
                EntropyValue::Scalar(v / r)
            }
        }
        (EntropyValue::List(items), EntropyValue::Scalar(_)) => EntropyValue::List(
            items
                .iter()
                .map(|item| divide(item, reference, degraded))
                .collect(),
        ),
        (EntropyValue::List(items), EntropyValue::List(refs)) => {
            if items.len() != refs.len() {
                degraded.get_or_insert(Degraded::ShapeMismatch);
            }
            EntropyValue::List(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| match refs.get(i) {
                        Some(r) => divide(item, r, degraded),
                        None => item.clone(),
                    })
                    .collect(),
            )
        }
        (EntropyValue::Scalar(_), EntropyValue::List(_)) => {
            degraded.get_or_insert(Degraded::ShapeMismatch);
            value.clone()
        }
    }
}
