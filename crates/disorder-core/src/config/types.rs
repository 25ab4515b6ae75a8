//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::math::DEFAULT_COLOR_WEIGHTS;
use crate::methods::{MethodKind, MethodSpec, WaveletKind, WaveletLevel};

/// Input enumeration and batching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Image file or directory tree to process
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,

    /// Extension allow-list (case-insensitive)
    pub supported_formats: Vec<String>,

    /// Paths loaded per batch
    pub batch_size: usize,

    /// Scored records held in memory before a flush
    pub queue_capacity: usize,

    /// Concurrent image workers in parallel mode
    pub parallel_workers: usize,

    /// Process only the first N paths
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncate: Option<usize>,

    /// Fixed square crop side; the shorter image side when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop_size: Option<u32>,

    /// Skip paths already recorded in the destination
    pub resume: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            source: None,
            supported_formats: ["jpg", "jpeg", "png", "bmp", "tif", "tiff", "gif", "webp"]
                .into_iter()
                .map(String::from)
                .collect(),
            batch_size: 150,
            queue_capacity: 50,
            parallel_workers: 4,
            truncate: None,
            crop_size: None,
            resume: true,
        }
    }
}

/// How images are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One image at a time, records saved in path order
    #[default]
    Sequential,
    /// Worker pool; saved order follows completion
    Parallel,
}

/// Pipeline scheduling and partitioning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Execution model
    pub mode: ExecutionMode,

    /// Deepest partition level; level L splits into 2^L × 2^L cells
    pub partition_depth: usize,
}

/// Colour space applied by the preprocessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    #[default]
    Rgb,
    Hsb,
    Ycbcr,
}

impl std::str::FromStr for ColorSpace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rgb" => Ok(Self::Rgb),
            "hsb" | "hsv" => Ok(Self::Hsb),
            "ycbcr" => Ok(Self::Ycbcr),
            other => Err(format!("unknown colour space '{other}'")),
        }
    }
}

/// Colour settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub space: ColorSpace,
}

/// Entropy reduction and normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntropyConfig {
    /// Weights projecting three-channel fields onto one
    pub color_weights: [f64; 3],

    /// Divide raw entropies by the reference table
    pub normalize: bool,

    /// Stored reference table; calibrated in memory when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalization_table: Option<PathBuf>,

    /// Side of the square noise image used for calibration
    pub reference_size: u32,

    /// Seed of the calibration noise
    pub reference_seed: u64,
}

impl Default for EntropyConfig {
    fn default() -> Self {
        Self {
            color_weights: DEFAULT_COLOR_WEIGHTS,
            normalize: true,
            normalization_table: None,
            reference_size: 128,
            reference_seed: 42,
        }
    }
}

/// How records reach `entropy_results.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistMode {
    /// Whole array written once at the end
    Bulk,
    /// Records spliced in before the closing bracket at every flush
    #[default]
    Append,
    /// JSON lines at every flush, compacted into the array at the end
    Journal,
}

impl std::str::FromStr for PersistMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bulk" => Ok(Self::Bulk),
            "append" => Ok(Self::Append),
            "journal" => Ok(Self::Journal),
            other => Err(format!("unknown output mode '{other}'")),
        }
    }
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving `entropy_results.json` and exported images
    pub destination: PathBuf,

    /// Persistence mode
    pub mode: PersistMode,

    /// Export each processed image as `image_{index}.{ext}`
    pub save_images: bool,

    /// Extension (and format) of exported images
    pub image_extension: String,

    /// Pretty-print the results array
    pub pretty: bool,

    /// Open the destination in the file manager when the run completes
    pub reveal: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            destination: PathBuf::from("./entropy_results"),
            mode: PersistMode::Append,
            save_images: true,
            image_extension: "bmp".to_string(),
            pretty: false,
            reveal: false,
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum file size in megabytes
    pub max_file_size_mb: u64,

    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 100,
            max_image_dimension: 10000,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Method battery used when none is configured.
pub fn default_methods() -> Vec<MethodSpec> {
    let mut methods: Vec<MethodSpec> = [
        MethodKind::Laplace,
        MethodKind::JointRedGreen,
        MethodKind::Texture,
        MethodKind::TextureGabor,
        MethodKind::ColorCooccurrence,
        MethodKind::Frequency,
        MethodKind::Naive,
    ]
    .into_iter()
    .map(MethodSpec::new)
    .collect();
    methods.push(MethodSpec {
        wavelet: Some(WaveletKind::Db1),
        level: Some(WaveletLevel::Only(1)),
        ..MethodSpec::new(MethodKind::Wavelet)
    });
    methods
}
