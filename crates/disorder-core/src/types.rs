//! Core data types for the Disorder entropy pipeline.
//!
//! An image moves through the pipeline as a sequence of owned stage records.
//! Each stage consumes the previous record by value, so the raw and
//! preprocessed buffers are dropped as soon as the next stage has used them:
//!
//! ```text
//! LoadedImage → PreprocessedImage → TransformedImage → ScoredImage → EntropyRecord
//! ```

use image::DynamicImage;
use ndarray::Array3;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::methods::MethodSpec;

/// Identity of a source image, carried unchanged through every stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageIdentity {
    /// Path to the source file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Pixel dimensions of the decoded image
    pub width: u32,
    pub height: u32,
    /// Immediate parent directory name
    pub label: String,
}

impl ImageIdentity {
    /// Derive the label for a path from its immediate parent directory name.
    pub fn label_for(path: &Path) -> String {
        path.parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// A decoded image that still owns its raw pixel buffer.
pub struct LoadedImage {
    pub identity: ImageIdentity,
    pub raw: DynamicImage,
}

/// A square, 3-channel, colour-converted H×W×3 array.
pub struct PreprocessedImage {
    pub identity: ImageIdentity,
    pub pixels: Array3<f64>,
}

/// Unnormalized entropy of every cell of one level: `[row][col]`.
pub type CellGrid = Vec<Vec<EntropyValue>>;

/// Unnormalized cell entropies of one method: `[level][row][col]`.
pub type PartitionedOutput = Vec<CellGrid>;

/// Per-method cell entropies for one image, in configured method order.
///
/// Each cell is reduced as soon as it is transformed, so only one transform
/// output is alive at a time.
pub struct MethodOutput {
    pub spec: MethodSpec,
    pub levels: PartitionedOutput,
}

/// An image whose cells have been transformed and reduced by every configured method.
pub struct TransformedImage {
    pub identity: ImageIdentity,
    pub outputs: Vec<MethodOutput>,
}

/// An image reduced to its ordered entropy results.
#[derive(Debug, Clone)]
pub struct ScoredImage {
    pub identity: ImageIdentity,
    pub results: Vec<MethodResult>,
}

/// An entropy measurement: a number, or a nested list of them.
///
/// Scalars appear for unpartitioned methods; lists carry `[level][row][col]`
/// grids and per-decomposition-level wavelet values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntropyValue {
    Scalar(f64),
    List(Vec<EntropyValue>),
}

impl EntropyValue {
    /// The scalar value, if this is not a list.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            Self::List(_) => None,
        }
    }

    /// All scalars in depth-first order.
    pub fn flatten(&self) -> Vec<f64> {
        let mut out = Vec::new();
        self.collect_into(&mut out);
        out
    }

    fn collect_into(&self, out: &mut Vec<f64>) {
        match self {
            Self::Scalar(v) => out.push(*v),
            Self::List(items) => items.iter().for_each(|i| i.collect_into(out)),
        }
    }
}

/// Result of one method for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodResult {
    pub method: String,
    pub result: EntropyValue,
}

/// One element of the persisted results array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntropyRecord {
    /// Source file path
    pub path: PathBuf,

    /// File size in bytes
    pub size: u64,

    /// `[width, height]`
    #[serde(rename = "pixel size")]
    pub pixel_size: [u32; 2],

    /// Parent directory name
    pub label: String,

    /// Ordered method results
    pub entropy_results: Vec<MethodResult>,
}

impl From<ScoredImage> for EntropyRecord {
    fn from(scored: ScoredImage) -> Self {
        let ScoredImage { identity, results } = scored;
        Self {
            path: identity.path,
            size: identity.size,
            pixel_size: [identity.width, identity.height],
            label: identity.label,
            entropy_results: results,
        }
    }
}

impl EntropyRecord {
    /// Scalar result of a method, if present and scalar.
    pub fn scalar(&self, method: &str) -> Option<f64> {
        self.entropy_results
            .iter()
            .find(|r| r.method == method)
            .and_then(|r| r.result.as_scalar())
    }
}

/// Order records by the scalar result of `method` (ascending). Records
/// without a scalar result for that method sort last.
pub fn sort_by_method(records: &mut [EntropyRecord], method: &str) {
    records.sort_by(|a, b| {
        let a = a.scalar(method).unwrap_or(f64::INFINITY);
        let b = b.scalar(method).unwrap_or(f64::INFINITY);
        a.total_cmp(&b)
    });
}

/// Statistics for a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunSummary {
    /// Images scored successfully in this run
    pub succeeded: usize,

    /// Images dropped because they could not be loaded
    pub failed: usize,

    /// Images skipped because the destination already held them
    pub skipped: usize,

    /// Records persisted in this run
    pub records_written: usize,

    /// Processing rate in images per second
    pub images_per_second: f64,

    /// Total processing time in seconds
    pub total_seconds: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(path: &str, hist: f64) -> EntropyRecord {
        EntropyRecord {
            path: PathBuf::from(path),
            size: 2048,
            pixel_size: [8, 8],
            label: "forest".to_string(),
            entropy_results: vec![MethodResult {
                method: "hist".to_string(),
                result: EntropyValue::Scalar(hist),
            }],
        }
    }

    #[test]
    fn test_record_json_shape() {
        let json = serde_json::to_string(&sample_record("/data/forest/a.png", 1.5)).unwrap();
        assert!(json.contains("\"pixel size\":[8,8]"));
        assert!(json.contains("\"label\":\"forest\""));
        assert!(json.contains("{\"method\":\"hist\",\"result\":1.5}"));
    }

    #[test]
    fn test_entropy_value_nested_roundtrip() {
        let value = EntropyValue::List(vec![
            EntropyValue::List(vec![EntropyValue::List(vec![EntropyValue::Scalar(0.5)])]),
            EntropyValue::List(vec![
                EntropyValue::List(vec![EntropyValue::Scalar(0.1), EntropyValue::Scalar(0.2)]),
                EntropyValue::List(vec![EntropyValue::Scalar(0.3), EntropyValue::Scalar(0.4)]),
            ]),
        ]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, "[[[0.5]],[[0.1,0.2],[0.3,0.4]]]");
        let parsed: EntropyValue = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, value);
        assert_eq!(parsed.flatten(), vec![0.5, 0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_label_for_uses_parent_directory() {
        assert_eq!(
            ImageIdentity::label_for(Path::new("/data/city/img_01.png")),
            "city"
        );
        assert_eq!(ImageIdentity::label_for(Path::new("img.png")), "");
    }

    #[test]
    fn test_sort_by_method() {
        let mut records = vec![
            sample_record("c.png", 3.0),
            sample_record("a.png", 1.0),
            sample_record("b.png", 2.0),
        ];
        sort_by_method(&mut records, "hist");
        let order: Vec<_> = records.iter().map(|r| r.path.clone()).collect();
        assert_eq!(
            order,
            vec![
                PathBuf::from("a.png"),
                PathBuf::from("b.png"),
                PathBuf::from("c.png")
            ]
        );
    }
}
