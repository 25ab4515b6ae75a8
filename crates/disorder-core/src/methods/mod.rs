//! Entropy method registry.
//!
//! Every method is a [`MethodKind`] variant resolved through a static
//! [`Strategy`] table: a transform applied to each partition cell and a
//! reduction that turns the transform output into an entropy value.
//!
//! | name              | transform                                   |
//! |-------------------|---------------------------------------------|
//! | `dft`             | 2D Fourier magnitude per channel            |
//! | `dwt`             | multi-level 2D wavelet decomposition        |
//! | `naive`           | pixel passthrough                           |
//! | `hist`            | 4 bits/channel interleaved histogram        |
//! | `laplace`         | 6-neighbour 3D Laplacian                    |
//! | `joint_red_green` | 256×256 joint probability of channels 0, 1  |
//! | `joint_all`       | 256³ joint probability of all channels      |
//! | `lbp`             | uniform local binary pattern histogram      |
//! | `lbp_gabor`       | Gabor response histogram                    |
//! | `adapt`           | SLIC superpixel histograms                  |
//! | `RGBCM`           | per-channel co-occurrence, 4 angles         |

pub mod cooccurrence;
pub mod frequency;
pub mod histogram;
pub mod laplace;
pub mod segment;
pub mod texture;
pub mod wavelet;

use ndarray::{Array3, ArrayView3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::math::{probability_entropy, project_channels, shannon_entropy};
use crate::types::EntropyValue;

pub use wavelet::{WaveletKind, WaveletLevel};

/// The fixed method vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MethodKind {
    Frequency,
    Wavelet,
    Naive,
    Histogram,
    Laplace,
    JointRedGreen,
    JointAll,
    Texture,
    TextureGabor,
    Adaptive,
    ColorCooccurrence,
}

impl MethodKind {
    /// Every method, in registry order.
    pub const ALL: [MethodKind; 11] = [
        Self::Frequency,
        Self::Wavelet,
        Self::Naive,
        Self::Histogram,
        Self::Laplace,
        Self::JointRedGreen,
        Self::JointAll,
        Self::Texture,
        Self::TextureGabor,
        Self::Adaptive,
        Self::ColorCooccurrence,
    ];

    /// Name used in configuration and in the results file.
    pub fn name(self) -> &'static str {
        self.strategy().name
    }

    /// Whether the transform bins channel values into 8-bit levels.
    pub fn bins_levels(self) -> bool {
        matches!(
            self,
            Self::Histogram | Self::JointRedGreen | Self::JointAll | Self::ColorCooccurrence
        )
    }

    /// Transform and reduction for this method.
    pub fn strategy(self) -> &'static Strategy {
        &STRATEGIES[self as usize]
    }
}

impl FromStr for MethodKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| ConfigError::UnsupportedMethod(s.to_string()))
    }
}

impl TryFrom<String> for MethodKind {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MethodKind> for String {
    fn from(kind: MethodKind) -> Self {
        kind.name().to_string()
    }
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A configured method: its kind plus optional parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodSpec {
    /// Method name from the fixed vocabulary
    pub name: MethodKind,

    /// Wavelet family (`dwt` only, default `db1`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wavelet: Option<WaveletKind>,

    /// Retained decomposition level, `"all"` or a level ≥ 1 (`dwt` only, default 1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<WaveletLevel>,

    /// Decomposition depth (`dwt` only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,

    /// Target superpixel count (`adapt` only, default 100)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segments: Option<usize>,
}

impl MethodSpec {
    /// A method with default parameters.
    pub fn new(name: MethodKind) -> Self {
        Self {
            name,
            wavelet: None,
            level: None,
            depth: None,
            segments: None,
        }
    }

    /// Parse a method name into a default-parameter spec.
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(name.parse()?))
    }

    /// Transform one partition cell.
    pub fn transform(&self, cell: ArrayView3<'_, f64>) -> Transformed {
        (self.name.strategy().transform)(cell, self)
    }

    /// Reduce one transformed cell to a raw (unnormalized) entropy value.
    pub fn reduce(&self, transformed: &Transformed, ctx: &ReduceContext) -> EntropyValue {
        (self.name.strategy().reduce)(transformed, ctx)
    }
}

/// Transform output of a single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Transformed {
    /// H×W×C field; three trailing channels are projected with the channel weights
    Field(Array3<f64>),

    /// Non-negative magnitudes such as histogram counts
    Magnitudes(Vec<f64>),

    /// Already-normalized probabilities
    Distribution(Vec<f64>),

    /// One probability distribution per segment
    Segments(Vec<Vec<f64>>),

    /// Retained decomposition levels, each holding per-channel coefficients
    Wavelet {
        levels: Vec<[Vec<f64>; 3]>,
        all_levels: bool,
    },
}

impl Transformed {
    /// Plain Shannon entropy of the output, without any method-specific rule.
    pub fn entropy(&self, ctx: &ReduceContext) -> f64 {
        match self {
            Self::Field(field) => {
                if field.dim().2 == 3 {
                    shannon_entropy(&project_channels(field.view(), &ctx.color_weights))
                } else {
                    shannon_entropy(field)
                }
            }
            Self::Magnitudes(values) => shannon_entropy(values),
            Self::Distribution(p) => probability_entropy(p),
            Self::Segments(segments) => segments.iter().map(|s| shannon_entropy(s)).sum(),
            Self::Wavelet { levels, .. } => levels
                .iter()
                .flat_map(|channels| channels.iter())
                .map(|c| shannon_entropy(c))
                .sum(),
        }
    }
}

/// Parameters shared by every reduction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReduceContext {
    /// Weights projecting three channels onto one
    pub color_weights: [f64; 3],
}

impl Default for ReduceContext {
    fn default() -> Self {
        Self {
            color_weights: crate::math::DEFAULT_COLOR_WEIGHTS,
        }
    }
}

/// Transform function: one cell in, one output out.
pub type TransformFn = fn(ArrayView3<'_, f64>, &MethodSpec) -> Transformed;

/// Reduction function: one output in, one entropy value out.
pub type ReduceFn = fn(&Transformed, &ReduceContext) -> EntropyValue;

/// Registry entry for one method.
pub struct Strategy {
    pub name: &'static str,
    pub transform: TransformFn,
    pub reduce: ReduceFn,
}

/// Indexed by `MethodKind as usize`.
static STRATEGIES: [Strategy; 11] = [
    Strategy {
        name: "dft",
        transform: frequency::magnitude_spectrum,
        reduce: reduce_weighted,
    },
    Strategy {
        name: "dwt",
        transform: wavelet::decompose,
        reduce: reduce_wavelet_levels,
    },
    Strategy {
        name: "naive",
        transform: histogram::passthrough,
        reduce: reduce_weighted,
    },
    Strategy {
        name: "hist",
        transform: histogram::reduced_histogram,
        reduce: reduce_weighted,
    },
    Strategy {
        name: "laplace",
        transform: laplace::laplacian,
        reduce: reduce_weighted,
    },
    Strategy {
        name: "joint_red_green",
        transform: histogram::joint_red_green,
        reduce: reduce_probabilities,
    },
    Strategy {
        name: "joint_all",
        transform: histogram::joint_all,
        reduce: reduce_probabilities,
    },
    Strategy {
        name: "lbp",
        transform: texture::lbp_histogram,
        reduce: reduce_weighted,
    },
    Strategy {
        name: "lbp_gabor",
        transform: texture::gabor_histogram,
        reduce: reduce_weighted,
    },
    Strategy {
        name: "adapt",
        transform: segment::segment_histograms,
        reduce: reduce_segment_mean,
    },
    Strategy {
        name: "RGBCM",
        transform: cooccurrence::color_cooccurrence,
        reduce: reduce_weighted,
    },
];

/// Absolute values, channel projection, normalization, Shannon entropy.
fn reduce_weighted(transformed: &Transformed, ctx: &ReduceContext) -> EntropyValue {
    EntropyValue::Scalar(transformed.entropy(ctx))
}

/// Entropy straight from an already-normalized joint probability array.
fn reduce_probabilities(transformed: &Transformed, ctx: &ReduceContext) -> EntropyValue {
    match transformed {
        Transformed::Distribution(p) => EntropyValue::Scalar(probability_entropy(p)),
        other => EntropyValue::Scalar(other.entropy(ctx)),
    }
}

/// Mean entropy over all segment distributions; no segments yields 0.
fn reduce_segment_mean(transformed: &Transformed, ctx: &ReduceContext) -> EntropyValue {
    match transformed {
        Transformed::Segments(segments) if segments.is_empty() => EntropyValue::Scalar(0.0),
        Transformed::Segments(segments) => {
            let total: f64 = segments.iter().map(|s| shannon_entropy(s)).sum();
            EntropyValue::Scalar(total / segments.len() as f64)
        }
        other => EntropyValue::Scalar(other.entropy(ctx)),
    }
}

/// Per retained level, the sum of per-channel entropies.
fn reduce_wavelet_levels(transformed: &Transformed, ctx: &ReduceContext) -> EntropyValue {
    match transformed {
        Transformed::Wavelet { levels, all_levels } => {
            let per_level: Vec<f64> = levels
                .iter()
                .map(|channels| channels.iter().map(|c| shannon_entropy(c)).sum())
                .collect();
            if *all_levels {
                EntropyValue::List(per_level.into_iter().map(EntropyValue::Scalar).collect())
            } else {
                EntropyValue::Scalar(per_level.into_iter().sum())
            }
        }
        other => EntropyValue::Scalar(other.entropy(ctx)),
    }
}
