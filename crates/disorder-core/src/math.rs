//! Shared math utilities: Shannon entropy and channel projection.

use ndarray::{Array2, ArrayView3, Axis};

/// Guard added inside the logarithm so zero probabilities stay finite.
pub const LOG_EPSILON: f64 = f64::EPSILON;

/// Default luma weights used to project RGB fields onto a scalar field.
pub const DEFAULT_COLOR_WEIGHTS: [f64; 3] = [0.2989, 0.5870, 0.1140];

/// Shannon entropy (base 2) of non-negative magnitudes.
///
/// Values are taken in absolute value and normalized by their sum. A zero sum
/// yields 0 rather than a NaN.
pub fn shannon_entropy<'a, I>(values: I) -> f64
where
    I: IntoIterator<Item = &'a f64>,
    I::IntoIter: Clone,
{
    let iter = values.into_iter();
    let total: f64 = iter.clone().map(|v| v.abs()).sum();
    if total == 0.0 {
        return 0.0;
    }
    let h = -iter
        .map(|v| {
            let p = v.abs() / total;
            p * (p + LOG_EPSILON).log2()
        })
        .sum::<f64>();
    // The epsilon pushes a one-hot distribution just below zero
    h.max(0.0)
}

/// Shannon entropy (base 2) of an already-normalized probability array.
pub fn probability_entropy<'a, I>(probabilities: I) -> f64
where
    I: IntoIterator<Item = &'a f64>,
{
    let h = -probabilities
        .into_iter()
        .map(|&p| p * (p + LOG_EPSILON).log2())
        .sum::<f64>();
    h.max(0.0)
}

/// Project an H×W×3 field onto H×W with per-channel weights, after taking
/// absolute values.
pub fn project_channels(field: ArrayView3<'_, f64>, weights: &[f64; 3]) -> Array2<f64> {
    let (h, w, _) = field.dim();
    let mut out = Array2::<f64>::zeros((h, w));
    for (c, weight) in weights.iter().enumerate().take(field.len_of(Axis(2))) {
        let channel = field.index_axis(Axis(2), c);
        out.zip_mut_with(&channel, |o, &v| *o += v.abs() * weight);
    }
    out
}

/// Normalize counts into probabilities. A zero total leaves all zeros.
pub fn normalize_counts(counts: &mut [f64]) {
    let total: f64 = counts.iter().sum();
    if total > 0.0 {
        for c in counts.iter_mut() {
            *c /= total;
        }
    }
}
