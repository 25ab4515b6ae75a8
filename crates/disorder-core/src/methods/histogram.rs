//! Pixel passthrough and histogram-based transforms.

use ndarray::{ArrayView3, Axis};
use std::collections::BTreeMap;

use super::{MethodSpec, Transformed};
use crate::math::normalize_counts;

const LEVELS: usize = 256;

/// Quantize a channel value to an 8-bit level.
fn level(v: f64) -> u32 {
    v.clamp(0.0, 255.0) as u32
}

/// The pixel array itself.
pub fn passthrough(cell: ArrayView3<'_, f64>, _spec: &MethodSpec) -> Transformed {
    Transformed::Field(cell.to_owned())
}

/// Histogram over 4 bits per channel, interleaved as `r << 12 | g << 6 | b`.
///
/// Only occupied bins are kept; empty bins contribute nothing to the entropy.
pub fn reduced_histogram(cell: ArrayView3<'_, f64>, _spec: &MethodSpec) -> Transformed {
    let mut bins: BTreeMap<u32, f64> = BTreeMap::new();
    for pixel in cell.lanes(Axis(2)) {
        let channel = |c: usize| pixel.get(c).map(|&v| level(v) >> 4).unwrap_or(0);
        let code = (channel(0) << 12) + (channel(1) << 6) + channel(2);
        *bins.entry(code).or_insert(0.0) += 1.0;
    }
    Transformed::Magnitudes(bins.into_values().collect())
}

/// 256×256 joint probability of channels 0 and 1.
pub fn joint_red_green(cell: ArrayView3<'_, f64>, _spec: &MethodSpec) -> Transformed {
    let mut joint = vec![0.0; LEVELS * LEVELS];
    if cell.dim().2 >= 2 {
        for pixel in cell.lanes(Axis(2)) {
            let (r, g) = (level(pixel[0]) as usize, level(pixel[1]) as usize);
            joint[r * LEVELS + g] += 1.0;
        }
    }
    normalize_counts(&mut joint);
    Transformed::Distribution(joint)
}

/// 256³ joint probability of all three channels, occupied bins only.
pub fn joint_all(cell: ArrayView3<'_, f64>, _spec: &MethodSpec) -> Transformed {
    let mut bins: BTreeMap<u32, f64> = BTreeMap::new();
    for pixel in cell.lanes(Axis(2)) {
        let channel = |c: usize| pixel.get(c).map(|&v| level(v)).unwrap_or(0);
        let code = (channel(0) << 16) | (channel(1) << 8) | channel(2);
        *bins.entry(code).or_insert(0.0) += 1.0;
    }
    let mut probabilities: Vec<f64> = bins.into_values().collect();
    normalize_counts(&mut probabilities);
    Transformed::Distribution(probabilities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methods::{MethodKind, ReduceContext};
    use ndarray::Array3;

    fn entropy(kind: MethodKind, cell: &Array3<f64>) -> f64 {
        let spec = MethodSpec::new(kind);
        spec.reduce(&spec.transform(cell.view()), &ReduceContext::default())
            .as_scalar()
            .unwrap()
    }

    #[test]
    fn test_solid_cell_has_zero_histogram_entropy() {
        let cell = Array3::from_elem((8, 8, 3), 128.0);
        assert!(entropy(MethodKind::Histogram, &cell).abs() < 1e-12);
        assert!(entropy(MethodKind::JointRedGreen, &cell).abs() < 1e-12);
        assert!(entropy(MethodKind::JointAll, &cell).abs() < 1e-12);
    }

    #[test]
    fn test_histogram_collapses_low_bits() {
        // 0..16 share a 4-bit bin
        let cell = Array3::from_shape_fn((4, 4, 3), |(y, x, _)| (y * 4 + x) as f64);
        match reduced_histogram(cell.view(), &MethodSpec::new(MethodKind::Histogram)) {
            Transformed::Magnitudes(bins) => assert_eq!(bins, vec![16.0]),
            other => panic!("unexpected output {other:?}"),
        }
    }

    #[test]
    fn test_four_equal_colours_give_two_bits() {
        let colours = [[0.0, 0.0, 0.0], [255.0, 0.0, 0.0], [0.0, 255.0, 0.0], [0.0, 0.0, 255.0]];
        let cell = Array3::from_shape_fn((2, 2, 3), |(y, x, c)| colours[y * 2 + x][c]);
        assert!((entropy(MethodKind::Histogram, &cell) - 2.0).abs() < 1e-9);
        assert!((entropy(MethodKind::JointAll, &cell) - 2.0).abs() < 1e-9);
        // red/green pairs: (0,0) twice, (255,0), (0,255)
        assert!((entropy(MethodKind::JointRedGreen, &cell) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        assert_eq!(level(-4.0), 0);
        assert_eq!(level(300.0), 255);
        assert_eq!(level(17.9), 17);
    }
}
