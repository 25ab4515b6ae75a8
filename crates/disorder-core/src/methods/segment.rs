//! Adaptive estimation over SLIC superpixels.
//!
//! Centers are seeded on a regular grid and refined with a fixed number of
//! k-means iterations restricted to a 2S × 2S window, so the segmentation is
//! a pure function of the cell.

use ndarray::{Array2, ArrayView3};
use std::collections::BTreeMap;

use super::{MethodSpec, Transformed};
use crate::math::normalize_counts;

pub const DEFAULT_SEGMENTS: usize = 100;

const COMPACTNESS: f64 = 10.0;
const ITERATIONS: usize = 10;
const HIST_BINS: usize = 256;
const GRAY: [f64; 3] = [0.2125, 0.7154, 0.0721];

/// Colour scale bringing 8-bit channels to a 0..100 range.
const COLOR_SCALE: f64 = 100.0 / 255.0;

#[derive(Debug, Clone, Copy)]
struct Center {
    color: [f64; 3],
    y: f64,
    x: f64,
}

fn pixel_color(cell: &ArrayView3<'_, f64>, y: usize, x: usize) -> [f64; 3] {
    let channels = cell.dim().2;
    let mut color = [0.0; 3];
    for (c, slot) in color.iter_mut().enumerate() {
        if channels > 0 {
            *slot = cell[[y, x, c.min(channels - 1)]] * COLOR_SCALE;
        }
    }
    color
}

/// Assign every pixel to a superpixel label.
fn slic(cell: &ArrayView3<'_, f64>, target: usize) -> Array2<usize> {
    let (h, w, _) = cell.dim();
    let step = ((h * w) as f64 / target.max(1) as f64).sqrt().max(1.0);

    let rows = ((h as f64 / step).round() as usize).max(1);
    let cols = ((w as f64 / step).round() as usize).max(1);
    let mut centers = Vec::with_capacity(rows * cols);
    for i in 0..rows {
        let cy = (((i as f64 + 0.5) * h as f64 / rows as f64) as usize).min(h - 1);
        for j in 0..cols {
            let cx = (((j as f64 + 0.5) * w as f64 / cols as f64) as usize).min(w - 1);
            centers.push(Center {
                color: pixel_color(cell, cy, cx),
                y: cy as f64,
                x: cx as f64,
            });
        }
    }

    let spatial_weight = (COMPACTNESS / step).powi(2);
    let distance = |center: &Center, color: &[f64; 3], py: f64, px: f64| -> f64 {
        let dc: f64 = center
            .color
            .iter()
            .zip(color)
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        let ds = (center.y - py).powi(2) + (center.x - px).powi(2);
        dc + spatial_weight * ds
    };

    let mut labels = Array2::<usize>::from_elem((h, w), usize::MAX);
    let mut best = Array2::<f64>::from_elem((h, w), f64::INFINITY);
    let window = (2.0 * step).ceil() as isize;

    for _ in 0..ITERATIONS {
        best.fill(f64::INFINITY);
        for (k, center) in centers.iter().enumerate() {
            let (cy, cx) = (center.y.round() as isize, center.x.round() as isize);
            let y0 = (cy - window).max(0) as usize;
            let y1 = ((cy + window + 1).max(0) as usize).min(h);
            let x0 = (cx - window).max(0) as usize;
            let x1 = ((cx + window + 1).max(0) as usize).min(w);
            for py in y0..y1 {
                for px in x0..x1 {
                    let d = distance(center, &pixel_color(cell, py, px), py as f64, px as f64);
                    if d < best[[py, px]] {
                        best[[py, px]] = d;
                        labels[[py, px]] = k;
                    }
                }
            }
        }

        // Pixels outside every window fall back to the nearest center
        for ((py, px), label) in labels.indexed_iter_mut() {
            if best[[py, px]].is_infinite() {
                let color = pixel_color(cell, py, px);
                *label = centers
                    .iter()
                    .enumerate()
                    .map(|(k, c)| (k, distance(c, &color, py as f64, px as f64)))
                    .min_by(|a, b| a.1.total_cmp(&b.1))
                    .map(|(k, _)| k)
                    .unwrap_or(0);
            }
        }

        let mut sums = vec![([0.0; 3], 0.0, 0.0, 0usize); centers.len()];
        for ((py, px), &label) in labels.indexed_iter() {
            let acc = &mut sums[label];
            let color = pixel_color(cell, py, px);
            for c in 0..3 {
                acc.0[c] += color[c];
            }
            acc.1 += py as f64;
            acc.2 += px as f64;
            acc.3 += 1;
        }
        for (center, (color, sy, sx, n)) in centers.iter_mut().zip(sums) {
            if n > 0 {
                let n = n as f64;
                center.color = color.map(|v| v / n);
                center.y = sy / n;
                center.x = sx / n;
            }
        }
    }

    labels
}

fn range_histogram(values: &[f64]) -> Vec<f64> {
    let mut hist = vec![0.0; HIST_BINS];
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let span = max - min;
    for &v in values {
        let bin = if span > 0.0 {
            (((v - min) / span) * HIST_BINS as f64) as usize
        } else {
            HIST_BINS / 2
        };
        hist[bin.min(HIST_BINS - 1)] += 1.0;
    }
    normalize_counts(&mut hist);
    hist
}

/// Grayscale histogram of every superpixel, in label order.
pub fn segment_histograms(cell: ArrayView3<'_, f64>, spec: &MethodSpec) -> Transformed {
    let (h, w, channels) = cell.dim();
    if h == 0 || w == 0 {
        return Transformed::Segments(Vec::new());
    }

    let labels = slic(&cell, spec.segments.unwrap_or(DEFAULT_SEGMENTS));
    let mut members: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
    for ((y, x), &label) in labels.indexed_iter() {
        let gray = if channels >= 3 {
            (0..3).map(|c| cell[[y, x, c]] * GRAY[c]).sum()
        } else {
            cell[[y, x, 0]]
        };
        members.entry(label).or_default().push(gray);
    }

    Transformed::Segments(members.values().map(|v| range_histogram(v)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methods::{MethodKind, ReduceContext};
    use ndarray::Array3;

    fn halves() -> Array3<f64> {
        Array3::from_shape_fn((16, 16, 3), |(_, x, _)| if x < 8 { 20.0 } else { 220.0 })
    }

    #[test]
    fn test_every_pixel_is_labelled() {
        let cell = halves();
        let labels = slic(&cell.view(), 4);
        assert!(labels.iter().all(|&l| l != usize::MAX));
    }

    #[test]
    fn test_segments_do_not_straddle_a_sharp_edge() {
        let cell = halves();
        let labels = slic(&cell.view(), 4);
        for y in 0..16 {
            assert_ne!(labels[[y, 7]], labels[[y, 8]]);
        }
    }

    #[test]
    fn test_uniform_segments_have_zero_mean_entropy() {
        let cell = halves();
        let spec = MethodSpec {
            segments: Some(4),
            ..MethodSpec::new(MethodKind::Adaptive)
        };
        let value = spec
            .reduce(&spec.transform(cell.view()), &ReduceContext::default())
            .as_scalar()
            .unwrap();
        assert!(value.abs() < 1e-9);
    }

    #[test]
    fn test_segmentation_is_deterministic() {
        let cell = Array3::from_shape_fn((10, 14, 3), |(y, x, c)| ((y * 19 + x * 5 + c) % 41) as f64 * 6.0);
        assert_eq!(slic(&cell.view(), 9), slic(&cell.view(), 9));
    }

    #[test]
    fn test_range_histogram_of_constant_is_one_hot() {
        let hist = range_histogram(&[3.0, 3.0, 3.0]);
        assert_eq!(hist.iter().filter(|&&p| p > 0.0).count(), 1);
        assert!((hist.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }
}
