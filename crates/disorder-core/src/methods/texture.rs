//! Texture transforms: uniform local binary patterns and a Gabor response.

use ndarray::{Array2, ArrayView3};
use std::f64::consts::{FRAC_1_SQRT_2, PI};

use super::{MethodSpec, Transformed};
use crate::math::normalize_counts;

/// Sampling points on the LBP circle.
const LBP_P: usize = 8;

/// Histogram bins for LBP codes: `P(P-1)/2 + 2`.
const LBP_BINS: usize = LBP_P * (LBP_P - 1) / 2 + 2;

const LBP_GRAY: [f64; 3] = [0.2125, 0.7154, 0.0721];
const GABOR_GRAY: [f64; 3] = [0.299, 0.587, 0.114];

const GABOR_HALF: isize = 15;
const GABOR_WAVELENGTH: f64 = 5.0;
const GABOR_THETA: f64 = PI / 4.0;
const GABOR_SIGMA: f64 = 1.0;
const GABOR_BINS: usize = 256;

/// Kernel taps below this magnitude are skipped.
const GABOR_TAP_FLOOR: f64 = 1e-12;

fn grayscale(cell: ArrayView3<'_, f64>, weights: &[f64; 3]) -> Array2<f64> {
    let (h, w, channels) = cell.dim();
    Array2::from_shape_fn((h, w), |(y, x)| {
        if channels >= 3 {
            (0..3).map(|c| cell[[y, x, c]] * weights[c]).sum()
        } else if channels > 0 {
            cell[[y, x, 0]]
        } else {
            0.0
        }
    })
}

/// Uniform LBP lookup: bit pattern → bin (popcount, or `P + 1` if non-uniform).
fn build_lbp_lut() -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (val, slot) in lut.iter_mut().enumerate() {
        let v = val as u8;
        let transitions = (0..8u32)
            .filter(|i| (v >> i) & 1 != (v >> ((i + 1) % 8)) & 1)
            .count();
        *slot = if transitions <= 2 {
            v.count_ones() as u8
        } else {
            (LBP_P + 1) as u8
        };
    }
    lut
}

/// Bilinear sample at (ry, rx) with clamped borders.
fn bilinear(img: &Array2<f64>, ry: f64, rx: f64) -> f64 {
    let (h, w) = img.dim();
    let fy = ry.floor() as i64;
    let fx = rx.floor() as i64;
    let ty = ry - fy as f64;
    let tx = rx - fx as f64;
    let r0 = fy.clamp(0, h as i64 - 1) as usize;
    let r1 = (fy + 1).clamp(0, h as i64 - 1) as usize;
    let c0 = fx.clamp(0, w as i64 - 1) as usize;
    let c1 = (fx + 1).clamp(0, w as i64 - 1) as usize;
    (1.0 - ty) * ((1.0 - tx) * img[[r0, c0]] + tx * img[[r0, c1]])
        + ty * ((1.0 - tx) * img[[r1, c0]] + tx * img[[r1, c1]])
}

/// Uniform LBP codes (P = 8, R = 1).
fn lbp_codes(img: &Array2<f64>) -> Array2<u8> {
    let lut = build_lbp_lut();
    let s2 = FRAC_1_SQRT_2;
    // r_p = -R sin(2πk/P), c_p = R cos(2πk/P)
    let dr: [f64; LBP_P] = [0.0, -s2, -1.0, -s2, 0.0, s2, 1.0, s2];
    let dc: [f64; LBP_P] = [1.0, s2, 0.0, -s2, -1.0, -s2, 0.0, s2];

    Array2::from_shape_fn(img.dim(), |(r, c)| {
        let center = img[[r, c]];
        let mut code: u8 = 0;
        for k in 0..LBP_P {
            if bilinear(img, r as f64 + dr[k], c as f64 + dc[k]) >= center {
                code |= 1 << k;
            }
        }
        lut[code as usize]
    })
}

/// Normalized histogram of uniform LBP codes over 30 unit bins.
pub fn lbp_histogram(cell: ArrayView3<'_, f64>, _spec: &MethodSpec) -> Transformed {
    let mut hist = vec![0.0; LBP_BINS];
    let (h, w, _) = cell.dim();
    if h > 0 && w > 0 {
        let gray = grayscale(cell, &LBP_GRAY);
        for &code in lbp_codes(&gray).iter() {
            hist[code as usize] += 1.0;
        }
    }
    normalize_counts(&mut hist);
    Transformed::Magnitudes(hist)
}

/// Real part of the Gabor kernel as (dy, dx, weight) taps.
fn gabor_taps() -> Vec<(isize, isize, f64)> {
    let frequency = 1.0 / GABOR_WAVELENGTH;
    let (sin_t, cos_t) = GABOR_THETA.sin_cos();
    let mut taps = Vec::new();
    for dy in -GABOR_HALF..=GABOR_HALF {
        for dx in -GABOR_HALF..=GABOR_HALF {
            let (x, y) = (dx as f64, dy as f64);
            let envelope = (-0.5 * (x * x + y * y) / (GABOR_SIGMA * GABOR_SIGMA)).exp();
            let weight = envelope * (2.0 * PI * frequency * (x * cos_t + y * sin_t)).cos();
            if weight.abs() > GABOR_TAP_FLOOR {
                taps.push((dy, dx, weight));
            }
        }
    }
    taps
}

/// Same-size convolution with periodic (wrap-around) borders.
fn convolve_wrap(img: &Array2<f64>, taps: &[(isize, isize, f64)]) -> Array2<f64> {
    let (h, w) = img.dim();
    let (hi, wi) = (h as isize, w as isize);
    Array2::from_shape_fn((h, w), |(y, x)| {
        taps.iter()
            .map(|&(dy, dx, k)| {
                let sy = (y as isize - dy).rem_euclid(hi) as usize;
                let sx = (x as isize - dx).rem_euclid(wi) as usize;
                k * img[[sy, sx]]
            })
            .sum()
    })
}

/// 256-bin histogram of the Gabor response over its own [min, max] range.
pub fn gabor_histogram(cell: ArrayView3<'_, f64>, _spec: &MethodSpec) -> Transformed {
    let (h, w, _) = cell.dim();
    let mut hist = vec![0.0; GABOR_BINS];
    if h == 0 || w == 0 {
        return Transformed::Magnitudes(hist);
    }

    let response = convolve_wrap(&grayscale(cell, &GABOR_GRAY), &gabor_taps());
    let (min, max) = response
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let span = max - min;

    for &v in response.iter() {
        let bin = if span > 0.0 {
            (((v - min) / span) * GABOR_BINS as f64) as usize
        } else {
            GABOR_BINS / 2
        };
        hist[bin.min(GABOR_BINS - 1)] += 1.0;
    }
    Transformed::Magnitudes(hist)
}
