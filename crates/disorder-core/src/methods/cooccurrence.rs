//! Per-channel gray-level co-occurrence matrices.

use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};

use super::{MethodSpec, Transformed};

const LEVELS: usize = 256;

/// Pixel offsets (dy, dx) for angles 0, π/4, π/2 and 3π/4 at distance 1.
const OFFSETS: [(isize, isize); 4] = [(0, 1), (-1, 1), (-1, 0), (-1, -1)];

fn glcm(channel: ArrayView2<'_, f64>, (dy, dx): (isize, isize)) -> Array2<f64> {
    let (h, w) = channel.dim();
    let mut counts = Array2::<f64>::zeros((LEVELS, LEVELS));
    let mut total = 0.0;
    for y in 0..h as isize {
        for x in 0..w as isize {
            let (ny, nx) = (y + dy, x + dx);
            if ny < 0 || nx < 0 || ny >= h as isize || nx >= w as isize {
                continue;
            }
            let i = channel[[y as usize, x as usize]].clamp(0.0, 255.0) as usize;
            let j = channel[[ny as usize, nx as usize]].clamp(0.0, 255.0) as usize;
            counts[[i, j]] += 1.0;
            total += 1.0;
        }
    }
    if total > 0.0 {
        counts /= total;
    }
    counts
}

/// 256×256×3 co-occurrence: each angle normalized, then averaged over angles.
pub fn color_cooccurrence(cell: ArrayView3<'_, f64>, _spec: &MethodSpec) -> Transformed {
    let channels = cell.dim().2.min(3);
    let mut out = Array3::<f64>::zeros((LEVELS, LEVELS, 3));
    for c in 0..channels {
        let channel = cell.index_axis(Axis(2), c);
        let mut slot = out.index_axis_mut(Axis(2), c);
        for offset in OFFSETS {
            slot += &glcm(channel, offset);
        }
        slot /= OFFSETS.len() as f64;
    }
    Transformed::Field(out)
}
