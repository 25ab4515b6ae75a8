//! Recursive spatial partitioning.
//!
//! Level L splits an image into a 2^L × 2^L grid. Cells are `H / n` by
//! `W / n` pixels (integer division) and the last row and column absorb the
//! remainder, so every pixel lands in exactly one cell. When a dimension is
//! smaller than `n` the leading cells are empty.

use ndarray::{s, Array3, ArrayView3};
use std::ops::Range;

/// Row and column range of one cell.
pub type CellBounds = (Range<usize>, Range<usize>);

/// Row and column ranges of a 2^level × 2^level grid over `height × width`.
pub fn cell_bounds(height: usize, width: usize, level: usize) -> Vec<Vec<CellBounds>> {
    let n = 1usize << level;
    let rows = axis_ranges(height, n);
    let cols = axis_ranges(width, n);
    rows.iter()
        .map(|r| cols.iter().map(|c| (r.clone(), c.clone())).collect())
        .collect()
}

fn axis_ranges(len: usize, n: usize) -> Vec<Range<usize>> {
    let step = len / n;
    (0..n)
        .map(|i| {
            let start = i * step;
            let end = if i + 1 == n { len } else { start + step };
            start..end
        })
        .collect()
}

/// Views of every cell at `level`, indexed `[row][col]`.
pub fn partition(image: ArrayView3<'_, f64>, level: usize) -> Vec<Vec<ArrayView3<'_, f64>>> {
    let (h, w, _) = image.dim();
    cell_bounds(h, w, level)
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|(r, c)| image.slice_move(s![r, c, ..]))
                .collect()
        })
        .collect()
}

/// Stitch a `[row][col]` grid of cells back into one array.
pub fn reassemble(cells: &[Vec<ArrayView3<'_, f64>>], height: usize, width: usize) -> Array3<f64> {
    let channels = cells
        .iter()
        .flatten()
        .map(|c| c.dim().2)
        .next()
        .unwrap_or(0);
    let mut out = Array3::<f64>::zeros((height, width, channels));
    let level = cells.len().max(1).trailing_zeros() as usize;
    for (row, bounds_row) in cells.iter().zip(cell_bounds(height, width, level)) {
        for (cell, (r, c)) in row.iter().zip(bounds_row) {
            out.slice_mut(s![r, c, ..]).assign(cell);
        }
    }
    out
}
