//! 2D Fourier magnitude spectrum.

use ndarray::{Array3, ArrayView3, Axis};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use super::{MethodSpec, Transformed};

/// Per-channel 2D DFT magnitude of a cell, rows then columns.
pub fn magnitude_spectrum(cell: ArrayView3<'_, f64>, _spec: &MethodSpec) -> Transformed {
    let (h, w, channels) = cell.dim();
    let mut out = Array3::<f64>::zeros((h, w, channels));
    if h == 0 || w == 0 {
        return Transformed::Field(out);
    }

    let mut planner = FftPlanner::<f64>::new();
    let row_fft = planner.plan_fft_forward(w);
    let col_fft = planner.plan_fft_forward(h);

    let mut buf = vec![Complex::new(0.0, 0.0); h * w];
    let mut column = vec![Complex::new(0.0, 0.0); h];

    for c in 0..channels {
        let channel = cell.index_axis(Axis(2), c);
        for (slot, &v) in buf.iter_mut().zip(channel.iter()) {
            *slot = Complex::new(v, 0.0);
        }

        // Row-major buffer: each chunk of `w` is one row
        row_fft.process(&mut buf);

        for x in 0..w {
            for y in 0..h {
                column[y] = buf[y * w + x];
            }
            col_fft.process(&mut column);
            for y in 0..h {
                out[[y, x, c]] = column[y].norm();
            }
        }
    }

    Transformed::Field(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methods::MethodKind;

    fn spectrum(cell: &Array3<f64>) -> Array3<f64> {
        match magnitude_spectrum(cell.view(), &MethodSpec::new(MethodKind::Frequency)) {
            Transformed::Field(f) => f,
            other => panic!("unexpected output {other:?}"),
        }
    }

    #[test]
    fn test_constant_cell_is_dc_only() {
        let cell = Array3::from_elem((4, 6, 3), 2.0);
        let out = spectrum(&cell);
        assert_eq!(out.dim(), (4, 6, 3));
        for c in 0..3 {
            assert!((out[[0, 0, c]] - 48.0).abs() < 1e-9);
        }
        let off_dc: f64 = out
            .indexed_iter()
            .filter(|((y, x, _), _)| *y != 0 || *x != 0)
            .map(|(_, v)| *v)
            .sum();
        assert!(off_dc < 1e-9);
    }

    #[test]
    fn test_alternating_rows_peak_at_nyquist() {
        let cell = Array3::from_shape_fn((4, 4, 1), |(y, _, _)| if y % 2 == 0 { 1.0 } else { -1.0 });
        let out = spectrum(&cell);
        assert!((out[[2, 0, 0]] - 16.0).abs() < 1e-9);
        assert!(out[[0, 0, 0]].abs() < 1e-9);
    }

    #[test]
    fn test_empty_cell() {
        let cell = Array3::<f64>::zeros((0, 3, 3));
        assert_eq!(spectrum(&cell).len(), 0);
    }
}
