//! Six-neighbour 3D Laplacian.

use ndarray::{Array3, ArrayView3};

use super::{MethodSpec, Transformed};

/// Convolve with the cross kernel (centre 6, each face neighbour −1) over
/// rows, columns and channels. Outside the cell counts as 0.
pub fn laplacian(cell: ArrayView3<'_, f64>, _spec: &MethodSpec) -> Transformed {
    let (h, w, channels) = cell.dim();
    let at = |y: isize, x: isize, c: isize| -> f64 {
        if y < 0 || x < 0 || c < 0 || y >= h as isize || x >= w as isize || c >= channels as isize {
            0.0
        } else {
            cell[[y as usize, x as usize, c as usize]]
        }
    };

    let out = Array3::from_shape_fn((h, w, channels), |(y, x, c)| {
        let (y, x, c) = (y as isize, x as isize, c as isize);
        6.0 * at(y, x, c)
            - at(y - 1, x, c)
            - at(y + 1, x, c)
            - at(y, x - 1, c)
            - at(y, x + 1, c)
            - at(y, x, c - 1)
            - at(y, x, c + 1)
    });
    Transformed::Field(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methods::MethodKind;

    fn apply(cell: &Array3<f64>) -> Array3<f64> {
        match laplacian(cell.view(), &MethodSpec::new(MethodKind::Laplace)) {
            Transformed::Field(f) => f,
            other => panic!("unexpected output {other:?}"),
        }
    }

    #[test]
    fn test_interior_of_constant_volume_is_zero() {
        let cell = Array3::from_elem((5, 5, 3), 10.0);
        let out = apply(&cell);
        // Middle channel, interior pixel: all six neighbours present
        assert_eq!(out[[2, 2, 1]], 0.0);
        // Corner loses three neighbours to zero padding
        assert_eq!(out[[0, 0, 0]], 30.0);
    }

    #[test]
    fn test_single_impulse() {
        let mut cell = Array3::<f64>::zeros((3, 3, 3));
        cell[[1, 1, 1]] = 1.0;
        let out = apply(&cell);
        assert_eq!(out[[1, 1, 1]], 6.0);
        assert_eq!(out[[0, 1, 1]], -1.0);
        assert_eq!(out[[1, 1, 0]], -1.0);
        assert_eq!(out[[0, 0, 0]], 0.0);
    }
}
