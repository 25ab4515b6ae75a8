//! Multi-level 2D discrete wavelet decomposition with symmetric extension.

use ndarray::{Array1, Array2, ArrayView1, ArrayView3, ArrayViewMut1, Axis, Zip};
use serde::{Deserialize, Serialize};

use super::{MethodSpec, Transformed};

/// Supported wavelet families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WaveletKind {
    /// Haar
    #[default]
    #[serde(rename = "db1", alias = "haar")]
    Db1,
    /// Daubechies, two vanishing moments
    #[serde(rename = "db2")]
    Db2,
}

const DB1_LO: [f64; 2] = [std::f64::consts::FRAC_1_SQRT_2, std::f64::consts::FRAC_1_SQRT_2];
const DB1_HI: [f64; 2] = [-std::f64::consts::FRAC_1_SQRT_2, std::f64::consts::FRAC_1_SQRT_2];

const DB2_LO: [f64; 4] = [
    -0.12940952255126037,
    0.2241438680420134,
    0.8365163037378079,
    0.48296291314453416,
];
const DB2_HI: [f64; 4] = [
    -0.48296291314453416,
    0.8365163037378079,
    -0.2241438680420134,
    -0.12940952255126037,
];

impl WaveletKind {
    /// Decomposition (low-pass, high-pass) filters.
    pub fn filters(self) -> (&'static [f64], &'static [f64]) {
        match self {
            Self::Db1 => (&DB1_LO, &DB1_HI),
            Self::Db2 => (&DB2_LO, &DB2_HI),
        }
    }

    /// Deepest level at which the filter still fits the signal.
    pub fn max_level(self, len: usize) -> usize {
        let taps = self.filters().0.len();
        if len < taps - 1 {
            return 0;
        }
        ((len / (taps - 1)) as f64).log2().floor() as usize
    }
}

/// Which decomposition levels a `dwt` method keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LevelRepr", into = "LevelRepr")]
pub enum WaveletLevel {
    /// Approximation plus every detail level
    All,
    /// A single detail level, 1 being the finest
    Only(usize),
}

impl Default for WaveletLevel {
    fn default() -> Self {
        Self::Only(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum LevelRepr {
    Num(usize),
    Str(String),
}

impl TryFrom<LevelRepr> for WaveletLevel {
    type Error = String;

    fn try_from(repr: LevelRepr) -> Result<Self, Self::Error> {
        match repr {
            LevelRepr::Num(0) => Err("wavelet level must be >= 1".to_string()),
            LevelRepr::Num(k) => Ok(Self::Only(k)),
            LevelRepr::Str(s) if s == "all" => Ok(Self::All),
            LevelRepr::Str(s) => match s.parse::<usize>() {
                Ok(k) if k >= 1 => Ok(Self::Only(k)),
                _ => Err(format!("invalid wavelet level '{s}'")),
            },
        }
    }
}

impl From<WaveletLevel> for LevelRepr {
    fn from(level: WaveletLevel) -> Self {
        match level {
            WaveletLevel::All => Self::Str("all".to_string()),
            WaveletLevel::Only(k) => Self::Num(k),
        }
    }
}

/// One level of a 2D decomposition.
struct Level2 {
    approx: Array2<f64>,
    details: [Array2<f64>; 3],
}

/// Decompose every channel of `cell` and keep the requested levels.
///
/// With `level = "all"` the kept levels are the final approximation followed by
/// the detail levels from coarsest to finest. Otherwise only detail level k is
/// kept; a level deeper than the decomposition keeps nothing.
pub fn decompose(cell: ArrayView3<'_, f64>, spec: &MethodSpec) -> Transformed {
    let wavelet = spec.wavelet.unwrap_or_default();
    let level = spec.level.unwrap_or_default();
    let all_levels = level == WaveletLevel::All;

    let (h, w, channels) = cell.dim();
    if h == 0 || w == 0 {
        return Transformed::Wavelet {
            levels: Vec::new(),
            all_levels,
        };
    }

    let depth = spec.depth.unwrap_or(match level {
        WaveletLevel::All => wavelet.max_level(h.min(w)),
        WaveletLevel::Only(k) => k,
    });

    // levels[i] holds channels for retained level i
    let retained = match level {
        WaveletLevel::All => depth + 1,
        WaveletLevel::Only(k) if k <= depth => 1,
        WaveletLevel::Only(_) => 0,
    };
    let mut levels: Vec<[Vec<f64>; 3]> = (0..retained).map(|_| Default::default()).collect();

    for c in 0..channels.min(3) {
        let decomposition = wavedec2(cell.index_axis(Axis(2), c).to_owned(), wavelet, depth);
        match level {
            WaveletLevel::All => {
                let approx = decomposition
                    .last()
                    .map(|l| l.approx.iter().copied().collect())
                    .unwrap_or_else(|| cell.index_axis(Axis(2), c).iter().copied().collect());
                levels[0][c] = approx;
                for (slot, lvl) in decomposition.iter().rev().enumerate() {
                    levels[slot + 1][c] = flatten_details(lvl);
                }
            }
            WaveletLevel::Only(k) => {
                if let Some(lvl) = decomposition.get(k - 1) {
                    levels[0][c] = flatten_details(lvl);
                }
            }
        }
    }

    Transformed::Wavelet { levels, all_levels }
}

fn flatten_details(level: &Level2) -> Vec<f64> {
    level
        .details
        .iter()
        .flat_map(|band| band.iter().copied())
        .collect()
}

/// Repeated 2D decomposition of the approximation; index 0 is the finest level.
fn wavedec2(mut data: Array2<f64>, wavelet: WaveletKind, depth: usize) -> Vec<Level2> {
    let mut out = Vec::with_capacity(depth);
    for _ in 0..depth {
        let level = dwt2(&data, wavelet);
        data = level.approx.clone();
        out.push(level);
    }
    out
}

fn dwt2(data: &Array2<f64>, wavelet: WaveletKind) -> Level2 {
    let (lo, hi) = dwt_axis(data, Axis(1), wavelet);
    let (ll, lh) = dwt_axis(&lo, Axis(0), wavelet);
    let (hl, hh) = dwt_axis(&hi, Axis(0), wavelet);
    Level2 {
        approx: ll,
        details: [lh, hl, hh],
    }
}

fn dwt_axis(data: &Array2<f64>, axis: Axis, wavelet: WaveletKind) -> (Array2<f64>, Array2<f64>) {
    let (lo_f, hi_f) = wavelet.filters();
    let n = data.len_of(axis);
    let out_len = (n + lo_f.len() - 1) / 2;

    let mut shape = [data.nrows(), data.ncols()];
    shape[axis.index()] = out_len;
    let mut lo = Array2::<f64>::zeros(shape);
    let mut hi = Array2::<f64>::zeros(shape);

    Zip::from(lo.lanes_mut(axis))
        .and(hi.lanes_mut(axis))
        .and(data.lanes(axis))
        .for_each(|lo_out, hi_out, x| analyze(x, lo_f, hi_f, lo_out, hi_out));

    (lo, hi)
}

/// Single-level 1D analysis: filter, then keep odd samples.
fn analyze(
    x: ArrayView1<'_, f64>,
    lo_f: &[f64],
    hi_f: &[f64],
    mut lo_out: ArrayViewMut1<'_, f64>,
    mut hi_out: ArrayViewMut1<'_, f64>,
) {
    let n = x.len() as isize;
    if n == 0 {
        return;
    }
    for i in 0..lo_out.len() {
        let (mut lo, mut hi) = (0.0, 0.0);
        for k in 0..lo_f.len() {
            let j = symmetric_index(2 * i as isize + 1 - k as isize, n);
            lo += lo_f[k] * x[j];
            hi += hi_f[k] * x[j];
        }
        lo_out[i] = lo;
        hi_out[i] = hi;
    }
}

/// Half-sample symmetric extension: `x[-1] = x[0]`, `x[n] = x[n-1]`.
fn symmetric_index(j: isize, n: isize) -> usize {
    let m = j.rem_euclid(2 * n);
    (if m < n { m } else { 2 * n - 1 - m }) as usize
}

/// 1D decomposition, used by tests and benches.
pub fn dwt1(signal: &[f64], wavelet: WaveletKind) -> (Vec<f64>, Vec<f64>) {
    let (lo_f, hi_f) = wavelet.filters();
    let out_len = (signal.len() + lo_f.len() - 1) / 2;
    let mut lo = Array1::<f64>::zeros(out_len);
    let mut hi = Array1::<f64>::zeros(out_len);
    analyze(
        ArrayView1::from(signal),
        lo_f,
        hi_f,
        lo.view_mut(),
        hi.view_mut(),
    );
    (lo.to_vec(), hi.to_vec())
}
