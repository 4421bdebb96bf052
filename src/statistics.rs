//! Numerical helpers shared by the optics modules.

use interp::{interp, InterpMode};
use itertools::Itertools;

/// Linearly interpolate `x` over the samples `(xp, fp)`, extending the first and last
/// segments beyond the sampled range. `xp` must be sorted ascending.
pub(crate) fn interp_extrapolate(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    interp(xp, fp, x, &InterpMode::Extrapolate)
}

/// Trapezoidal rule for samples `y` at abscissae `x`.
pub(crate) fn trapezoid(y: &[f64], x: &[f64]) -> f64 {
    x.iter()
        .zip(y.iter())
        .tuple_windows()
        .map(|((x0, y0), (x1, y1))| (x1 - x0) * (y0 + y1) / 2.)
        .sum()
}

pub(crate) fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0., 0usize), |(sum, count), value| (sum + value, count + 1));
    (count > 0).then(|| sum / count as f64)
}
