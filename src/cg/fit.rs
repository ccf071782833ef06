//! One-dimensional models along a search line.
use nalgebra::{convert, RealField};
use num_traits::Float;

/// Function value and directional derivative at `step` along the line.
#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct Sample<F> {
    pub step: F,
    pub value: F,
    pub slope: F,
}

impl<F: RealField + Float> Sample<F> {
    /// `NaN` values are stored as `$+\infty$` so they never win a comparison.
    pub fn new(step: F, value: F, slope: F) -> Self {
        let value = if Float::is_nan(value) {
            F::infinity()
        } else {
            value
        };
        Self { step, value, slope }
    }

    /// Lower value wins, ties go to the flatter sample.
    pub fn is_better_than(&self, other: &Self) -> bool {
        self.value < other.value
            || (self.value == other.value && Float::abs(self.slope) < Float::abs(other.slope))
    }

    /// `true` if the two steps cannot be told apart numerically.
    pub fn same_step(&self, step: F) -> bool {
        let scale = Float::max(Float::abs(self.step), Float::abs(step));
        Float::abs(self.step - step) <= Float::sqrt(F::default_epsilon()) * scale
    }
}

/// Minimizer of the cubic that matches value and slope of `a` and `b`.
///
/// Returns `None` if that cubic has no local minimum.
pub(crate) fn cubic_minimizer<F: RealField + Float>(a: &Sample<F>, b: &Sample<F>) -> Option<F> {
    let width = b.step - a.step;
    if width.is_zero() {
        return None;
    }
    let three: F = convert(3.);
    let d1 = a.slope + b.slope - three * (a.value - b.value) / (a.step - b.step);
    let discriminant = d1 * d1 - a.slope * b.slope;
    if !(discriminant >= F::zero()) {
        return None;
    }
    let d2 = Float::signum(width) * Float::sqrt(discriminant);
    let denominator = b.slope - a.slope + d2 + d2;
    if denominator.is_zero() {
        return None;
    }
    let step = b.step - width * (b.slope + d2 - d1) / denominator;
    if Float::is_finite(step) {
        Some(step)
    } else {
        None
    }
}

/// Zero of the linear interpolation of the slopes, if the curvature is positive.
pub(crate) fn secant_minimizer<F: RealField + Float>(a: &Sample<F>, b: &Sample<F>) -> Option<F> {
    let width = b.step - a.step;
    let slope_change = b.slope - a.slope;
    if !(slope_change * width > F::zero()) {
        return None;
    }
    let step = a.step - a.slope * width / slope_change;
    if Float::is_finite(step) {
        Some(step)
    } else {
        None
    }
}

/// Cubic fit, falling back to the secant on the slopes.
pub(crate) fn fit_minimizer<F: RealField + Float>(a: &Sample<F>, b: &Sample<F>) -> Option<F> {
    cubic_minimizer(a, b).or_else(|| secant_minimizer(a, b))
}

/// Value of the cubic Hermite interpolant of `a` and `b` at `step`.
pub(crate) fn hermite_value<F: RealField + Float>(a: &Sample<F>, b: &Sample<F>, step: F) -> F {
    let width = b.step - a.step;
    let u = (step - a.step) / width;
    let u2 = u * u;
    let u3 = u2 * u;
    let two: F = convert(2.);
    let three: F = convert(3.);
    let h00 = two * u3 - three * u2 + F::one();
    let h10 = u3 - two * u2 + u;
    let h01 = three * u2 - two * u3;
    let h11 = u3 - u2;
    h00 * a.value + h10 * width * a.slope + h01 * b.value + h11 * width * b.slope
}
