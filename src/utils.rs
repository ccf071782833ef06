use nalgebra::RealField;
use num_traits::Float;

use crate::Differentiable;

mod finite_difference;

pub(crate) use finite_difference::central_difference;

/// Compute a [numerical approximation](https://en.wikipedia.org/wiki/Numerical_differentiation)
/// of the gradient for testing.
///
/// The function is intended to be used for debugging or testing.
/// You can check the analytic gradient of a
/// [`Differentiable`](trait.Differentiable.html) against the central
/// difference quotients with step `step` computed here.
///
/// Computing derivatives numerically is unstable. If you observe large
/// differences between the result of this function and your implementation
/// the reason _might_ be the step size. Prefer `f64` for the comparison.
///
/// # Example
///
/// ```
/// # use approx::assert_relative_eq;
/// use constrained_cg::differentiate_numerically;
///
/// let mut f = |x: &[f64], g: &mut [f64]| {
///     g[0] = 2. * x[0] * x[1];
///     g[1] = x[0] * x[0];
///     x[0] * x[0] * x[1]
/// };
/// let x = [1.5, -2.];
/// let numeric = differentiate_numerically(&x, &mut f, 1e-4);
/// let mut analytic = [0.; 2];
/// f(&x, &mut analytic);
/// assert_relative_eq!(numeric[0], analytic[0], epsilon = 1e-6);
/// assert_relative_eq!(numeric[1], analytic[1], epsilon = 1e-6);
/// ```
///
/// # Panics
///
/// Panics if `$\mathtt{step} \leq 0$`.
pub fn differentiate_numerically<F, O>(x: &[F], objective: &mut O, step: F) -> Vec<F>
where
    F: RealField + Float,
    O: Differentiable<F> + ?Sized,
{
    assert!(step > F::zero(), "step must be > 0");
    let mut point = x.to_vec();
    let mut scratch = vec![F::zero(); x.len()];
    (0..x.len())
        .map(|i| {
            central_difference(&mut point, i, step, |p| objective.evaluate(p, &mut scratch))
        })
        .collect()
}
