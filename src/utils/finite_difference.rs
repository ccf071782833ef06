//! Central difference quotients.
use nalgebra::{convert, RealField};
use num_traits::Float;

/// Approximate `$\partial f/\partial x_i$` by
/// ```math
///   \frac{f(\vec{x} + h\vec{e}_i) - f(\vec{x} - h\vec{e}_i)}{2h}.
/// ```
///
/// `x[i]` is perturbed in place and restored before returning.
pub fn central_difference<F, G>(x: &mut [F], i: usize, step: F, mut f: G) -> F
where
    F: RealField + Float,
    G: FnMut(&[F]) -> F,
{
    debug_assert!(step > F::zero());
    let xi = x[i];
    x[i] = xi + step;
    let forward = f(x);
    x[i] = xi - step;
    let backward = f(x);
    x[i] = xi;
    (forward - backward) / (step * convert(2.))
}
