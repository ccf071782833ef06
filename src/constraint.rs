//! Constraint records consumed by the [`PenaltySolver`](struct.PenaltySolver.html).
//!
//! Every constraint has a scalar value `$c(\vec{x})$` that is compared
//! against zero. A linear constraint has the value
//! `$\sum_k w_k x_{i_k} - \mathrm{rhs}$`, a nonlinear one the value of its
//! [`Evaluable`].
use std::fmt;

use nalgebra::RealField;
use num_traits::Float;

use crate::utils::central_difference;

/// How the value of a constraint is compared against zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// `$c(\vec{x}) = 0$`
    Equal,
    /// `$c(\vec{x}) \geq 0$`
    GreaterThan,
    /// `$c(\vec{x}) \leq 0$`
    LessThan,
}

impl Comparison {
    /// The true, unsquared violation of a constraint with value `value`.
    pub fn violation<F: RealField + Float>(self, value: F) -> F {
        match self {
            Self::Equal => Float::abs(value),
            Self::GreaterThan => Float::max(-value, F::zero()),
            Self::LessThan => Float::max(value, F::zero()),
        }
    }

    /// The penalized part of `value` relative to `offset`, if any.
    fn active<F: RealField + Float>(self, value: F, offset: F) -> Option<F> {
        let active = match self {
            Self::Equal => true,
            Self::GreaterThan => value < offset,
            Self::LessThan => value > offset,
        };
        active.then(|| value - offset)
    }

    fn clamp_offset<F: RealField + Float>(self, offset: F) -> F {
        match self {
            Self::Equal => offset,
            Self::GreaterThan => Float::max(offset, F::zero()),
            Self::LessThan => Float::min(offset, F::zero()),
        }
    }
}

/// A scalar function of the variables.
///
/// Closures `FnMut(&[F]) -> F` implement this without an analytic gradient.
pub trait Evaluable<F> {
    /// Evaluate at the full variable vector `x`.
    fn value(&mut self, x: &[F]) -> F;

    /// Write the partial derivatives into `gradient`.
    ///
    /// `gradient[k]` is the derivative with respect to the `k`-th variable
    /// index the function was registered with. Return `false` if there is no
    /// analytic gradient, then central differences are used.
    fn gradient(&mut self, x: &[F], gradient: &mut [F]) -> bool {
        let _ = (x, gradient);
        false
    }
}

impl<F, T> Evaluable<F> for T
where
    T: FnMut(&[F]) -> F,
{
    fn value(&mut self, x: &[F]) -> F {
        self(x)
    }
}

/// `$\sum_k w_k x_{i_k} - \mathrm{rhs}$`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint<F> {
    /// Pairs of variable index and weight.
    pub terms: Vec<(usize, F)>,
    pub rhs: F,
}

impl<F: RealField + Float> LinearConstraint<F> {
    pub fn new(terms: Vec<(usize, F)>, rhs: F) -> Self {
        Self { terms, rhs }
    }

    pub fn value(&self, x: &[F]) -> F {
        self.terms
            .iter()
            .fold(-self.rhs, |acc, &(i, weight)| acc + weight * x[i])
    }
}

/// A nonlinear function of a subset of the variables.
///
/// `indices` lists the variables the function depends on. Only those are
/// differentiated, either analytically or numerically.
pub struct NonlinearFunction<'a, F> {
    indices: Vec<usize>,
    evaluator: Box<dyn Evaluable<F> + 'a>,
    partials: Vec<F>,
}

impl<'a, F: RealField + Float> NonlinearFunction<'a, F> {
    pub fn new<E>(indices: Vec<usize>, evaluator: E) -> Self
    where
        E: Evaluable<F> + 'a,
    {
        let partials = vec![F::zero(); indices.len()];
        Self {
            indices,
            evaluator: Box::new(evaluator),
            partials,
        }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn value(&mut self, x: &[F]) -> F {
        self.evaluator.value(x)
    }

    /// `$\vec{g} \gets \vec{g} + s\nabla f(\vec{x})$`
    ///
    /// `x` is only perturbed for finite differences and restored afterwards.
    pub(crate) fn accumulate_gradient(&mut self, x: &mut [F], steps: &[F], scale: F, gradient: &mut [F]) {
        let Self {
            indices,
            evaluator,
            partials,
        } = self;
        if !evaluator.gradient(x, partials) {
            for (partial, &i) in partials.iter_mut().zip(indices.iter()) {
                *partial = central_difference(x, i, steps[i], |p| evaluator.value(p));
            }
        }
        for (&partial, &i) in partials.iter().zip(indices.iter()) {
            gradient[i] += scale * partial;
        }
    }
}

impl<F> fmt::Debug for NonlinearFunction<'_, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NonlinearFunction")
            .field("indices", &self.indices)
            .finish_non_exhaustive()
    }
}

/// The two shapes a constraint function can have.
#[derive(Debug)]
pub enum ConstraintKind<'a, F> {
    Linear(LinearConstraint<F>),
    Nonlinear(NonlinearFunction<'a, F>),
}

/// A constraint together with its penalty offset.
///
/// The offset shifts the point at which the penalty starts. It starts at
/// zero and is moved by the [`PenaltySolver`](struct.PenaltySolver.html)
/// after every outer iteration. A `GreaterThan` offset never becomes
/// negative and a `LessThan` offset never becomes positive.
#[derive(Debug)]
pub struct Constraint<'a, F> {
    kind: ConstraintKind<'a, F>,
    comparison: Comparison,
    offset: F,
}

impl<'a, F: RealField + Float> Constraint<'a, F> {
    pub fn new(kind: ConstraintKind<'a, F>, comparison: Comparison) -> Self {
        Self {
            kind,
            comparison,
            offset: F::zero(),
        }
    }

    /// `$\sum_k w_k x_{i_k} - \mathrm{rhs}$` compared against zero.
    pub fn linear(terms: Vec<(usize, F)>, rhs: F, comparison: Comparison) -> Self {
        Self::new(
            ConstraintKind::Linear(LinearConstraint::new(terms, rhs)),
            comparison,
        )
    }

    pub fn nonlinear(function: NonlinearFunction<'a, F>, comparison: Comparison) -> Self {
        Self::new(ConstraintKind::Nonlinear(function), comparison)
    }

    pub fn kind(&self) -> &ConstraintKind<'a, F> {
        &self.kind
    }

    pub fn comparison(&self) -> Comparison {
        self.comparison
    }

    pub fn value(&mut self, x: &[F]) -> F {
        match &mut self.kind {
            ConstraintKind::Linear(linear) => linear.value(x),
            ConstraintKind::Nonlinear(function) => function.value(x),
        }
    }

    /// The true violation at `x`, ignoring the offset.
    pub fn violation(&mut self, x: &[F]) -> F {
        let value = self.value(x);
        self.comparison.violation(value)
    }

    pub fn offset(&self) -> F {
        self.offset
    }

    pub fn reset_offset(&mut self) {
        self.offset = F::zero();
    }

    pub(crate) fn max_index(&self) -> Option<usize> {
        match &self.kind {
            ConstraintKind::Linear(linear) => linear.terms.iter().map(|&(i, _)| i).max(),
            ConstraintKind::Nonlinear(function) => function.indices().iter().copied().max(),
        }
    }

    /// The shifted violation `$c(\vec{x}) - o$` if the penalty is active
    /// for the value `value`.
    pub(crate) fn penalized(&self, value: F) -> Option<F> {
        self.comparison.active(value, self.offset)
    }

    /// `$\vec{g} \gets \vec{g} + s\nabla c(\vec{x})$`
    pub(crate) fn accumulate_gradient(&mut self, x: &mut [F], steps: &[F], scale: F, gradient: &mut [F]) {
        match &mut self.kind {
            ConstraintKind::Linear(linear) => {
                for &(i, weight) in &linear.terms {
                    gradient[i] += scale * weight;
                }
            }
            ConstraintKind::Nonlinear(function) => {
                function.accumulate_gradient(x, steps, scale, gradient)
            }
        }
    }

    /// Move the offset against the value measured after an outer iteration.
    pub(crate) fn adjust_offset(&mut self, value: F, rate: F) {
        self.offset = self.comparison.clamp_offset(self.offset - rate * value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct Circle;

    impl Evaluable<f64> for Circle {
        fn value(&mut self, x: &[f64]) -> f64 {
            x[1] * x[1] + x[2] * x[2] - 1.
        }

        fn gradient(&mut self, x: &[f64], gradient: &mut [f64]) -> bool {
            gradient[0] = 2. * x[1];
            gradient[1] = 2. * x[2];
            true
        }
    }

    #[test]
    fn linear_value_and_gradient() {
        let mut c = Constraint::linear(vec![(0, 2.), (2, -1.)], 3., Comparison::Equal);
        let mut x = [1., 7., 4.];
        assert_eq!(c.value(&x), -5.);
        assert_eq!(c.violation(&x), 5.);
        assert_eq!(c.max_index(), Some(2));
        let mut gradient = [1.; 3];
        c.accumulate_gradient(&mut x, &[0.1; 3], 2., &mut gradient);
        assert_eq!(gradient, [5., 1., -1.]);
    }

    #[test]
    fn analytic_and_numeric_gradients_agree() {
        let mut analytic = NonlinearFunction::new(vec![1, 2], Circle);
        let mut numeric = NonlinearFunction::new(vec![1, 2], |x: &[f64]| {
            x[1] * x[1] + x[2] * x[2] - 1.
        });
        let mut x = [5., 0.5, -2.];
        assert_eq!(analytic.value(&x), numeric.value(&x));

        let mut g_analytic = [0.; 3];
        let mut g_numeric = [0.; 3];
        analytic.accumulate_gradient(&mut x, &[1e-3; 3], 1., &mut g_analytic);
        numeric.accumulate_gradient(&mut x, &[1e-3; 3], 1., &mut g_numeric);
        assert_eq!(g_analytic, [0., 1., -4.]);
        for (a, n) in g_analytic.iter().zip(&g_numeric) {
            assert_relative_eq!(a, n, epsilon = 1e-9);
        }
        assert_eq!(x, [5., 0.5, -2.]);
    }

    #[test]
    fn violations() {
        assert_eq!(Comparison::Equal.violation(-2.), 2.);
        assert_eq!(Comparison::GreaterThan.violation(-2.), 2.);
        assert_eq!(Comparison::GreaterThan.violation(2.), 0.);
        assert_eq!(Comparison::LessThan.violation(2.), 2.);
        assert_eq!(Comparison::LessThan.violation(-2.), 0.);
    }

    #[test]
    fn penalty_is_gated_by_offset() {
        let mut gt = Constraint::linear(vec![(0, 1.)], 0., Comparison::GreaterThan);
        assert_eq!(gt.penalized(1.), None);
        assert_eq!(gt.penalized(-1.), Some(-1.));
        gt.adjust_offset(-1., 0.5);
        assert_eq!(gt.offset(), 0.5);
        // satisfied but below the raised offset
        assert_eq!(gt.penalized(0.25), Some(-0.25));

        let mut lt = Constraint::linear(vec![(0, 1.)], 0., Comparison::LessThan);
        assert_eq!(lt.penalized(-1.), None);
        assert_eq!(lt.penalized(2.), Some(2.));
        lt.adjust_offset(2., 1.);
        assert_eq!(lt.offset(), -2.);

        let eq = Constraint::linear(vec![(0, 1.)], 0., Comparison::Equal);
        assert_eq!(eq.penalized(0.), Some(0.));
    }

    #[test]
    fn offsets_keep_their_sign() {
        let mut gt = Constraint::linear(vec![(0, 1.)], 0., Comparison::GreaterThan);
        gt.adjust_offset(3., 1.);
        assert_eq!(gt.offset(), 0.);
        let mut lt = Constraint::linear(vec![(0, 1.)], 0., Comparison::LessThan);
        lt.adjust_offset(-3., 1.);
        assert_eq!(lt.offset(), 0.);
        let mut eq = Constraint::linear(vec![(0, 1.)], 0., Comparison::Equal);
        eq.adjust_offset(3., 1.);
        assert_eq!(eq.offset(), -3.);
        eq.reset_offset();
        assert_eq!(eq.offset(), 0.);
    }
}
