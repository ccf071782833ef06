use nalgebra::{DMatrix, DVector, RealField};

/// A scalar function together with its gradient.
///
/// This is what [`ConjugateGradient`](struct.ConjugateGradient.html) needs to
/// minimize. Closures `FnMut(&[F], &mut [F]) -> F` implement it directly.
pub trait Differentiable<F> {
    /// Evaluate the function at `x` and write the gradient into `gradient`.
    ///
    /// `gradient` has the same length as `x`. Its previous content is
    /// undefined, every entry must be written.
    fn evaluate(&mut self, x: &[F], gradient: &mut [F]) -> F;
}

impl<F, T> Differentiable<F> for T
where
    T: FnMut(&[F], &mut [F]) -> F,
{
    fn evaluate(&mut self, x: &[F], gradient: &mut [F]) -> F {
        self(x, gradient)
    }
}

/// A square system of nonlinear equations `$\vec{r}(\vec{x}) = \vec{0}$`.
///
/// This is what [`NewtonRaphson`](struct.NewtonRaphson.html) needs to compute
/// the residuals and the Jacobian. Closures with the signature of
/// [`evaluate`](#tymethod.evaluate) implement it directly.
pub trait NonlinearSystem<F: RealField> {
    /// Fill the Jacobian `$\mathbf{J}_{ij} = \partial r_i / \partial x_j$` and
    /// the residual vector at `x`.
    fn evaluate(&mut self, x: &DVector<F>, jacobian: &mut DMatrix<F>, residuals: &mut DVector<F>);
}

impl<F, T> NonlinearSystem<F> for T
where
    F: RealField,
    T: FnMut(&DVector<F>, &mut DMatrix<F>, &mut DVector<F>),
{
    fn evaluate(&mut self, x: &DVector<F>, jacobian: &mut DMatrix<F>, residuals: &mut DVector<F>) {
        self(x, jacobian, residuals)
    }
}

/// Early termination predicate for [`ConjugateGradient`](struct.ConjugateGradient.html).
///
/// Called before every iteration with the current iterate, the best function
/// value found so far and the number of completed iterations. Returning
/// `true` ends the minimization with
/// [`Status::Suboptimal`](enum.Status.html#variant.Suboptimal).
pub trait Terminate<F> {
    fn terminate(&mut self, x: &[F], best_value: F, iteration: usize) -> bool;
}

impl<F, T> Terminate<F> for T
where
    T: FnMut(&[F], F, usize) -> bool,
{
    fn terminate(&mut self, x: &[F], best_value: F, iteration: usize) -> bool {
        self(x, best_value, iteration)
    }
}

/// A [`Terminate`] that never stops early.
#[derive(Copy, Clone, Debug, Default)]
pub struct NeverTerminate;

impl<F> Terminate<F> for NeverTerminate {
    fn terminate(&mut self, _x: &[F], _best_value: F, _iteration: usize) -> bool {
        false
    }
}
