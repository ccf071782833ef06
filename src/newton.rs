//! Newton-Raphson iteration for small dense nonlinear systems.
use nalgebra::{convert, DMatrix, DVector, RealField};
use num_traits::Float;

use crate::lu::{back_substitute, decompose_in_place};
use crate::{Error, NonlinearSystem};

/// Information about a converged Newton-Raphson solve.
#[derive(Debug, Clone, PartialEq)]
pub struct NewtonReport<F> {
    /// Number of residual and Jacobian evaluations.
    pub trials: usize,
    /// `$\sum_i |r_i|$` at the last evaluation.
    pub residual_norm: F,
    /// `$\sum_i |\Delta_i|$` of the last step, zero if none was taken.
    pub step_norm: F,
}

/// Newton-Raphson root finder.
///
/// Each trial evaluates the residuals `$\vec{r}$` and the Jacobian
/// `$\mathbf{J}$`, solves `$\mathbf{J}\vec{\Delta} = \vec{r}$` by
/// [LU decomposition](fn.decompose_in_place.html) and updates
/// `$\vec{x} \gets \vec{x} - \vec{\Delta}$`.
///
/// The iteration stops successfully as soon as `$\sum_i |r_i| \leq
/// \mathtt{tol\_f}$` or `$\sum_i |\Delta_i| \leq \mathtt{tol\_x}$`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NewtonRaphson<F> {
    tol_x: F,
    tol_f: F,
    max_trials: usize,
}

impl<F: RealField + Float> NewtonRaphson<F> {
    pub fn new() -> Self {
        Self {
            tol_x: convert(1e-4),
            tol_f: convert(1e-4),
            max_trials: 20,
        }
    }

    /// Set the tolerance on the summed absolute step.
    ///
    /// # Panics
    ///
    /// Panics if `$\mathtt{tol\_x} < 0$`.
    pub fn with_tol_x(self, tol_x: F) -> Self {
        assert!(tol_x >= F::zero(), "tol_x must be >= 0");
        Self { tol_x, ..self }
    }

    /// Set the tolerance on the summed absolute residual.
    ///
    /// # Panics
    ///
    /// Panics if `$\mathtt{tol\_f} < 0$`.
    pub fn with_tol_f(self, tol_f: F) -> Self {
        assert!(tol_f >= F::zero(), "tol_f must be >= 0");
        Self { tol_f, ..self }
    }

    /// Set the maximal number of trials.
    ///
    /// # Panics
    ///
    /// Panics if `$\mathtt{max\_trials} = 0$`.
    pub fn with_max_trials(self, max_trials: usize) -> Self {
        assert!(max_trials > 0, "max_trials must be > 0");
        Self { max_trials, ..self }
    }

    /// Solve `system` starting from `x`, which is updated in place.
    ///
    /// # Errors
    ///
    /// - [`Error::SingularMatrix`] if a Jacobian has an all-zero row.
    /// - [`Error::TooManyIterations`] if the trial budget is used up. `x`
    ///   then holds the last iterate.
    pub fn solve<S>(&self, x: &mut DVector<F>, system: &mut S) -> Result<NewtonReport<F>, Error>
    where
        S: NonlinearSystem<F> + ?Sized,
    {
        let n = x.nrows();
        let mut jacobian = DMatrix::zeros(n, n);
        let mut residuals = DVector::zeros(n);
        let mut scale = vec![F::zero(); n];
        let mut permutation = vec![0; n];

        for trial in 1..=self.max_trials {
            system.evaluate(x, &mut jacobian, &mut residuals);
            let residual_norm = abs_sum(&residuals);
            if residual_norm <= self.tol_f {
                return Ok(NewtonReport {
                    trials: trial,
                    residual_norm,
                    step_norm: F::zero(),
                });
            }

            if let Err(err) = decompose_in_place(&mut jacobian, &mut scale, &mut permutation) {
                log::warn!("Newton-Raphson trial {trial}: {err}");
                return Err(err);
            }
            back_substitute(&jacobian, &permutation, residuals.as_mut_slice());
            let step_norm = abs_sum(&residuals);
            *x -= &residuals;
            if step_norm <= self.tol_x {
                return Ok(NewtonReport {
                    trials: trial,
                    residual_norm,
                    step_norm,
                });
            }
        }
        Err(Error::TooManyIterations {
            trials: self.max_trials,
        })
    }
}

impl<F: RealField + Float> Default for NewtonRaphson<F> {
    fn default() -> Self {
        Self::new()
    }
}

fn abs_sum<F: RealField + Float>(v: &DVector<F>) -> F {
    v.iter().fold(F::zero(), |acc, &x| acc + Float::abs(x))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn power_sums(x: &DVector<f64>, jacobian: &mut DMatrix<f64>, residuals: &mut DVector<f64>) {
        residuals[0] = x[0] + x[1] + x[2] - 6.;
        residuals[1] = x[0] * x[0] + x[1] * x[1] + x[2] * x[2] - 14.;
        residuals[2] = x[0].powi(3) + x[1].powi(3) + x[2].powi(3) - 36.;
        for j in 0..3 {
            jacobian[(0, j)] = 1.;
            jacobian[(1, j)] = 2. * x[j];
            jacobian[(2, j)] = 3. * x[j] * x[j];
        }
    }

    #[test]
    fn converges_to_permutation_of_roots() {
        let mut x = DVector::from_vec(vec![1.5, 2.4, 3.3]);
        let report = NewtonRaphson::new()
            .with_tol_x(1e-4)
            .with_tol_f(1e-4)
            .with_max_trials(10)
            .solve(&mut x, &mut power_sums)
            .unwrap();
        assert!(report.trials <= 10);
        let mut roots: Vec<f64> = x.iter().copied().collect();
        roots.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_relative_eq!(roots[0], 1., epsilon = 1e-4);
        assert_relative_eq!(roots[1], 2., epsilon = 1e-4);
        assert_relative_eq!(roots[2], 3., epsilon = 1e-4);
    }

    #[test]
    fn already_solved() {
        let mut x = DVector::from_vec(vec![3., 1., 2.]);
        let report = NewtonRaphson::new().solve(&mut x, &mut power_sums).unwrap();
        assert_eq!(report.trials, 1);
        assert_eq!(report.residual_norm, 0.);
        assert_eq!(x, DVector::from_vec(vec![3., 1., 2.]));
    }

    #[test]
    fn trial_budget() {
        let mut x = DVector::from_vec(vec![1.5, 2.4, 3.3]);
        let result = NewtonRaphson::new()
            .with_max_trials(1)
            .solve(&mut x, &mut power_sums);
        assert!(matches!(result, Err(Error::TooManyIterations { trials: 1 })));
    }

    #[test]
    fn singular_jacobian() {
        let mut x = DVector::from_vec(vec![0., 0.]);
        let mut system = |x: &DVector<f64>, jacobian: &mut DMatrix<f64>, residuals: &mut DVector<f64>| {
            residuals[0] = x[0] - 1.;
            residuals[1] = 1.;
            jacobian.fill(0.);
            jacobian[(0, 0)] = 1.;
        };
        let result = NewtonRaphson::new().solve(&mut x, &mut system);
        assert!(matches!(result, Err(Error::SingularMatrix)));
    }

    #[test]
    #[should_panic(expected = "tol_x must be >= 0")]
    fn nan_tolerance() {
        NewtonRaphson::<f64>::new().with_tol_x(f64::NAN);
    }

    #[test]
    #[should_panic(expected = "max_trials must be > 0")]
    fn zero_trials() {
        NewtonRaphson::<f64>::new().with_max_trials(0);
    }
}
