use nalgebra::RealField;
use num_traits::Float;

use crate::runner::{DefaultRunner, ParallelRunner};
use crate::{CancellationToken, ConjugateGradient, Constraint, Differentiable, NonlinearFunction, Status};

/// Information about a constrained minimization.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstrainedReport<F> {
    pub status: Status,
    /// Value of the objective alone at the returned point.
    pub value: F,
    /// Value of the penalized function minimized in the last outer iteration.
    pub penalty_value: F,
    pub outer_iterations: usize,
    /// Conjugate-gradient iterations summed over all outer iterations.
    pub inner_iterations: usize,
    pub number_of_evaluations: usize,
    /// Largest true constraint violation at the returned point.
    pub max_violation: F,
    /// Largest true violation after each outer iteration.
    pub violation_history: Vec<F>,
}

impl<F> ConstrainedReport<F> {
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// Penalty method with adaptively shifted penalty zones.
///
/// Every outer iteration minimizes
/// ```math
///   f(\vec{x}) + \sum_{j\ \text{active}} \bigl(c_j(\vec{x}) - o_j\bigr)^2
/// ```
/// with the [`ConjugateGradient`](struct.ConjugateGradient.html) minimizer,
/// where `$o_j$` is the offset of constraint `$j$`. An equality is always
/// active, `GreaterThan` only for `$c_j < o_j$` and `LessThan` only for
/// `$c_j > o_j$`. Afterwards every offset is moved by
/// `$o_j \gets o_j - \mathtt{offset\_rate}\cdot c_j(\vec{x})$`, clamped to
/// `$o_j \geq 0$` for `GreaterThan` and `$o_j \leq 0$` for `LessThan`.
///
/// This recenters the penalty so that its minimum lands on the constraint
/// surface, much like the multiplier update of an augmented Lagrangian.
/// Offsets are kept in the [`Constraint`](struct.Constraint.html)s, so a
/// second call continues where the first stopped unless they are reset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PenaltySolver<F> {
    inner_iterations: usize,
    outer_iterations: usize,
    offset_rate: F,
    violation_tolerance: F,
    minimizer: ConjugateGradient<F>,
}

impl<F: RealField + Float> PenaltySolver<F> {
    pub fn new() -> Self {
        Self {
            inner_iterations: 100,
            outer_iterations: 10,
            offset_rate: F::one(),
            violation_tolerance: F::zero(),
            minimizer: ConjugateGradient::new(),
        }
    }

    /// Set the iteration cap of every conjugate-gradient run.
    ///
    /// # Panics
    ///
    /// Panics if `$\mathtt{inner\_iterations} = 0$`.
    pub fn with_inner_iterations(self, inner_iterations: usize) -> Self {
        assert!(inner_iterations > 0, "inner_iterations must be > 0");
        Self {
            inner_iterations,
            ..self
        }
    }

    /// Set the number of offset adjustments.
    ///
    /// # Panics
    ///
    /// Panics if `$\mathtt{outer\_iterations} = 0$`.
    pub fn with_outer_iterations(self, outer_iterations: usize) -> Self {
        assert!(outer_iterations > 0, "outer_iterations must be > 0");
        Self {
            outer_iterations,
            ..self
        }
    }

    /// # Panics
    ///
    /// Panics if `$\mathtt{offset\_rate} \leq 0$`.
    pub fn with_offset_rate(self, offset_rate: F) -> Self {
        assert!(offset_rate > F::zero(), "offset_rate must be > 0");
        Self {
            offset_rate,
            ..self
        }
    }

    /// Stop the outer loop as soon as no constraint is violated by more
    /// than `violation_tolerance`.
    ///
    /// With the default of zero all outer iterations are run. If the
    /// tolerance is positive and still not met at the end, the status is
    /// [`Suboptimal`](enum.Status.html#variant.Suboptimal).
    ///
    /// # Panics
    ///
    /// Panics if `$\mathtt{violation\_tolerance} < 0$`.
    pub fn with_violation_tolerance(self, violation_tolerance: F) -> Self {
        assert!(
            violation_tolerance >= F::zero(),
            "violation_tolerance must be >= 0"
        );
        Self {
            violation_tolerance,
            ..self
        }
    }

    /// Configure the inner minimizer. Its iteration cap is replaced by
    /// `inner_iterations`.
    pub fn with_minimizer(self, minimizer: ConjugateGradient<F>) -> Self {
        Self { minimizer, ..self }
    }

    pub fn inner_iterations(&self) -> usize {
        self.inner_iterations
    }

    pub fn outer_iterations(&self) -> usize {
        self.outer_iterations
    }

    /// Minimize `objective` subject to `constraints`, starting from `x`.
    ///
    /// `step_sizes[i]` is the finite-difference step of variable `i`, used for
    /// nonlinear functions without an analytic gradient. On return `x` holds
    /// the solution.
    ///
    /// # Panics
    ///
    /// Panics if `step_sizes` does not have one positive entry per variable or
    /// if a function refers to a variable index out of range.
    pub fn solve<'a>(
        &self,
        x: &mut [F],
        objective: &mut NonlinearFunction<'a, F>,
        constraints: &mut [Constraint<'a, F>],
        step_sizes: &[F],
    ) -> ConstrainedReport<F> {
        let runner = DefaultRunner::default();
        let cancel = CancellationToken::new();
        self.solve_with(x, objective, constraints, step_sizes, &runner, &cancel)
    }

    /// Like [`solve`](#method.solve) with an explicit runner and
    /// cancellation token.
    ///
    /// Setting the token stops the running inner minimization at its next
    /// iteration and ends the outer loop.
    pub fn solve_with<'a>(
        &self,
        x: &mut [F],
        objective: &mut NonlinearFunction<'a, F>,
        constraints: &mut [Constraint<'a, F>],
        step_sizes: &[F],
        runner: &dyn ParallelRunner,
        cancel: &CancellationToken,
    ) -> ConstrainedReport<F> {
        let n = x.len();
        assert_eq!(step_sizes.len(), n, "step_sizes must have one entry per variable");
        assert!(
            step_sizes.iter().all(|step| *step > F::zero()),
            "step_sizes must be > 0"
        );
        assert!(
            objective.indices().iter().all(|&i| i < n)
                && constraints.iter().all(|c| c.max_index().map_or(true, |i| i < n)),
            "variable index out of range"
        );

        let minimizer = self.minimizer.with_max_iterations(self.inner_iterations);
        let check_tolerance = self.violation_tolerance > F::zero();
        let mut report = ConstrainedReport {
            status: Status::Success,
            value: F::zero(),
            penalty_value: F::zero(),
            outer_iterations: 0,
            inner_iterations: 0,
            number_of_evaluations: 0,
            max_violation: F::zero(),
            violation_history: Vec::with_capacity(self.outer_iterations),
        };

        for outer in 0..self.outer_iterations {
            if cancel.is_cancelled() {
                break;
            }
            // the inner run sets its own token when it hits the iteration cap
            let inner_cancel = CancellationToken::new();
            let mut terminate = |_: &[F], _: F, _: usize| cancel.is_cancelled();
            let inner = {
                let mut penalized = PenalizedObjective::new(objective, constraints, step_sizes);
                minimizer.minimize_with(x, &mut penalized, &mut terminate, runner, &inner_cancel)
            };
            report.outer_iterations = outer + 1;
            report.inner_iterations += inner.iterations;
            report.number_of_evaluations += inner.number_of_evaluations;
            report.penalty_value = inner.value;
            report.status = inner.status;

            let max_violation = Self::max_violation(x, constraints);
            report.violation_history.push(max_violation);
            log::debug!(
                "outer iteration {outer}: objective {}, penalized {}, max violation {max_violation}",
                objective.value(x),
                inner.value
            );
            if inner.status == Status::Unbounded
                || (check_tolerance && max_violation <= self.violation_tolerance)
            {
                break;
            }
            for constraint in constraints.iter_mut() {
                let value = constraint.value(x);
                constraint.adjust_offset(value, self.offset_rate);
            }
        }

        report.value = objective.value(x);
        report.max_violation = Self::max_violation(x, constraints);
        if report.status != Status::Unbounded
            && (cancel.is_cancelled()
                || (check_tolerance && report.max_violation > self.violation_tolerance))
        {
            report.status = Status::Suboptimal;
        }
        report
    }

    /// Largest true violation of `constraints` at `x`, zero without constraints.
    pub fn max_violation(x: &[F], constraints: &mut [Constraint<'_, F>]) -> F {
        constraints
            .iter_mut()
            .fold(F::zero(), |acc, c| Float::max(acc, c.violation(x)))
    }
}

impl<F: RealField + Float> Default for PenaltySolver<F> {
    fn default() -> Self {
        Self::new()
    }
}

/// The objective plus the squared shifted violations of all active
/// constraints.
struct PenalizedObjective<'s, 'a, F> {
    objective: &'s mut NonlinearFunction<'a, F>,
    constraints: &'s mut [Constraint<'a, F>],
    step_sizes: &'s [F],
    point: Vec<F>,
}

impl<'s, 'a, F: RealField + Float> PenalizedObjective<'s, 'a, F> {
    fn new(
        objective: &'s mut NonlinearFunction<'a, F>,
        constraints: &'s mut [Constraint<'a, F>],
        step_sizes: &'s [F],
    ) -> Self {
        Self {
            objective,
            constraints,
            step_sizes,
            point: vec![F::zero(); step_sizes.len()],
        }
    }
}

impl<F: RealField + Float> Differentiable<F> for PenalizedObjective<'_, '_, F> {
    fn evaluate(&mut self, x: &[F], gradient: &mut [F]) -> F {
        self.point.copy_from_slice(x);
        gradient.iter_mut().for_each(|g| *g = F::zero());

        let mut total = self.objective.value(&self.point);
        self.objective
            .accumulate_gradient(&mut self.point, self.step_sizes, F::one(), gradient);
        for constraint in self.constraints.iter_mut() {
            let value = constraint.value(&self.point);
            if let Some(shifted) = constraint.penalized(value) {
                total += shifted * shifted;
                constraint.accumulate_gradient(
                    &mut self.point,
                    self.step_sizes,
                    shifted + shifted,
                    gradient,
                );
            }
        }
        total
    }
}
