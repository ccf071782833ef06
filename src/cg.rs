use nalgebra::{convert, RealField};
use num_traits::Float;

use crate::runner::{DefaultRunner, ParallelRunner};
use crate::{CancellationToken, Differentiable, NeverTerminate, Terminate};

mod fit;
mod line_search;
mod state;

#[cfg(test)]
mod test_helpers;
#[cfg(test)]
mod test_minimize;
#[cfg(test)]
mod test_restarts;
#[cfg(test)]
mod test_termination;

use state::Minimization;

/// Overall outcome of a minimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// A minimum was found within the tolerances.
    Success,
    /// Stopped early: by the caller, the termination predicate or the
    /// iteration cap. The best point found so far is still returned.
    Suboptimal,
    /// The best function value is not finite.
    Unbounded,
}

/// The concrete reason the minimization stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The gradient norm dropped below the tolerance.
    Converged,
    /// The search direction vanished.
    ZeroDirection,
    /// The best value did not improve within the stagnation window.
    Stagnated,
    /// The cancellation token was set from outside.
    Cancelled,
    /// The termination predicate returned `true`.
    Terminated,
    /// The iteration cap was reached.
    MaxIterations,
    /// A function value of `$-\infty$` or `NaN` was found.
    NotFinite,
}

impl TerminationReason {
    fn status(self) -> Status {
        match self {
            Self::Converged | Self::ZeroDirection | Self::Stagnated => Status::Success,
            Self::Cancelled | Self::Terminated | Self::MaxIterations => Status::Suboptimal,
            Self::NotFinite => Status::Unbounded,
        }
    }
}

/// Information about the minimization.
#[derive(Debug, Clone, PartialEq)]
pub struct MinimizationReport<F> {
    pub status: Status,
    pub termination: TerminationReason,
    /// Value of the objective at the returned point.
    pub value: F,
    /// Norm of the gradient at the returned point.
    pub gradient_norm: F,
    pub iterations: usize,
    /// Number of function and gradient evaluations.
    pub number_of_evaluations: usize,
}

impl<F> MinimizationReport<F> {
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// Empirically tuned thresholds of the line search.
///
/// The defaults work well in practice but are not optimal for every
/// problem. Changing them changes the sequence of probes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSearchTuning<F> {
    /// Factor by which the guessed step may grow from one iteration to the next.
    pub max_step_growth: F,
    /// The fast fit is rejected if its minimum lies further than this
    /// multiple of the probed step.
    pub max_fit_extrapolation: F,
    /// Largest accepted cosine between the interpolated gradient and the
    /// search direction in the fast path.
    pub max_cos: F,
    /// Iterations without improvement after which step guesses are jittered.
    pub randomize_after: usize,
    /// Relative amplitude of the jitter.
    pub random_jitter: F,
    /// Iterations without improvement after which the minimization stops.
    pub stagnation_window: usize,
    /// Armijo constant.
    pub sufficient_decrease: F,
    /// Required reduction of `$|\phi'|$` relative to the start of the line.
    pub slope_shrink: F,
    /// The bracket must shrink at least by this factor per probe, otherwise
    /// the line search only bisects.
    pub bracket_shrink: F,
    /// Part of a bracket in which a fitted step is accepted.
    pub fit_interior: F,
    /// Slopes closer than this (relative) make a bisection suspect.
    pub suspect_slope_ratio: F,
    pub stale_probe_limit: usize,
    pub lost_minimum_limit: usize,
    pub suspect_bisection_limit: usize,
    pub bisections_with_lost_limit: usize,
    /// Hard cap on probes of one robust line search.
    pub max_probes: usize,
}

impl<F: RealField + Float> Default for LineSearchTuning<F> {
    fn default() -> Self {
        Self {
            max_step_growth: convert(8.),
            max_fit_extrapolation: convert(10.),
            max_cos: convert(0.5),
            randomize_after: 6,
            random_jitter: convert(0.25),
            stagnation_window: 10,
            sufficient_decrease: convert(1e-4),
            slope_shrink: convert(0.5),
            bracket_shrink: convert(0.75),
            fit_interior: convert(0.9),
            suspect_slope_ratio: convert(1e-3),
            stale_probe_limit: 3,
            lost_minimum_limit: 3,
            suspect_bisection_limit: 3,
            bisections_with_lost_limit: 2,
            max_probes: 30,
        }
    }
}

/// Nonlinear conjugate-gradient minimizer.
///
/// Search directions follow Hestenes-Stiefel and are reset to steepest
/// descent every `no_reset_run_len` iterations, a run length that grows by
/// `reset_expand_factor` after each reset. Every iteration starts with a
/// single probe at a step guessed from the curvature seen along the previous
/// direction. If a cubic fit through the start and the probe is trustworthy
/// the next iterate is the fitted minimum, _without_ evaluating the
/// objective there. Otherwise a robust bracketing line search takes over.
///
/// All vector arithmetic goes through a
/// [`ParallelVectorContext`](struct.ParallelVectorContext.html), so with
/// `num_threads > 1` long vectors are processed by the
/// [`ParallelRunner`](trait.ParallelRunner.html).
///
/// The returned point is always one at which the objective was actually
/// evaluated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConjugateGradient<F> {
    first_step: F,
    no_reset_run_len: usize,
    reset_expand_factor: F,
    max_iterations: usize,
    gradient_tolerance: F,
    num_threads: usize,
    seed: u64,
    tuning: LineSearchTuning<F>,
}

impl<F: RealField + Float> ConjugateGradient<F> {
    pub fn new() -> Self {
        Self {
            first_step: F::one(),
            no_reset_run_len: 20,
            reset_expand_factor: convert(1.5),
            max_iterations: 1000,
            gradient_tolerance: F::default_epsilon() * convert(30.0),
            num_threads: 1,
            seed: 0x5eed_c0de,
            tuning: LineSearchTuning::default(),
        }
    }

    /// Set the step of the very first probe along `$-\nabla f(\vec{x}_0)$`.
    ///
    /// # Panics
    ///
    /// Panics if `$\mathtt{first\_step} \leq 0$`.
    pub fn with_first_step(self, first_step: F) -> Self {
        assert!(first_step > F::zero(), "first_step must be > 0");
        Self { first_step, ..self }
    }

    /// Set the number of iterations between two steepest-descent restarts.
    ///
    /// # Panics
    ///
    /// Panics if `$\mathtt{no\_reset\_run\_len} = 0$`.
    pub fn with_no_reset_run_len(self, no_reset_run_len: usize) -> Self {
        assert!(no_reset_run_len > 0, "no_reset_run_len must be > 0");
        Self {
            no_reset_run_len,
            ..self
        }
    }

    /// Set the factor by which the run length grows after each restart.
    ///
    /// # Panics
    ///
    /// Panics if `$\mathtt{reset\_expand\_factor} < 1$`.
    pub fn with_reset_expand_factor(self, reset_expand_factor: F) -> Self {
        assert!(
            reset_expand_factor >= F::one(),
            "reset_expand_factor must be >= 1"
        );
        Self {
            reset_expand_factor,
            ..self
        }
    }

    /// Set the iteration cap.
    ///
    /// # Panics
    ///
    /// Panics if `$\mathtt{max\_iterations} = 0$`.
    pub fn with_max_iterations(self, max_iterations: usize) -> Self {
        assert!(max_iterations > 0, "max_iterations must be > 0");
        Self {
            max_iterations,
            ..self
        }
    }

    /// Set the gradient tolerance.
    ///
    /// The minimization converged when
    /// ```math
    ///   \|\nabla f(\vec{x})\| \leq \mathtt{gtol}\cdot\max(1, \|\nabla f(\vec{x}_0)\|).
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `$\mathtt{gtol} < 0$`.
    pub fn with_gradient_tolerance(self, gradient_tolerance: F) -> Self {
        assert!(
            gradient_tolerance >= F::zero(),
            "gradient_tolerance must be >= 0"
        );
        Self {
            gradient_tolerance,
            ..self
        }
    }

    /// Set the number of partitions vector operations are split into.
    ///
    /// # Panics
    ///
    /// Panics if `$\mathtt{num\_threads} = 0$`.
    pub fn with_num_threads(self, num_threads: usize) -> Self {
        assert!(num_threads > 0, "num_threads must be > 0");
        Self {
            num_threads,
            ..self
        }
    }

    /// Set the seed of the step jitter.
    pub fn with_seed(self, seed: u64) -> Self {
        Self { seed, ..self }
    }

    /// Replace the line search thresholds.
    ///
    /// # Panics
    ///
    /// Panics if the constants do not describe a valid line search.
    pub fn with_tuning(self, tuning: LineSearchTuning<F>) -> Self {
        assert!(
            tuning.sufficient_decrease > F::zero() && tuning.sufficient_decrease < tuning.slope_shrink,
            "sufficient_decrease must be in (0, slope_shrink)"
        );
        assert!(tuning.slope_shrink < F::one(), "slope_shrink must be < 1");
        assert!(tuning.max_step_growth > F::one(), "max_step_growth must be > 1");
        assert!(
            tuning.fit_interior > F::zero() && tuning.fit_interior <= F::one(),
            "fit_interior must be in (0, 1]"
        );
        assert!(tuning.max_probes > 0, "max_probes must be > 0");
        Self { tuning, ..self }
    }

    pub fn tuning(&self) -> &LineSearchTuning<F> {
        &self.tuning
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Minimize `objective` starting from `x`.
    ///
    /// On return `x` holds the best point found.
    pub fn minimize<O>(&self, x: &mut [F], objective: &mut O) -> MinimizationReport<F>
    where
        O: Differentiable<F> + ?Sized,
    {
        let runner = DefaultRunner::default();
        let cancel = CancellationToken::new();
        self.minimize_with(x, objective, &mut NeverTerminate, &runner, &cancel)
    }

    /// Minimize with an explicit termination predicate, runner and
    /// cancellation token.
    ///
    /// The token is set when `terminate` fires or the iteration cap is
    /// reached. If it is set from another thread the minimization stops
    /// before the next iteration.
    pub fn minimize_with<O, T>(
        &self,
        x: &mut [F],
        objective: &mut O,
        terminate: &mut T,
        runner: &dyn ParallelRunner,
        cancel: &CancellationToken,
    ) -> MinimizationReport<F>
    where
        O: Differentiable<F> + ?Sized,
        T: Terminate<F> + ?Sized,
    {
        Minimization::new(self, runner, x, objective).run(x, terminate, cancel)
    }
}

impl<F: RealField + Float> Default for ConjugateGradient<F> {
    fn default() -> Self {
        Self::new()
    }
}
