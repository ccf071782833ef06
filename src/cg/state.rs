//! State of one conjugate-gradient run.
//!
//! Nothing here outlives a single call to
//! [`ConjugateGradient::minimize_with`](../struct.ConjugateGradient.html#method.minimize_with).
use std::collections::VecDeque;
use std::mem;

use nalgebra::{convert, RealField};
use num_traits::Float;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use super::fit::{fit_minimizer, hermite_value, Sample};
use super::line_search::{LineProbe, SlowSearch};
use super::{ConjugateGradient, MinimizationReport, TerminationReason};
use crate::runner::ParallelRunner;
use crate::{CancellationToken, Differentiable, ParallelVectorContext, Terminate};

/// Best point at which the objective was actually evaluated.
struct BestPoint<F> {
    x: Vec<F>,
    gradient: Vec<F>,
    value: F,
}

/// Counts evaluations and keeps track of the best evaluated point.
struct Evaluator<'a, F, O: ?Sized> {
    objective: &'a mut O,
    evaluations: usize,
    best: BestPoint<F>,
}

impl<'a, F, O> Evaluator<'a, F, O>
where
    F: RealField + Float,
    O: Differentiable<F> + ?Sized,
{
    fn evaluate(&mut self, ctx: &ParallelVectorContext<'_>, x: &[F], gradient: &mut [F]) -> F {
        self.evaluations += 1;
        let value = self.objective.evaluate(x, gradient);
        if value < self.best.value {
            ctx.copy(&mut self.best.x, x);
            ctx.copy(&mut self.best.gradient, gradient);
            self.best.value = value;
        }
        value
    }
}

/// Best and second best sample on the current line, with their gradients.
struct LineRecord<F> {
    best: Sample<F>,
    best_gradient: Vec<F>,
    second: Option<Sample<F>>,
    second_gradient: Vec<F>,
}

impl<F: RealField + Float> LineRecord<F> {
    fn new(n: usize) -> Self {
        Self {
            best: Sample::new(F::zero(), F::infinity(), F::zero()),
            best_gradient: vec![F::zero(); n],
            second: None,
            second_gradient: vec![F::zero(); n],
        }
    }

    fn reset(&mut self, ctx: &ParallelVectorContext<'_>, start: Sample<F>, gradient: &[F]) {
        self.best = start;
        ctx.copy(&mut self.best_gradient, gradient);
        self.second = None;
    }

    fn record(&mut self, ctx: &ParallelVectorContext<'_>, sample: Sample<F>, gradient: &[F]) {
        if sample.is_better_than(&self.best) {
            mem::swap(&mut self.best_gradient, &mut self.second_gradient);
            self.second = Some(self.best);
            self.best = sample;
            ctx.copy(&mut self.best_gradient, gradient);
        } else if self.second.map_or(true, |second| sample.is_better_than(&second)) {
            self.second = Some(sample);
            ctx.copy(&mut self.second_gradient, gradient);
        }
    }

    /// The best recorded sample that is not at `step`.
    fn reference(&self, step: F) -> Option<(F, &[F])> {
        if !self.best.same_step(step) {
            Some((self.best.step, self.best_gradient.as_slice()))
        } else {
            self.second
                .filter(|second| !second.same_step(step))
                .map(|second| (second.step, self.second_gradient.as_slice()))
        }
    }
}

/// Evaluates the objective along `origin + step * direction`.
struct LineProber<'s, 'a, F, O: ?Sized> {
    ctx: &'s ParallelVectorContext<'a>,
    eval: &'s mut Evaluator<'a, F, O>,
    origin: &'s [F],
    direction: &'s [F],
    point: &'s mut [F],
    gradient: &'s mut [F],
    line: &'s mut LineRecord<F>,
}

impl<'s, 'a, F, O> LineProbe<F> for LineProber<'s, 'a, F, O>
where
    F: RealField + Float,
    O: Differentiable<F> + ?Sized,
{
    fn probe(&mut self, step: F) -> Sample<F> {
        self.ctx.copy(self.point, self.origin);
        self.ctx.add_scaled(self.point, self.direction, step);
        let value = self.eval.evaluate(self.ctx, self.point, self.gradient);
        let slope = self.ctx.dot(self.gradient, self.direction);
        let sample = Sample::new(step, value, slope);
        self.line.record(self.ctx, sample, self.gradient);
        sample
    }
}

pub(super) struct Minimization<'a, F, O: ?Sized> {
    config: &'a ConjugateGradient<F>,
    ctx: ParallelVectorContext<'a>,
    eval: Evaluator<'a, F, O>,
    rng: SmallRng,

    x: Vec<F>,
    gradient: Vec<F>,
    value: F,
    /// `false` if `x`, `gradient` and `value` come from a fit.
    real: bool,
    direction: Vec<F>,
    direction_norm_squared: F,

    probe_x: Vec<F>,
    probe_gradient: Vec<F>,
    next_gradient: Vec<F>,
    difference: Vec<F>,
    line: LineRecord<F>,

    step: F,
    initial_gradient_norm: F,
    pub(super) run_len: F,
    pub(super) since_reset: usize,
    best_values: VecDeque<F>,
    since_improvement: usize,
    iteration: usize,
}

impl<'a, F, O> Minimization<'a, F, O>
where
    F: RealField + Float,
    O: Differentiable<F> + ?Sized,
{
    pub fn new(
        config: &'a ConjugateGradient<F>,
        runner: &'a dyn ParallelRunner,
        x: &[F],
        objective: &'a mut O,
    ) -> Self {
        let n = x.len();
        let ctx = ParallelVectorContext::new(runner, config.num_threads, n);
        let mut eval = Evaluator {
            objective,
            evaluations: 0,
            best: BestPoint {
                x: x.to_vec(),
                gradient: vec![F::zero(); n],
                value: F::infinity(),
            },
        };
        let mut gradient = vec![F::zero(); n];
        let value = eval.evaluate(&ctx, x, &mut gradient);
        let mut direction = gradient.clone();
        ctx.scale(&mut direction, -F::one());
        let direction_norm_squared = ctx.norm_squared(&direction);

        let mut best_values = VecDeque::with_capacity(config.tuning.stagnation_window + 1);
        best_values.push_back(eval.best.value);

        Self {
            config,
            ctx,
            eval,
            rng: SmallRng::seed_from_u64(config.seed),
            x: x.to_vec(),
            gradient,
            value,
            real: true,
            direction,
            direction_norm_squared,
            probe_x: vec![F::zero(); n],
            probe_gradient: vec![F::zero(); n],
            next_gradient: vec![F::zero(); n],
            difference: vec![F::zero(); n],
            line: LineRecord::new(n),
            step: config.first_step,
            initial_gradient_norm: Float::sqrt(direction_norm_squared),
            run_len: convert(config.no_reset_run_len as f64),
            since_reset: 0,
            best_values,
            since_improvement: 0,
            iteration: 0,
        }
    }

    pub fn run<T>(
        mut self,
        x: &mut [F],
        terminate: &mut T,
        cancel: &CancellationToken,
    ) -> MinimizationReport<F>
    where
        T: Terminate<F> + ?Sized,
    {
        let termination = loop {
            if let Some(reason) = self.check_termination(terminate, cancel) {
                break reason;
            }
            self.iteration += 1;
            self.iterate();
            log::trace!(
                "iteration {}: value {:?}, best {:?}, next step {:?}",
                self.iteration,
                self.value,
                self.eval.best.value,
                self.step
            );
        };
        // the answer must be an evaluated point
        if !self.real {
            self.evaluate_iterate();
        }

        let best = &self.eval.best;
        self.ctx.copy(x, &best.x);
        let termination = if Float::is_finite(best.value) {
            termination
        } else {
            log::warn!(
                "minimization unbounded after {} iterations: best value {:?}",
                self.iteration,
                best.value
            );
            TerminationReason::NotFinite
        };
        MinimizationReport {
            status: termination.status(),
            termination,
            value: best.value,
            gradient_norm: Float::sqrt(self.ctx.norm_squared(&best.gradient)),
            iterations: self.iteration,
            number_of_evaluations: self.eval.evaluations,
        }
    }

    fn check_termination<T>(
        &mut self,
        terminate: &mut T,
        cancel: &CancellationToken,
    ) -> Option<TerminationReason>
    where
        T: Terminate<F> + ?Sized,
    {
        if cancel.is_cancelled() {
            return Some(TerminationReason::Cancelled);
        }
        if terminate.terminate(&self.x, self.eval.best.value, self.iteration) {
            cancel.cancel();
            return Some(TerminationReason::Terminated);
        }
        if self.eval.best.value == F::neg_infinity() {
            return Some(TerminationReason::NotFinite);
        }
        let tolerance =
            self.config.gradient_tolerance * Float::max(F::one(), self.initial_gradient_norm);
        let tolerance_squared = tolerance * tolerance;
        if !self.real && self.ctx.norm_squared(&self.gradient) <= tolerance_squared {
            // an interpolated gradient only suggests convergence
            self.evaluate_iterate();
        }
        if self.real
            && self.value <= self.eval.best.value
            && self.ctx.norm_squared(&self.gradient) <= tolerance_squared
        {
            return Some(TerminationReason::Converged);
        }
        if self.direction_norm_squared.is_zero() {
            return Some(TerminationReason::ZeroDirection);
        }
        if self.since_improvement > self.config.tuning.stagnation_window {
            return Some(TerminationReason::Stagnated);
        }
        if self.iteration >= self.config.max_iterations {
            cancel.cancel();
            return Some(TerminationReason::MaxIterations);
        }
        None
    }

    #[cfg(test)]
    pub fn next_iteration(&mut self) {
        self.iteration += 1;
        self.iterate();
    }

    fn prober(&mut self) -> LineProber<'_, 'a, F, O> {
        LineProber {
            ctx: &self.ctx,
            eval: &mut self.eval,
            origin: &self.x,
            direction: &self.direction,
            point: &mut self.probe_x,
            gradient: &mut self.probe_gradient,
            line: &mut self.line,
        }
    }

    fn evaluate_iterate(&mut self) {
        self.value = self.eval.evaluate(&self.ctx, &self.x, &mut self.gradient);
        self.real = true;
    }

    fn restart_direction(&mut self) {
        self.ctx.copy(&mut self.direction, &self.gradient);
        self.ctx.scale(&mut self.direction, -F::one());
        self.direction_norm_squared = self.ctx.norm_squared(&self.direction);
        self.since_reset = 0;
    }

    /// Slope along the current direction, restarting from steepest descent
    /// if the direction does not point downhill.
    fn downhill_slope(&mut self) -> Option<F> {
        let slope = self.ctx.dot(&self.gradient, &self.direction);
        if slope < F::zero() {
            return Some(slope);
        }
        log::debug!(
            "iteration {}: direction is not downhill, restarting",
            self.iteration
        );
        self.restart_direction();
        if self.direction_norm_squared > F::zero() {
            Some(-self.direction_norm_squared)
        } else {
            None
        }
    }

    fn iterate(&mut self) {
        let tuning = self.config.tuning;
        let slope = match self.downhill_slope() {
            Some(slope) => slope,
            None => {
                self.direction_norm_squared = F::zero();
                return;
            }
        };

        let mut step = self.step;
        if self.since_improvement >= tuning.randomize_after {
            let jitter: f64 = self.rng.gen_range(-1.0..1.0);
            step *= F::one() + tuning.random_jitter * convert(jitter);
        }
        if !(step > F::zero() && Float::is_finite(step)) {
            step = self.config.first_step;
        }

        let best_before = self.eval.best.value;
        let start = Sample::new(F::zero(), self.value, slope);
        self.line.reset(&self.ctx, start, &self.gradient);
        let probe = self.prober().probe(step);

        let fast = if probe.value <= self.recent_threshold() {
            self.fast_fit(&start, &probe)
        } else {
            None
        };
        match fast {
            Some((fitted, predicted)) => {
                let u = fitted / probe.step;
                self.ctx.zero(&mut self.next_gradient);
                self.ctx.add_two_scaled(
                    &mut self.next_gradient,
                    &self.gradient,
                    F::one() - u,
                    &self.probe_gradient,
                    u,
                );
                self.advance(fitted, predicted, false);
            }
            None => self.slow_line_search(probe, step, best_before),
        }
    }

    /// A probe must be at least as good as both of the two most recent best
    /// values to try the fast fit.
    fn recent_threshold(&self) -> F {
        self.best_values
            .iter()
            .rev()
            .take(2)
            .fold(F::infinity(), |threshold, &best| Float::min(threshold, best))
    }

    /// Minimum of the cubic through the start and the probe, if it can be
    /// trusted without evaluating it. Returns the step and predicted value.
    fn fast_fit(&self, start: &Sample<F>, probe: &Sample<F>) -> Option<(F, F)> {
        let tuning = &self.config.tuning;
        let fitted = fit_minimizer(start, probe)?;
        if !(fitted > F::zero()) || fitted > tuning.max_fit_extrapolation * probe.step {
            return None;
        }
        let predicted = hermite_value(start, probe, fitted);
        if !(predicted <= start.value + tuning.sufficient_decrease * fitted * start.slope)
            || predicted > probe.value
        {
            return None;
        }

        // angle between the interpolated gradient and the direction
        let u = fitted / probe.step;
        let w = F::one() - u;
        let two: F = convert(2.);
        let g0 = self.ctx.norm_squared(&self.gradient);
        let g1 = self.ctx.norm_squared(&self.probe_gradient);
        let g01 = self.ctx.dot(&self.gradient, &self.probe_gradient);
        let norm_squared = w * w * g0 + two * u * w * g01 + u * u * g1;
        let slope = w * start.slope + u * probe.slope;
        if norm_squared > F::zero()
            && slope * slope
                > tuning.max_cos * tuning.max_cos * norm_squared * self.direction_norm_squared
        {
            return None;
        }
        Some((fitted, predicted))
    }

    fn slow_line_search(&mut self, probe: Sample<F>, step: F, best_before: F) {
        let tuning = self.config.tuning;
        let mut keep_probe = true;
        if !self.real {
            self.evaluate_iterate();
            if !(self.value <= best_before) {
                log::debug!(
                    "iteration {}: fitted iterate evaluates to {:?}, backing out to {:?}",
                    self.iteration,
                    self.value,
                    self.eval.best.value
                );
                self.ctx.copy(&mut self.x, &self.eval.best.x);
                self.ctx.copy(&mut self.gradient, &self.eval.best.gradient);
                self.value = self.eval.best.value;
                self.restart_direction();
                keep_probe = false;
            } else {
                log::debug!(
                    "iteration {}: redoing line search from fitted iterate",
                    self.iteration
                );
            }
        } else {
            log::debug!(
                "iteration {}: fast line search rejected, probe value {:?}",
                self.iteration,
                probe.value
            );
        }

        let slope = if keep_probe {
            let slope = self.ctx.dot(&self.gradient, &self.direction);
            if slope < F::zero() {
                Some(slope)
            } else {
                keep_probe = false;
                self.downhill_slope()
            }
        } else {
            self.downhill_slope()
        };
        let slope = match slope {
            Some(slope) => slope,
            None => {
                self.direction_norm_squared = F::zero();
                return;
            }
        };

        let start = Sample::new(F::zero(), self.value, slope);
        self.line.reset(&self.ctx, start, &self.gradient);
        let mut search = SlowSearch::new(&tuning, start);
        if keep_probe {
            self.line.record(&self.ctx, probe, &self.probe_gradient);
            search = search.with_sample(probe);
        }
        let outcome = search.run(&mut self.prober(), step);

        let best = self.line.best;
        if !best.is_better_than(&start) {
            log::debug!(
                "iteration {}: line search made no progress ({:?} after {} probes)",
                self.iteration,
                outcome.exit,
                outcome.probes
            );
            self.step = step / tuning.max_step_growth;
            self.restart_direction();
            self.note_progress();
            return;
        }
        self.ctx.copy(&mut self.next_gradient, &self.line.best_gradient);
        self.advance(best.step, best.value, true);
    }

    /// Move to `x + step * direction`, whose gradient is in `next_gradient`,
    /// and set up the next direction and step guess.
    fn advance(&mut self, step: F, value: F, real: bool) {
        let tuning = self.config.tuning;

        // gradient change along the line, preferably between two close samples
        let span = match self.line.reference(step) {
            Some((reference_step, reference_gradient)) => {
                self.ctx.copy(&mut self.difference, &self.next_gradient);
                self.ctx
                    .add_scaled(&mut self.difference, reference_gradient, -F::one());
                step - reference_step
            }
            None => {
                self.ctx.copy(&mut self.difference, &self.next_gradient);
                self.ctx
                    .add_scaled(&mut self.difference, &self.gradient, -F::one());
                step
            }
        };
        let direction_change = self.ctx.dot(&self.direction, &self.difference);
        let gradient_change = self.ctx.dot(&self.next_gradient, &self.difference);
        let curvature = direction_change / (span * self.direction_norm_squared);
        let length = Float::abs(step) * Float::sqrt(self.direction_norm_squared);

        self.ctx.add_scaled(&mut self.x, &self.direction, step);
        mem::swap(&mut self.gradient, &mut self.next_gradient);
        self.value = value;
        self.real = real;

        // Hestenes-Stiefel
        self.since_reset += 1;
        let beta = gradient_change / direction_change;
        let scheduled = convert::<f64, F>(self.since_reset as f64) >= self.run_len;
        let restarted = if scheduled || !(beta > F::zero()) || !Float::is_finite(beta) {
            if scheduled {
                self.run_len *= self.config.reset_expand_factor;
            }
            log::debug!(
                "iteration {}: restarting direction (scheduled: {scheduled})",
                self.iteration
            );
            self.restart_direction();
            true
        } else {
            self.ctx.scale(&mut self.direction, beta);
            self.ctx
                .add_scaled(&mut self.direction, &self.gradient, -F::one());
            self.direction_norm_squared = self.ctx.norm_squared(&self.direction);
            false
        };
        let mut slope = self.ctx.dot(&self.gradient, &self.direction);
        if !(slope < F::zero()) && !restarted {
            self.restart_direction();
            slope = -self.direction_norm_squared;
        }

        // next step from the curvature seen along the previous direction
        let direction_norm = Float::sqrt(self.direction_norm_squared);
        let limit = tuning.max_step_growth * length / direction_norm;
        let mut guess = if curvature > F::zero() {
            -slope / (curvature * self.direction_norm_squared)
        } else {
            limit
        };
        if !(guess <= limit) {
            guess = limit;
        }
        if !(guess > F::zero()) {
            guess = self.config.first_step;
        }
        self.step = guess;

        self.note_progress();
    }

    /// Push the best evaluated value into the window of recent bests.
    fn note_progress(&mut self) {
        let value = self.eval.best.value;
        match self.best_values.back() {
            Some(&previous) if !(value < previous) => self.since_improvement += 1,
            _ => self.since_improvement = 0,
        }
        self.best_values.push_back(value);
        let window = Ord::max(self.config.tuning.stagnation_window, 2);
        while self.best_values.len() > window {
            self.best_values.pop_front();
        }
    }
}
