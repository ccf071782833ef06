//! The robust line search.
//!
//! Used whenever the single probe of the fast path is not good enough. It
//! keeps up to three samples `left < best < right` along the line, where
//! `best` has the lowest value seen so far. While there is no sample on the
//! far side of a minimum the search expands, afterwards it fits a cubic to
//! the sub-interval in which the slope changes sign. When the bracket stops
//! shrinking quickly the search turns robust and only bisects.
use nalgebra::{convert, RealField};
use num_traits::Float;

use super::fit::{fit_minimizer, Sample};
use super::LineSearchTuning;

/// Source of new samples along the line.
pub(crate) trait LineProbe<F> {
    fn probe(&mut self, step: F) -> Sample<F>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineSearchPhase {
    /// No sample beyond the minimum yet.
    Expand,
    /// Fitting inside a bracket.
    Fit,
    /// Bisecting inside a bracket.
    Bisect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineSearchExit {
    /// Sufficient decrease and slope reduction relative to the start.
    SufficientDecrease,
    /// Bisected repeatedly after a minimum was dropped from the bracket.
    LostMinimum,
    /// Many dropped minima together with many flat-slope bisections.
    Suspect,
    /// Several probes in a row repeated known data.
    Stale,
    /// The probe budget is used up.
    ProbeLimit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct LineSearchOutcome<F> {
    pub best: Sample<F>,
    pub exit: LineSearchExit,
    pub probes: usize,
}

pub(crate) struct SlowSearch<'t, F> {
    tuning: &'t LineSearchTuning<F>,
    start: Sample<F>,
    left: Option<Sample<F>>,
    best: Sample<F>,
    right: Option<Sample<F>>,
    phase: LineSearchPhase,
    robust: bool,
    width: F,
    probes: usize,
    lost_minima: usize,
    suspect_bisections: usize,
    bisections_with_lost: usize,
    stale: usize,
}

impl<'t, F: RealField + Float> SlowSearch<'t, F> {
    /// `start` must have a negative slope.
    pub fn new(tuning: &'t LineSearchTuning<F>, start: Sample<F>) -> Self {
        debug_assert!(start.slope < F::zero(), "line search must start downhill");
        Self {
            tuning,
            start,
            left: None,
            best: start,
            right: None,
            phase: LineSearchPhase::Expand,
            robust: false,
            width: F::infinity(),
            probes: 0,
            lost_minima: 0,
            suspect_bisections: 0,
            bisections_with_lost: 0,
            stale: 0,
        }
    }

    /// Seed the search with a sample that was already evaluated.
    pub fn with_sample(mut self, sample: Sample<F>) -> Self {
        self.merge(sample, false);
        self
    }

    #[cfg(test)]
    pub fn phase(&self) -> LineSearchPhase {
        self.phase
    }

    /// Probe until one of the exit conditions holds. `first_step` is used
    /// when only the start is known.
    pub fn run<P: LineProbe<F> + ?Sized>(
        mut self,
        prober: &mut P,
        first_step: F,
    ) -> LineSearchOutcome<F> {
        loop {
            if let Some(exit) = self.exit() {
                return LineSearchOutcome {
                    best: self.best,
                    exit,
                    probes: self.probes,
                };
            }
            let (step, bisected) = if self.left.is_none() && self.right.is_none() {
                (first_step, false)
            } else {
                self.next_step()
            };
            let sample = prober.probe(step);
            self.probes += 1;
            self.merge(sample, bisected);
        }
    }

    fn exit(&self) -> Option<LineSearchExit> {
        let t = self.tuning;
        if !self.best.step.is_zero()
            && self.best.value
                <= self.start.value + t.sufficient_decrease * self.best.step * self.start.slope
            && Float::abs(self.best.slope) <= t.slope_shrink * Float::abs(self.start.slope)
        {
            Some(LineSearchExit::SufficientDecrease)
        } else if self.bisections_with_lost >= t.bisections_with_lost_limit {
            Some(LineSearchExit::LostMinimum)
        } else if self.lost_minima > t.lost_minimum_limit
            && self.suspect_bisections > t.suspect_bisection_limit
        {
            Some(LineSearchExit::Suspect)
        } else if self.stale >= t.stale_probe_limit {
            Some(LineSearchExit::Stale)
        } else if self.probes >= t.max_probes {
            Some(LineSearchExit::ProbeLimit)
        } else {
            None
        }
    }

    /// The pair of samples between which the slope changes sign.
    fn sub_interval(&self) -> Option<(Sample<F>, Sample<F>)> {
        let best = self.best;
        if best.slope < F::zero() {
            self.right.map(|right| (best, right))
        } else if best.slope > F::zero() {
            self.left.map(|left| (left, best))
        } else {
            self.left
                .map(|left| (left, best))
                .or_else(|| self.right.map(|right| (best, right)))
        }
    }

    fn next_step(&mut self) -> (F, bool) {
        let half: F = convert(0.5);
        let (a, b) = match self.sub_interval() {
            Some(interval) => interval,
            None => {
                self.phase = LineSearchPhase::Expand;
                return (self.expansion_step(), false);
            }
        };
        let midpoint = half * (a.step + b.step);
        if self.robust {
            self.phase = LineSearchPhase::Bisect;
            return (midpoint, true);
        }
        let margin = half * (F::one() - self.tuning.fit_interior) * (b.step - a.step);
        match fit_minimizer(&a, &b) {
            Some(step) if step >= a.step + margin && step <= b.step - margin => {
                self.phase = LineSearchPhase::Fit;
                (step, false)
            }
            _ => {
                self.phase = LineSearchPhase::Bisect;
                (midpoint, true)
            }
        }
    }

    fn expansion_step(&self) -> F {
        let best = self.best;
        let lower = best.step + best.step;
        let upper = self.tuning.max_step_growth * best.step;
        let fitted = self
            .left
            .and_then(|left| fit_minimizer(&left, &best))
            .unwrap_or(upper);
        Float::min(Float::max(fitted, lower), upper)
    }

    fn merge(&mut self, sample: Sample<F>, bisected: bool) {
        let known = |s: &Option<Sample<F>>| s.map_or(false, |s| s.same_step(sample.step));
        let repeated = (sample.value == self.best.value && sample.slope == self.best.slope)
            || self.best.same_step(sample.step)
            || known(&self.left)
            || known(&self.right);
        if repeated {
            self.stale += 1;
        } else {
            self.stale = 0;
        }

        if sample.is_better_than(&self.best) {
            if sample.step > self.best.step {
                self.left = Some(self.best);
            } else {
                self.right = Some(self.best);
            }
            self.best = sample;
        } else if sample.step > self.best.step {
            if self.right.map_or(true, |right| sample.step < right.step) {
                self.right = Some(sample);
            }
            // still descending beyond a worse sample
            if sample.slope < F::zero() {
                self.lost_minima += 1;
            }
        } else {
            if self.left.map_or(true, |left| sample.step > left.step) {
                self.left = Some(sample);
            }
            if sample.slope > F::zero() {
                self.lost_minima += 1;
            }
        }

        if bisected {
            if self.lost_minima > 0 {
                self.bisections_with_lost += 1;
            }
            if self.slopes_look_flat() {
                self.suspect_bisections += 1;
            }
        }

        if let (Some(left), Some(right)) = (self.left, self.right) {
            let width = right.step - left.step;
            if width > self.tuning.bracket_shrink * self.width {
                self.robust = true;
            }
            self.width = width;
        }
    }

    fn slopes_look_flat(&self) -> bool {
        match (self.left, self.right) {
            (Some(left), Some(right)) => {
                let slopes = [left.slope, self.best.slope, right.slope];
                let largest = slopes
                    .iter()
                    .fold(F::zero(), |acc, s| Float::max(acc, Float::abs(*s)));
                let spread = Float::max(
                    Float::abs(left.slope - self.best.slope),
                    Float::abs(right.slope - self.best.slope),
                );
                spread <= self.tuning.suspect_slope_ratio * largest
            }
            _ => false,
        }
    }
}
