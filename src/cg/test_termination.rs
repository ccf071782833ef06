use super::test_helpers::{quartic_exp, rosenbrock, sum_of_squares, MockObjective};
use super::{ConjugateGradient, LineSearchTuning, Status, TerminationReason};
use crate::runner::SerialRunner;
use crate::{CancellationToken, NeverTerminate};

#[test]
fn already_at_minimum() {
    let mut x = vec![0.; 3];
    let mut objective = MockObjective::new(sum_of_squares);
    let report = ConjugateGradient::new().minimize(&mut x, &mut objective);
    assert_eq!(report.termination, TerminationReason::Converged);
    assert_eq!(report.iterations, 0);
    assert_eq!(report.number_of_evaluations, 1);
    assert_eq!(objective.points, vec![vec![0.; 3]]);
}

#[test]
fn no_variables() {
    let mut x: Vec<f64> = vec![];
    let report = ConjugateGradient::new().minimize(&mut x, &mut sum_of_squares);
    assert_eq!(report.status, Status::Success);
    assert_eq!(report.value, 0.);
    assert_eq!(report.iterations, 0);
}

#[test]
fn iteration_cap() {
    let mut x = vec![-1.2, 1.];
    let cancel = CancellationToken::new();
    let report = ConjugateGradient::new().with_max_iterations(3).minimize_with(
        &mut x,
        &mut rosenbrock,
        &mut NeverTerminate,
        &SerialRunner,
        &cancel,
    );
    assert_eq!(report.status, Status::Suboptimal);
    assert_eq!(report.termination, TerminationReason::MaxIterations);
    assert_eq!(report.iterations, 3);
    assert!(cancel.is_cancelled());
    // still better than the start
    assert!(report.value < 24.2);
}

#[test]
fn termination_predicate() {
    let mut x = vec![-1.2, 1.];
    let cancel = CancellationToken::new();
    let mut seen = vec![];
    let mut terminate = |_: &[f64], best: f64, iteration: usize| {
        seen.push(best);
        iteration >= 2
    };
    let report = ConjugateGradient::new().minimize_with(
        &mut x,
        &mut rosenbrock,
        &mut terminate,
        &SerialRunner,
        &cancel,
    );
    assert_eq!(report.status, Status::Suboptimal);
    assert_eq!(report.termination, TerminationReason::Terminated);
    assert_eq!(report.iterations, 2);
    assert!(cancel.is_cancelled());
    assert_eq!(seen.len(), 3);
    assert!(seen[0] >= seen[1] && seen[1] >= seen[2]);
    // a fitted last iterate is evaluated before returning
    assert!(report.value <= seen[2]);
}

#[test]
fn converged_means_small_evaluated_gradient() {
    let tolerance = 1e-9;
    let mut converged = 0;
    for start in [
        vec![2., -1.5, 0.7],
        vec![-3., 0.1, 1.2],
        vec![0.5; 3],
        vec![10., -10., 4.],
    ] {
        let mut initial_gradient = vec![0.; 3];
        let mut objective = quartic_exp(2.);
        objective(&start[..], &mut initial_gradient[..]);
        let initial_norm = initial_gradient.iter().map(|g| g * g).sum::<f64>().sqrt();
        let mut x = start.clone();
        let mut objective = MockObjective::new(quartic_exp(2.));
        let report = ConjugateGradient::new()
            .with_gradient_tolerance(tolerance)
            .minimize(&mut x, &mut objective);
        assert!(objective.points.contains(&x));
        if report.termination == TerminationReason::Converged {
            converged += 1;
            assert!(
                report.gradient_norm <= tolerance * initial_norm.max(1.),
                "{:?} from {:?}",
                report,
                start
            );
        }
    }
    assert!(converged > 0);
}

#[test]
fn cancelled_before_start() {
    let mut x = vec![1., 2.];
    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = ConjugateGradient::new().minimize_with(
        &mut x,
        &mut sum_of_squares,
        &mut NeverTerminate,
        &SerialRunner,
        &cancel,
    );
    assert_eq!(report.termination, TerminationReason::Cancelled);
    assert_eq!(report.iterations, 0);
    assert_eq!(report.number_of_evaluations, 1);
    assert_eq!(report.value, 5.);
    assert_eq!(x, vec![1., 2.]);
}

#[test]
fn unbounded_below() {
    let mut x = vec![0.];
    let mut objective = |x: &[f64], gradient: &mut [f64]| {
        gradient[0] = -x[0].exp();
        -x[0].exp()
    };
    let report = ConjugateGradient::new().minimize(&mut x, &mut objective);
    assert_eq!(report.status, Status::Unbounded);
    assert_eq!(report.termination, TerminationReason::NotFinite);
    assert_eq!(report.value, f64::NEG_INFINITY);
}

#[test]
fn nan_everywhere() {
    let mut x = vec![1.];
    let mut objective = |_: &[f64], gradient: &mut [f64]| {
        gradient[0] = f64::NAN;
        f64::NAN
    };
    let report = ConjugateGradient::new().minimize(&mut x, &mut objective);
    assert_eq!(report.status, Status::Unbounded);
    assert_eq!(report.number_of_evaluations, 1);
    assert_eq!(x, vec![1.]);
}

#[test]
fn stagnation() {
    // the gradient claims descent but the value never changes
    let mut x = vec![0.];
    let mut objective = MockObjective::new(|_: &[f64], gradient: &mut [f64]| {
        gradient[0] = 1.;
        1.
    });
    let config = ConjugateGradient::new();
    let report = config.minimize(&mut x, &mut objective);
    assert_eq!(report.status, Status::Success);
    assert_eq!(report.termination, TerminationReason::Stagnated);
    assert_eq!(
        report.iterations,
        LineSearchTuning::<f64>::default().stagnation_window + 1
    );
    assert_eq!(x, vec![0.]);
}

#[test]
#[should_panic(expected = "max_iterations must be > 0")]
fn zero_iterations() {
    ConjugateGradient::<f64>::new().with_max_iterations(0);
}

#[test]
#[should_panic(expected = "first_step must be > 0")]
fn zero_first_step() {
    ConjugateGradient::<f64>::new().with_first_step(0.);
}

#[test]
#[should_panic(expected = "gradient_tolerance must be >= 0")]
fn nan_gradient_tolerance() {
    ConjugateGradient::<f64>::new().with_gradient_tolerance(f64::NAN);
}

#[test]
#[should_panic(expected = "sufficient_decrease")]
fn zero_sufficient_decrease() {
    ConjugateGradient::<f64>::new().with_tuning(LineSearchTuning {
        sufficient_decrease: 0.,
        ..LineSearchTuning::default()
    });
}

#[test]
#[should_panic(expected = "slope_shrink must be < 1")]
fn invalid_tuning() {
    ConjugateGradient::<f64>::new().with_tuning(LineSearchTuning {
        slope_shrink: 2.,
        ..LineSearchTuning::default()
    });
}
