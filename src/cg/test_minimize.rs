use approx::{assert_abs_diff_eq, assert_relative_eq};

use super::test_helpers::{rosenbrock, sum_of_squares, weighted_squares, MockObjective};
use super::{ConjugateGradient, Status, TerminationReason};
use crate::runner::{DefaultRunner, SerialRunner};
use crate::{CancellationToken, NeverTerminate};

#[test]
fn quadratic_bowl() {
    let mut x = vec![1., -2., 3., 0.5];
    let mut objective = MockObjective::new(sum_of_squares);
    let report = ConjugateGradient::new().minimize(&mut x, &mut objective);
    assert_eq!(report.status, Status::Success);
    assert_eq!(report.termination, TerminationReason::Converged);
    assert!(report.iterations <= x.len() + 1);
    assert!(report.gradient_norm < 1e-6);
    assert_eq!(report.value, 0.);
    assert_eq!(x, vec![0.; 4]);
    // start, one probe, and the fitted minimum at the end
    assert_eq!(report.number_of_evaluations, 3);
    assert_eq!(objective.evaluations(), 3);
    assert_eq!(objective.points[1], vec![-1., 2., -3., -0.5]);
}

#[test]
fn finite_termination_on_quadratics() {
    let mut x = vec![3., -1., 0., 2., 5.];
    let n = x.len();
    let report = ConjugateGradient::new()
        .with_gradient_tolerance(1e-10)
        .minimize(&mut x, &mut weighted_squares(vec![1., 2., 3., 4., 5.]));
    assert!(report.is_success(), "{:?}", report);
    assert!(report.iterations <= n + 1, "{:?}", report);
    for xi in x {
        assert_abs_diff_eq!(xi, 1., epsilon = 1e-8);
    }
}

#[test]
fn returns_an_evaluated_point() {
    let mut x = vec![0.3, -4., 2.];
    let mut objective = MockObjective::new(weighted_squares(vec![10., 1., 0.1]));
    let report = ConjugateGradient::new().minimize(&mut x, &mut objective);
    assert!(report.is_success());
    assert!(objective.points.contains(&x));
    assert_eq!(report.number_of_evaluations, objective.evaluations());
}

#[test]
fn rosenbrock_valley() {
    let mut x = vec![-1.2, 1.];
    let report = ConjugateGradient::new()
        .with_max_iterations(5000)
        .minimize(&mut x, &mut rosenbrock);
    assert_ne!(report.status, Status::Unbounded);
    assert!(report.value < 1e-8, "{:?}", report);
    assert_abs_diff_eq!(x[0], 1., epsilon = 1e-3);
    assert_abs_diff_eq!(x[1], 1., epsilon = 1e-3);
}

#[test]
fn single_precision() {
    let mut x = vec![2f32, -1., 0.25];
    let mut objective = |x: &[f32], gradient: &mut [f32]| {
        for (g, &xi) in gradient.iter_mut().zip(x) {
            *g = 2. * xi;
        }
        x.iter().map(|xi| xi * xi).sum::<f32>()
    };
    let report = ConjugateGradient::new().minimize(&mut x, &mut objective);
    assert!(report.is_success());
    assert!(report.value < 1e-10);
}

#[test]
fn thread_count_does_not_change_result() {
    let n = 1000;
    let c: Vec<f64> = (0..n).map(|i| 1. + (i % 7) as f64).collect();
    let start: Vec<f64> = (0..n).map(|i| ((i * 37) % 11) as f64 - 5.).collect();
    let runner = DefaultRunner::default();

    let mut serial = start.clone();
    let serial_report = ConjugateGradient::new()
        .with_gradient_tolerance(1e-10)
        .minimize_with(
            &mut serial,
            &mut weighted_squares(c.clone()),
            &mut NeverTerminate,
            &SerialRunner,
            &CancellationToken::new(),
        );
    assert!(serial_report.is_success());

    for threads in [2, 4] {
        let mut parallel = start.clone();
        let report = ConjugateGradient::new()
            .with_gradient_tolerance(1e-10)
            .with_num_threads(threads)
            .minimize_with(
                &mut parallel,
                &mut weighted_squares(c.clone()),
                &mut NeverTerminate,
                &runner,
                &CancellationToken::new(),
            );
        assert!(report.is_success());
        for (a, b) in serial.iter().zip(&parallel) {
            assert_relative_eq!(*a, *b, epsilon = 1e-8);
        }
    }
}
