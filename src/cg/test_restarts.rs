use super::state::Minimization;
use super::test_helpers::{weighted_squares, MockObjective};
use super::{ConjugateGradient, LineSearchTuning};
use crate::runner::SerialRunner;

/// Runs `iterations` steps on a 50-dimensional quadratic with distinct
/// curvatures and returns the iterations at which a scheduled restart
/// happened.
fn scheduled_restarts(run_len: usize, factor: f64, iterations: usize) -> Vec<usize> {
    let config = ConjugateGradient::new()
        .with_no_reset_run_len(run_len)
        .with_reset_expand_factor(factor);
    let weights: Vec<f64> = (0..50).map(|i| 1. + i as f64).collect();
    let mut objective = MockObjective::new(weighted_squares(weights));
    let runner = SerialRunner;
    let start = vec![0.; 50];
    let mut state = Minimization::new(&config, &runner, &start, &mut objective);

    let mut scheduled = vec![];
    for iteration in 1..=iterations {
        let (run_len, since_reset) = (state.run_len, state.since_reset);
        state.next_iteration();
        if state.run_len != run_len {
            // the restart comes exactly when the run is used up
            assert_eq!((since_reset + 1) as f64, run_len.ceil(), "{}", iteration);
            assert_eq!(state.run_len, run_len * factor);
            assert_eq!(state.since_reset, 0);
            scheduled.push(iteration);
        }
        assert!((state.since_reset as f64) < state.run_len);
    }
    scheduled
}

#[test]
fn restarts_on_schedule() {
    let scheduled = scheduled_restarts(2, 2., 30);
    assert!(scheduled.len() >= 3, "{:?}", scheduled);
}

#[test]
fn run_length_grows_by_expand_factor() {
    let scheduled = scheduled_restarts(2, 1.5, 30);
    assert!(scheduled.len() >= 3, "{:?}", scheduled);
    for pair in scheduled.windows(2) {
        assert!(pair[1] - pair[0] >= 3, "{:?}", scheduled);
    }
}

#[test]
fn without_growth_the_run_length_stays() {
    let config = ConjugateGradient::new()
        .with_no_reset_run_len(3)
        .with_reset_expand_factor(1.);
    let weights: Vec<f64> = (0..20).map(|i| 1. + i as f64).collect();
    let mut objective = MockObjective::new(weighted_squares(weights));
    let runner = SerialRunner;
    let start = vec![0.; 20];
    let mut state = Minimization::new(&config, &runner, &start, &mut objective);
    for _ in 0..12 {
        state.next_iteration();
        assert_eq!(state.run_len, 3.);
        assert!(state.since_reset < 3);
    }
}

/// Every point evaluated while minimizing an objective whose value never
/// improves, which makes the step jitter kick in.
fn stagnant_points(seed: u64) -> Vec<Vec<f64>> {
    let mut x = vec![0.];
    let mut objective = MockObjective::new(|_: &[f64], gradient: &mut [f64]| {
        gradient[0] = 1.;
        1.
    });
    ConjugateGradient::new()
        .with_seed(seed)
        .minimize(&mut x, &mut objective);
    objective.points
}

#[test]
fn jitter_is_reproducible() {
    assert_eq!(stagnant_points(7), stagnant_points(7));
}

#[test]
fn jitter_depends_on_seed() {
    let first = stagnant_points(7);
    let second = stagnant_points(8);
    assert_ne!(first, second);
    // identical until the value has been stale for `randomize_after` iterations
    let shared = first
        .iter()
        .zip(&second)
        .take_while(|(a, b)| a == b)
        .count();
    assert!(shared > LineSearchTuning::<f64>::default().randomize_after);
}
