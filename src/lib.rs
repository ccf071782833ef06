//! Constrained minimization with a penalty method on top of a
//! [nonlinear conjugate-gradient](https://en.wikipedia.org/wiki/Nonlinear_conjugate_gradient_method)
//! minimizer, using [nalgebra](https://nalgebra.org) where dense linear
//! algebra is needed.
//!
//! The crate solves
//! ```math
//! \min_{\vec{x}\in\R^n} f(\vec{x})\quad\text{subject to}\quad
//! c_j(\vec{x}) \mathrel{\square_j} 0,\quad \square_j \in \{=, \geq, \leq\},
//! ```
//! for a differentiable objective `$f$` and constraints `$c_j$` that are
//! either linear or nonlinear in a subset of the variables.
//!
//! # Components
//!
//! - [`PenaltySolver`](struct.PenaltySolver.html) turns the constrained
//!   problem into a sequence of unconstrained ones by adding squared,
//!   offset-shifted violations of the [`Constraint`](struct.Constraint.html)s.
//! - [`ConjugateGradient`](struct.ConjugateGradient.html) minimizes a
//!   [`Differentiable`](trait.Differentiable.html) function. Its line search
//!   tries a cheap cubic fit first and falls back to a robust bracketing
//!   search.
//! - [`ParallelVectorContext`](struct.ParallelVectorContext.html) splits all
//!   vector arithmetic of the minimizer into partitions handed to a
//!   [`ParallelRunner`](trait.ParallelRunner.html). The crate never spawns
//!   threads itself. With the default `rayon` feature,
//!   [`RayonRunner`](struct.RayonRunner.html) runs them on a thread pool.
//! - [`NewtonRaphson`](struct.NewtonRaphson.html) solves small square
//!   systems of nonlinear equations with an
//!   [`LuDecomposition`](struct.LuDecomposition.html) in every step.
//!
//! Minimizers do not fail with an error. They return the best point found
//! together with a report whose [`Status`](enum.Status.html) tells
//! whether the result can be trusted.
//!
//! # Usage Example
//!
//! Minimize `$x^2 + y^2$` on the line `$x + y = 1$`:
//!
//! ```
//! # use approx::assert_abs_diff_eq;
//! use constrained_cg::{Comparison, Constraint, NonlinearFunction, PenaltySolver};
//!
//! let mut objective = NonlinearFunction::new(vec![0, 1], |x: &[f64]| x[0] * x[0] + x[1] * x[1]);
//! let mut constraints = [Constraint::linear(vec![(0, 1.), (1, 1.)], 1., Comparison::Equal)];
//!
//! let mut x = [0., 0.];
//! let report = PenaltySolver::new()
//!     .with_outer_iterations(20)
//!     .solve(&mut x, &mut objective, &mut constraints, &[1e-6, 1e-6]);
//! assert!(report.max_violation < 1e-6);
//! assert_abs_diff_eq!(x[0], 0.5, epsilon = 1e-6);
//! assert_abs_diff_eq!(x[1], 0.5, epsilon = 1e-6);
//! ```
//!
//! Unconstrained problems go directly to the minimizer:
//!
//! ```
//! use constrained_cg::ConjugateGradient;
//!
//! let mut x = vec![3., -2., 0.5];
//! let report = ConjugateGradient::new().minimize(&mut x, &mut |x: &[f64], g: &mut [f64]| {
//!     let mut value = 0.;
//!     for i in 0..x.len() {
//!         g[i] = 2. * (x[i] - 1.);
//!         value += (x[i] - 1.) * (x[i] - 1.);
//!     }
//!     value
//! });
//! assert!(report.is_success());
//! assert!(x.iter().all(|xi| (xi - 1.).abs() < 1e-6));
//! ```
//!
//! # Derivative checking
//!
//! Use [`differentiate_numerically`](fn.differentiate_numerically.html) to
//! compare an analytic gradient against central differences.
//!
//! # Logging
//!
//! Progress is reported through the [`log`](https://docs.rs/log) facade.
//! The library installs no logger.

mod cancel;
mod cg;
mod constraint;
mod error;
mod lu;
mod newton;
mod penalty;
mod problem;
mod runner;
mod utils;
pub mod vector;

pub use cancel::CancellationToken;
pub use cg::{ConjugateGradient, LineSearchTuning, MinimizationReport, Status, TerminationReason};
pub use constraint::{
    Comparison, Constraint, ConstraintKind, Evaluable, LinearConstraint, NonlinearFunction,
};
pub use error::Error;
pub use lu::{back_substitute, decompose_in_place, LuDecomposition};
pub use newton::{NewtonRaphson, NewtonReport};
pub use penalty::{ConstrainedReport, PenaltySolver};
pub use problem::{Differentiable, NeverTerminate, NonlinearSystem, Terminate};
#[cfg(feature = "rayon")]
pub use runner::RayonRunner;
pub use runner::{DefaultRunner, ParallelRunner, SerialRunner, Task};
pub use vector::{partition, ParallelVectorContext};

pub use utils::differentiate_numerically;
