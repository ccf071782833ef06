use thiserror::Error;

/// Errors of the Newton-Raphson driver and the LU decomposition.
///
/// The minimizers never fail this way; they report a
/// [`Status`](enum.Status.html) instead.
#[derive(Debug, Error)]
pub enum Error {
    /// A row of the matrix was identically zero.
    #[error("singular matrix in LU decomposition")]
    SingularMatrix,

    /// The Newton-Raphson trial budget was exhausted.
    #[error("no convergence after {trials} Newton-Raphson trials")]
    TooManyIterations { trials: usize },

    #[cfg(feature = "rayon")]
    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
