//! Fork-join execution of per-partition tasks.
//!
//! The solver never spawns threads itself. Every parallel vector operation
//! hands one task per partition to a [`ParallelRunner`], which must run all
//! of them to completion before returning.

/// A unit of work handed to a [`ParallelRunner`].
pub type Task<'a> = Box<dyn FnOnce() + Send + 'a>;

/// Runs a batch of tasks and blocks until all of them are finished.
///
/// Whether the tasks actually run concurrently is up to the implementation.
/// `op_name` names the vector operation and is only meant for diagnostics.
pub trait ParallelRunner: Sync {
    fn run<'a>(&self, tasks: Vec<Task<'a>>, op_name: &str);
}

/// Runs every task on the calling thread, in order.
#[derive(Copy, Clone, Debug, Default)]
pub struct SerialRunner;

impl ParallelRunner for SerialRunner {
    fn run<'a>(&self, tasks: Vec<Task<'a>>, _op_name: &str) {
        for task in tasks {
            task();
        }
    }
}

#[cfg(feature = "rayon")]
mod rayon_runner {
    use super::{ParallelRunner, Task};
    use crate::Error;

    /// Runs the tasks on a rayon thread pool.
    ///
    /// Uses the global pool unless built with [`RayonRunner::with_threads`].
    #[derive(Debug, Default)]
    pub struct RayonRunner {
        pool: Option<rayon::ThreadPool>,
    }

    impl RayonRunner {
        pub fn new() -> Self {
            Self::default()
        }

        /// Use a dedicated pool with `num_threads` workers.
        pub fn with_threads(num_threads: usize) -> Result<Self, Error> {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .build()?;
            Ok(Self { pool: Some(pool) })
        }

        /// Number of worker threads tasks are spread over.
        pub fn current_num_threads(&self) -> usize {
            match &self.pool {
                Some(pool) => pool.current_num_threads(),
                None => rayon::current_num_threads(),
            }
        }
    }

    fn spawn_all<'a>(scope: &rayon::Scope<'a>, tasks: Vec<Task<'a>>) {
        for task in tasks {
            scope.spawn(move |_| task());
        }
    }

    impl ParallelRunner for RayonRunner {
        fn run<'a>(&self, tasks: Vec<Task<'a>>, op_name: &str) {
            log::trace!("{op_name}: {} tasks", tasks.len());
            match &self.pool {
                Some(pool) => pool.scope(|scope| spawn_all(scope, tasks)),
                None => rayon::scope(|scope| spawn_all(scope, tasks)),
            }
        }
    }
}

#[cfg(feature = "rayon")]
pub use rayon_runner::RayonRunner;

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        /// Runner used by the convenience entry points.
        pub type DefaultRunner = RayonRunner;
    } else {
        /// Runner used by the convenience entry points.
        pub type DefaultRunner = SerialRunner;
    }
}
