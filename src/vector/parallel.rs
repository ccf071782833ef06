use core::ops::Range;

use num_traits::Float;

use crate::runner::{ParallelRunner, Task};
use crate::vector;

/// Split `$[0, \mathtt{len})$` into `num_threads` contiguous ranges.
///
/// Each range gets the remaining length divided by the remaining number of
/// threads, so sizes differ by at most one and the longer ranges come last.
pub fn partition(len: usize, num_threads: usize) -> Vec<Range<usize>> {
    assert!(num_threads > 0, "num_threads must be > 0");
    let mut ranges = Vec::with_capacity(num_threads);
    let mut assigned = 0;
    for done in 0..num_threads {
        let chunk = (len - assigned) / (num_threads - done);
        ranges.push(assigned..assigned + chunk);
        assigned += chunk;
    }
    ranges
}

fn split_mut<'v, F>(mut v: &'v mut [F], ranges: &[Range<usize>]) -> Vec<&'v mut [F]> {
    let mut parts = Vec::with_capacity(ranges.len());
    for range in ranges {
        let (head, tail) = core::mem::take(&mut v).split_at_mut(range.len());
        parts.push(head);
        v = tail;
    }
    parts
}

/// Parallel front end to the kernels in [`vector`](index.html).
///
/// Built once per minimization for a fixed vector length. With a single
/// thread every operation calls the serial kernel directly, otherwise the
/// operands are cut along the precomputed partition and one task per range
/// is handed to the runner. Reductions sum the per-range partial results
/// after the runner returns, so they are equal to the serial result only up
/// to summation order.
pub struct ParallelVectorContext<'r> {
    runner: &'r dyn ParallelRunner,
    num_threads: usize,
    len: usize,
    ranges: Vec<Range<usize>>,
}

impl<'r> ParallelVectorContext<'r> {
    /// # Panics
    ///
    /// Panics if `num_threads` is zero.
    pub fn new(runner: &'r dyn ParallelRunner, num_threads: usize, len: usize) -> Self {
        Self {
            runner,
            num_threads,
            len,
            ranges: partition(len, num_threads),
        }
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    fn is_serial(&self) -> bool {
        self.num_threads == 1
    }

    fn for_each_part<F, K>(&self, to: &mut [F], op_name: &str, kernel: K)
    where
        F: Send,
        K: Fn(&mut [F], Range<usize>) + Sync,
    {
        debug_assert_eq!(to.len(), self.len);
        let kernel = &kernel;
        let tasks: Vec<Task<'_>> = split_mut(to, &self.ranges)
            .into_iter()
            .zip(self.ranges.iter().cloned())
            .map(|(part, range)| Box::new(move || kernel(part, range)) as Task<'_>)
            .collect();
        self.runner.run(tasks, op_name);
    }

    fn reduce<F, K>(&self, op_name: &str, kernel: K) -> F
    where
        F: Float + Send,
        K: Fn(Range<usize>) -> F + Sync,
    {
        let mut partials = vec![F::zero(); self.ranges.len()];
        let kernel = &kernel;
        let tasks: Vec<Task<'_>> = partials
            .iter_mut()
            .zip(self.ranges.iter().cloned())
            .map(|(slot, range)| Box::new(move || *slot = kernel(range)) as Task<'_>)
            .collect();
        self.runner.run(tasks, op_name);
        partials.into_iter().fold(F::zero(), |acc, p| acc + p)
    }

    pub fn zero<F: Float + Send + Sync>(&self, v: &mut [F]) {
        if self.is_serial() {
            return vector::zero(v);
        }
        self.for_each_part(v, "zero", |part, _| vector::zero(part));
    }

    pub fn copy<F: Float + Send + Sync>(&self, to: &mut [F], from: &[F]) {
        if self.is_serial() {
            return vector::copy(to, from);
        }
        debug_assert_eq!(from.len(), self.len);
        self.for_each_part(to, "copy", |part, range| vector::copy(part, &from[range]));
    }

    pub fn scale<F: Float + Send + Sync>(&self, v: &mut [F], scalar: F) {
        if self.is_serial() {
            return vector::scale(v, scalar);
        }
        self.for_each_part(v, "scale", |part, _| vector::scale(part, scalar));
    }

    pub fn dot<F: Float + Send + Sync>(&self, a: &[F], b: &[F]) -> F {
        if self.is_serial() {
            return vector::dot(a, b);
        }
        debug_assert_eq!(a.len(), self.len);
        debug_assert_eq!(b.len(), self.len);
        self.reduce("dot", |range| vector::dot(&a[range.clone()], &b[range]))
    }

    pub fn norm_squared<F: Float + Send + Sync>(&self, v: &[F]) -> F {
        if self.is_serial() {
            return vector::norm_squared(v);
        }
        debug_assert_eq!(v.len(), self.len);
        self.reduce("norm_squared", |range| vector::norm_squared(&v[range]))
    }

    pub fn add_scaled<F: Float + Send + Sync>(&self, to: &mut [F], from: &[F], scalar: F) {
        if self.is_serial() {
            return vector::add_scaled(to, from, scalar);
        }
        debug_assert_eq!(from.len(), self.len);
        self.for_each_part(to, "add_scaled", |part, range| {
            vector::add_scaled(part, &from[range], scalar)
        });
    }

    pub fn add_two_scaled<F: Float + Send + Sync>(
        &self,
        to: &mut [F],
        a: &[F],
        scalar_a: F,
        b: &[F],
        scalar_b: F,
    ) {
        if self.is_serial() {
            return vector::add_two_scaled(to, a, scalar_a, b, scalar_b);
        }
        self.for_each_part(to, "add_two_scaled", |part, range| {
            vector::add_two_scaled(part, &a[range.clone()], scalar_a, &b[range], scalar_b)
        });
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_three_scaled<F: Float + Send + Sync>(
        &self,
        to: &mut [F],
        a: &[F],
        scalar_a: F,
        b: &[F],
        scalar_b: F,
        c: &[F],
        scalar_c: F,
    ) {
        if self.is_serial() {
            return vector::add_three_scaled(to, a, scalar_a, b, scalar_b, c, scalar_c);
        }
        self.for_each_part(to, "add_three_scaled", |part, range| {
            vector::add_three_scaled(
                part,
                &a[range.clone()],
                scalar_a,
                &b[range.clone()],
                scalar_b,
                &c[range],
                scalar_c,
            )
        });
    }

    pub fn multiply<F: Float + Send + Sync>(&self, to: &mut [F], by: &[F]) {
        if self.is_serial() {
            return vector::multiply(to, by);
        }
        self.for_each_part(to, "multiply", |part, range| {
            vector::multiply(part, &by[range])
        });
    }

    pub fn divide<F: Float + Send + Sync>(&self, to: &mut [F], by: &[F]) {
        if self.is_serial() {
            return vector::divide(to, by);
        }
        self.for_each_part(to, "divide", |part, range| vector::divide(part, &by[range]));
    }
}
