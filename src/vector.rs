//! Dense vector primitives.
//!
//! The functions here are the serial kernels. The minimizer never calls them
//! directly but goes through a [`ParallelVectorContext`], which either calls
//! them on the whole vector (one thread) or on one contiguous partition per
//! thread.
//!
//! All operands must have the same length. This is checked with
//! `debug_assert!` only, a mismatch is a bug in the caller.
use num_traits::Float;

mod parallel;

pub use parallel::{partition, ParallelVectorContext};

/// Set all entries to zero.
pub fn zero<F: Float>(v: &mut [F]) {
    v.iter_mut().for_each(|x| *x = F::zero());
}

/// Copy `from` into `to`.
pub fn copy<F: Float>(to: &mut [F], from: &[F]) {
    debug_assert_eq!(to.len(), from.len());
    to.copy_from_slice(from);
}

/// `$\vec{v} \gets s\vec{v}$`
pub fn scale<F: Float>(v: &mut [F], scalar: F) {
    v.iter_mut().for_each(|x| *x = *x * scalar);
}

/// `$\vec{a}\cdot\vec{b}$`
pub fn dot<F: Float>(a: &[F], b: &[F]) -> F {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .fold(F::zero(), |acc, (&x, &y)| acc + x * y)
}

/// `$\|\vec{v}\|^2$`
pub fn norm_squared<F: Float>(v: &[F]) -> F {
    v.iter().fold(F::zero(), |acc, &x| acc + x * x)
}

/// `$\vec{t} \gets \vec{t} + s\vec{f}$`
pub fn add_scaled<F: Float>(to: &mut [F], from: &[F], scalar: F) {
    debug_assert_eq!(to.len(), from.len());
    for (t, &f) in to.iter_mut().zip(from.iter()) {
        *t = *t + scalar * f;
    }
}

/// `$\vec{t} \gets \vec{t} + s_1\vec{a} + s_2\vec{b}$`
pub fn add_two_scaled<F: Float>(to: &mut [F], a: &[F], scalar_a: F, b: &[F], scalar_b: F) {
    debug_assert_eq!(to.len(), a.len());
    debug_assert_eq!(to.len(), b.len());
    for ((t, &x), &y) in to.iter_mut().zip(a.iter()).zip(b.iter()) {
        *t = *t + scalar_a * x + scalar_b * y;
    }
}

/// `$\vec{t} \gets \vec{t} + s_1\vec{a} + s_2\vec{b} + s_3\vec{c}$`
pub fn add_three_scaled<F: Float>(
    to: &mut [F],
    a: &[F],
    scalar_a: F,
    b: &[F],
    scalar_b: F,
    c: &[F],
    scalar_c: F,
) {
    debug_assert_eq!(to.len(), a.len());
    debug_assert_eq!(to.len(), b.len());
    debug_assert_eq!(to.len(), c.len());
    for (i, t) in to.iter_mut().enumerate() {
        *t = *t + scalar_a * a[i] + scalar_b * b[i] + scalar_c * c[i];
    }
}

/// Elementwise `$t_i \gets t_i m_i$`.
pub fn multiply<F: Float>(to: &mut [F], by: &[F]) {
    debug_assert_eq!(to.len(), by.len());
    for (t, &m) in to.iter_mut().zip(by.iter()) {
        *t = *t * m;
    }
}

/// Elementwise `$t_i \gets t_i / d_i$`.
pub fn divide<F: Float>(to: &mut [F], by: &[F]) {
    debug_assert_eq!(to.len(), by.len());
    for (t, &d) in to.iter_mut().zip(by.iter()) {
        *t = *t / d;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn kernels() {
        let mut v = [1.0f64, -2.0, 3.0];
        scale(&mut v, 2.0);
        assert_eq!(v, [2.0, -4.0, 6.0]);
        assert_relative_eq!(dot(&v, &[1.0, 1.0, 1.0]), 4.0);
        assert_relative_eq!(norm_squared(&v), 56.0);

        add_scaled(&mut v, &[1.0, 1.0, 1.0], -2.0);
        assert_eq!(v, [0.0, -6.0, 4.0]);

        add_two_scaled(&mut v, &[1.0, 0.0, 0.0], 3.0, &[0.0, 1.0, 0.0], 6.0);
        assert_eq!(v, [3.0, 0.0, 4.0]);

        add_three_scaled(
            &mut v,
            &[1.0, 1.0, 1.0],
            1.0,
            &[0.0, 2.0, 0.0],
            0.5,
            &[0.0, 0.0, 1.0],
            -5.0,
        );
        assert_eq!(v, [4.0, 2.0, 0.0]);

        multiply(&mut v, &[0.5, 2.0, 7.0]);
        assert_eq!(v, [2.0, 4.0, 0.0]);
        divide(&mut v, &[2.0, 8.0, 1.0]);
        assert_eq!(v, [1.0, 0.5, 0.0]);

        let mut w = [0.0; 3];
        copy(&mut w, &v);
        assert_eq!(w, v);
        zero(&mut w);
        assert_eq!(w, [0.0; 3]);
    }
}
