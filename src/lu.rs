//! LU decomposition with implicit (scaled) partial pivoting.
//!
//! This is Crout's method: every row is first weighted by the reciprocal of
//! its largest absolute entry, and the pivot of each column is the entry
//! that is largest _relative to its row_. The factors are stored in place of
//! the input matrix.
#[cfg(test)]
use approx::assert_relative_eq;
use nalgebra::{convert, DMatrix, DVector, RealField};
use num_traits::Float;

use crate::Error;

/// Replacement for an exactly zero pivot.
///
/// A zero pivot after pivoting means the matrix is singular to working
/// precision; the factorization continues with a degraded result instead of
/// failing.
const TINY: f64 = 1.0e-20;

/// Decompose the square matrix `a` in place.
///
/// On return `a` holds `$\mathbf{L}$` (strictly below the diagonal, unit
/// diagonal implied) and `$\mathbf{U}$` (on and above the diagonal) of a row
/// permutation of the input. `permutation[j]` records the row that was
/// swapped into position `j`, and `scale` receives the implicit row weights.
///
/// Returns the parity of the row interchanges, `$\pm 1$`.
///
/// # Errors
///
/// Returns [`Error::SingularMatrix`] if a row of `a` is identically zero.
///
/// # Panics
///
/// Panics if `a` is not square or the work slices do not match its size.
pub fn decompose_in_place<F>(
    a: &mut DMatrix<F>,
    scale: &mut [F],
    permutation: &mut [usize],
) -> Result<F, Error>
where
    F: RealField + Float,
{
    let n = a.nrows();
    assert!(a.is_square(), "matrix must be square");
    assert_eq!(scale.len(), n, "scale vector has wrong length");
    assert_eq!(permutation.len(), n, "permutation vector has wrong length");

    let mut parity = F::one();
    for i in 0..n {
        let mut big = F::zero();
        for j in 0..n {
            big = Float::max(big, Float::abs(a[(i, j)]));
        }
        if big.is_zero() {
            return Err(Error::SingularMatrix);
        }
        scale[i] = F::one() / big;
    }

    for j in 0..n {
        // rows above the diagonal: U
        for i in 0..j {
            let mut sum = a[(i, j)];
            for k in 0..i {
                sum -= a[(i, k)] * a[(k, j)];
            }
            a[(i, j)] = sum;
        }
        // diagonal and below, remembering the best scaled pivot
        let mut big = F::zero();
        let mut imax = j;
        for i in j..n {
            let mut sum = a[(i, j)];
            for k in 0..j {
                sum -= a[(i, k)] * a[(k, j)];
            }
            a[(i, j)] = sum;
            let figure = scale[i] * Float::abs(sum);
            if figure >= big {
                big = figure;
                imax = i;
            }
        }
        if imax != j {
            a.swap_rows(imax, j);
            parity = -parity;
            scale[imax] = scale[j];
        }
        permutation[j] = imax;
        if a[(j, j)].is_zero() {
            a[(j, j)] = convert(TINY);
        }
        if j + 1 != n {
            let pivot_inv = F::one() / a[(j, j)];
            for i in j + 1..n {
                a[(i, j)] *= pivot_inv;
            }
        }
    }
    Ok(parity)
}

/// Solve `$\mathbf{A}\vec{x} = \vec{b}$` given the output of
/// [`decompose_in_place`]. `b` is overwritten with `$\vec{x}$`.
///
/// The permutation is undone during forward substitution. Leading zeros of
/// `$\vec{b}$` are skipped.
pub fn back_substitute<F>(lu: &DMatrix<F>, permutation: &[usize], b: &mut [F])
where
    F: RealField + Float,
{
    let n = lu.nrows();
    debug_assert_eq!(permutation.len(), n);
    debug_assert_eq!(b.len(), n);

    let mut first_nonzero = None;
    for i in 0..n {
        let ip = permutation[i];
        let mut sum = b[ip];
        b[ip] = b[i];
        if let Some(start) = first_nonzero {
            for j in start..i {
                sum -= lu[(i, j)] * b[j];
            }
        } else if !sum.is_zero() {
            first_nonzero = Some(i);
        }
        b[i] = sum;
    }
    for i in (0..n).rev() {
        let mut sum = b[i];
        for j in i + 1..n {
            sum -= lu[(i, j)] * b[j];
        }
        b[i] = sum / lu[(i, i)];
    }
}

/// A decomposed square matrix that can be solved against any number of
/// right-hand sides.
#[derive(Debug, Clone)]
pub struct LuDecomposition<F: RealField> {
    lu: DMatrix<F>,
    permutation: Vec<usize>,
    parity: F,
}

impl<F: RealField + Float> LuDecomposition<F> {
    /// Decompose `a`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SingularMatrix`] if a row of `a` is identically zero.
    pub fn new(mut a: DMatrix<F>) -> Result<Self, Error> {
        let n = a.nrows();
        let mut scale = vec![F::zero(); n];
        let mut permutation = vec![0; n];
        let parity = decompose_in_place(&mut a, &mut scale, &mut permutation)?;
        Ok(Self {
            lu: a,
            permutation,
            parity,
        })
    }

    pub fn dim(&self) -> usize {
        self.lu.nrows()
    }

    /// Combined `$\mathbf{L}$` and `$\mathbf{U}$` factors.
    pub fn factors(&self) -> &DMatrix<F> {
        &self.lu
    }

    pub fn permutation(&self) -> &[usize] {
        &self.permutation
    }

    /// Solve in place, overwriting `b` with the solution.
    pub fn solve_mut(&self, b: &mut DVector<F>) {
        assert_eq!(b.nrows(), self.dim(), "right-hand side has wrong length");
        back_substitute(&self.lu, &self.permutation, b.as_mut_slice());
    }

    pub fn solve(&self, b: &DVector<F>) -> DVector<F> {
        let mut x = b.clone();
        self.solve_mut(&mut x);
        x
    }

    /// Determinant of the decomposed matrix.
    pub fn determinant(&self) -> F {
        (0..self.dim()).fold(self.parity, |det, i| det * self.lu[(i, i)])
    }
}

#[cfg(test)]
fn hilbert_like() -> DMatrix<f64> {
    #[rustfmt::skip]
    let a = DMatrix::from_row_slice(4, 4, &[
        1., 1., 1., 1.,
        1., 2., 2., 2.,
        1., 2., 3., 3.,
        1., 2., 3., 4.,
    ]);
    a
}

#[test]
fn round_trip() {
    let a = hilbert_like();
    let x = DVector::from_vec(vec![1., 0.1, 0.01, 0.001]);
    let b = &a * &x;
    let lu = LuDecomposition::new(a).ok().unwrap();
    assert_relative_eq!(lu.solve(&b), x, max_relative = 1e-8);
    assert_relative_eq!(lu.determinant(), 1., epsilon = 1e-12);
}

#[test]
fn multiple_right_hand_sides() {
    let a = hilbert_like();
    let lu = LuDecomposition::new(a.clone()).ok().unwrap();
    for k in 0..4 {
        let mut e = DVector::zeros(4);
        e[k] = 1.;
        let column = lu.solve(&e);
        assert_relative_eq!(&a * column, e, epsilon = 1e-12);
    }
}

#[test]
fn pivots_on_scaled_rows() {
    // the first column would pivot on row 0 without implicit scaling
    #[rustfmt::skip]
    let a = DMatrix::from_row_slice(2, 2, &[
        2., 1e6,
        1., 1.,
    ]);
    let lu = LuDecomposition::new(a.clone()).ok().unwrap();
    assert_eq!(lu.permutation(), &[1, 1]);
    assert_relative_eq!(lu.determinant(), a.determinant(), max_relative = 1e-12);
    let b = DVector::from_vec(vec![1., 2.]);
    assert_relative_eq!(&a * lu.solve(&b), b, epsilon = 1e-9);
}

#[test]
fn zero_row_is_singular() {
    #[rustfmt::skip]
    let a = DMatrix::from_row_slice(3, 3, &[
        1., 2., 3.,
        0., 0., 0.,
        4., 5., 6.,
    ]);
    assert!(matches!(LuDecomposition::new(a), Err(Error::SingularMatrix)));
}

#[test]
fn zero_pivot_is_replaced() {
    // rank deficient without a zero row
    #[rustfmt::skip]
    let mut a = DMatrix::from_row_slice(2, 2, &[
        1., 1.,
        1., 1.,
    ]);
    let mut scale = [0.; 2];
    let mut permutation = [0; 2];
    let parity = decompose_in_place(&mut a, &mut scale, &mut permutation).unwrap();
    // ties pick the last candidate row
    assert_eq!(permutation, [1, 1]);
    assert_eq!(parity, -1.);
    assert_eq!(a[(1, 1)], TINY);
}
