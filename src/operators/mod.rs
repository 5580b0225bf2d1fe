//! Element-local DG operators: mass, differentiation, face-mass and lifting
//! matrices, face matching, and their over-integrated quadrature variants.
//!
//! Everything here is pure host-side linear algebra over a
//! [`ReferenceElement`](crate::element::ReferenceElement); results are
//! immutable once built and cached per `(kind, order)` by [`OperatorCache`].

pub mod face_shuffle;
pub mod geometric;
mod matrices;
pub mod quadrature;
mod vandermonde;

pub use face_shuffle::{FaceShuffle, ShuffleLookup};
pub use geometric::{dt_geometric_factor, dt_non_geometric_factor, ElementGeometry};
pub use matrices::LocalOperators;
pub use quadrature::{simplex_cubature, QuadratureOperators};
pub use vandermonde::{build_vandermonde, build_grad_vandermonde, build_face_vandermonde};

use std::collections::HashMap;
use std::sync::Arc;

use faer::{linalg::solvers::Solve, Mat};

use crate::element::ElementKind;
use crate::error::ElementError;

/// Process-lifetime cache of local operators, keyed by `(kind, order)`.
///
/// Values are built on first access and never mutated afterwards; repeated
/// lookups return the same `Arc`, so derived matrices are bit-identical
/// across uses.
#[derive(Default)]
pub struct OperatorCache {
    entries: HashMap<(ElementKind, usize), Arc<LocalOperators>>,
}

impl OperatorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(
        &mut self,
        kind: ElementKind,
        order: usize,
    ) -> Result<Arc<LocalOperators>, ElementError> {
        if let Some(ops) = self.entries.get(&(kind, order)) {
            return Ok(Arc::clone(ops));
        }
        let ops = Arc::new(LocalOperators::build(kind, order as i64)?);
        self.entries.insert((kind, order), Arc::clone(&ops));
        Ok(ops)
    }
}

// Small dense helpers shared by the matrix assemblers. Explicit loops, like
// the rest of the crate; these matrices are tiny.

pub(crate) fn mat_mul(a: &Mat<f64>, b: &Mat<f64>) -> Mat<f64> {
    assert_eq!(a.ncols(), b.nrows());
    let mut out = Mat::zeros(a.nrows(), b.ncols());
    for i in 0..a.nrows() {
        for j in 0..b.ncols() {
            let mut sum = 0.0;
            for k in 0..a.ncols() {
                sum += a[(i, k)] * b[(k, j)];
            }
            out[(i, j)] = sum;
        }
    }
    out
}

pub(crate) fn mat_transpose(a: &Mat<f64>) -> Mat<f64> {
    let mut out = Mat::zeros(a.ncols(), a.nrows());
    for i in 0..a.nrows() {
        for j in 0..a.ncols() {
            out[(j, i)] = a[(i, j)];
        }
    }
    out
}

/// Invert a square matrix by LU-solving against the identity column by
/// column.
pub(crate) fn mat_invert(a: &Mat<f64>) -> Mat<f64> {
    let n = a.nrows();
    assert_eq!(n, a.ncols());
    let lu = a.as_ref().full_piv_lu();
    let mut inv = Mat::zeros(n, n);
    for col in 0..n {
        let mut rhs = Mat::zeros(n, 1);
        rhs[(col, 0)] = 1.0;
        let solution = lu.solve(&rhs);
        for row in 0..n {
            inv[(row, col)] = solution[(row, 0)];
        }
    }
    inv
}

/// Solve X · A = B for X, i.e. X = B · A⁻¹ (A square).
///
/// Used for differentiation matrices (D = ∇V · V⁻¹) and the quadrature
/// up-interpolation operators.
pub(crate) fn left_solve(a: &Mat<f64>, b: &Mat<f64>) -> Mat<f64> {
    // Xᵀ solves Aᵀ Xᵀ = Bᵀ.
    let n = a.nrows();
    assert_eq!(n, a.ncols());
    assert_eq!(b.ncols(), n);
    let at = mat_transpose(a);
    let lu = at.as_ref().full_piv_lu();
    let bt = mat_transpose(b);
    let xt = lu.solve(&bt);
    mat_transpose(&xt)
}

/// Frobenius norm of the difference of two equally-sized matrices.
pub(crate) fn frobenius_distance(a: &Mat<f64>, b: &Mat<f64>) -> f64 {
    assert_eq!(a.nrows(), b.nrows());
    assert_eq!(a.ncols(), b.ncols());
    let mut sum = 0.0;
    for i in 0..a.nrows() {
        for j in 0..a.ncols() {
            let d = a[(i, j)] - b[(i, j)];
            sum += d * d;
        }
    }
    sum.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mat_invert_roundtrip() {
        let mut a = Mat::zeros(3, 3);
        let values = [[2.0, 1.0, 0.0], [0.5, 3.0, -1.0], [0.0, 1.0, 4.0]];
        for i in 0..3 {
            for j in 0..3 {
                a[(i, j)] = values[i][j];
            }
        }
        let inv = mat_invert(&a);
        let product = mat_mul(&a, &inv);
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((product[(i, j)] - expected).abs() < 1e-13);
            }
        }
    }

    #[test]
    fn test_left_solve() {
        // X A = B  =>  X = B A^{-1}
        let mut a = Mat::zeros(2, 2);
        a[(0, 0)] = 2.0;
        a[(1, 1)] = 4.0;
        a[(0, 1)] = 1.0;
        let mut b = Mat::zeros(3, 2);
        for i in 0..3 {
            b[(i, 0)] = i as f64 + 1.0;
            b[(i, 1)] = 2.0 * i as f64 - 1.0;
        }
        let x = left_solve(&a, &b);
        let back = mat_mul(&x, &a);
        for i in 0..3 {
            for j in 0..2 {
                assert!((back[(i, j)] - b[(i, j)]).abs() < 1e-13);
            }
        }
    }

    #[test]
    fn test_cache_returns_same_instance() {
        let mut cache = OperatorCache::new();
        let a = cache.get(ElementKind::Triangle, 3).unwrap();
        let b = cache.get(ElementKind::Triangle, 3).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        // And the stored matrices are bit-identical across accesses.
        assert_eq!(a.lifting[(0, 0)].to_bits(), b.lifting[(0, 0)].to_bits());
    }
}
