//! Dense linear-algebra operations needed by the spline fit.
//!
//! The thin-plate-spline estimator only needs a matrix inverse and singular
//! values. Both go through [`LinearAlgebra`] so the numeric backend can be
//! swapped without touching the fitting code. [`Nalgebra`] is the default.

use nalgebra::{DMatrix, DVector};

/// Minimal numeric backend interface.
pub trait LinearAlgebra {
    /// Inverse of a square matrix, or `None` if it is singular or too
    /// ill-conditioned to invert reliably.
    fn invert(&self, m: &DMatrix<f64>) -> Option<DMatrix<f64>>;

    /// Singular values of `m`, in no particular order.
    fn singular_values(&self, m: &DMatrix<f64>) -> DVector<f64>;

    /// Ratio of the largest to the smallest singular value.
    ///
    /// `+∞` when the matrix is numerically rank deficient (smallest singular
    /// value within machine epsilon of the largest).
    fn condition_number(&self, m: &DMatrix<f64>) -> f64 {
        let sv = self.singular_values(m);
        if sv.is_empty() {
            return f64::INFINITY;
        }
        let max = sv.max();
        let min = sv.min();
        if min <= max * f64::EPSILON {
            f64::INFINITY
        } else {
            max / min
        }
    }
}

/// [`LinearAlgebra`] backed by nalgebra's SVD and LU decompositions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Nalgebra {
    /// Smallest accepted reciprocal condition number for [`invert`](LinearAlgebra::invert).
    /// Default 1e-12.
    pub rcond: f64,
}

impl Default for Nalgebra {
    fn default() -> Self {
        Self { rcond: 1e-12 }
    }
}

impl LinearAlgebra for Nalgebra {
    fn invert(&self, m: &DMatrix<f64>) -> Option<DMatrix<f64>> {
        if !m.is_square() || m.is_empty() {
            return None;
        }
        let sv = self.singular_values(m);
        let max = sv.max();
        if !(max > 0.0) || sv.min() < max * self.rcond {
            return None;
        }
        m.clone()
            .try_inverse()
            .filter(|inv| inv.iter().all(|v| v.is_finite()))
    }

    fn singular_values(&self, m: &DMatrix<f64>) -> DVector<f64> {
        m.clone().svd(false, false).singular_values
    }
}
