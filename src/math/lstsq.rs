//! Linear least squares and normal-matrix helpers.
//!
//! The sigmoid fitter is nonlinear, but every Levenberg–Marquardt step is a
//! small linear problem:
//!
//! ```text
//! minimize ‖ A δ - b ‖²
//! ```
//!
//! where `A` stacks the weighted Jacobian on top of the damping rows.
//!
//! Implementation choices:
//! - We use SVD to solve the least-squares problem robustly even when
//!   the system is tall (more rows than columns).
//!   (Nalgebra's `QR::solve` is intended for square systems and will panic for
//!   non-square matrices.)
//! - The parameter dimension is 3, so SVD cost is negligible.

use nalgebra::{DMatrix, DVector, Matrix3};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Invert a symmetric positive-definite 3×3 normal matrix.
///
/// Uses Cholesky so that a matrix which is singular or not positive definite
/// (a parameter the data cannot constrain) is reported as `None` instead of
/// producing huge, meaningless variances.
pub fn invert_normal_matrix(m: &Matrix3<f64>) -> Option<Matrix3<f64>> {
    if m.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let chol = (*m).cholesky()?;
    let inv = chol.inverse();
    if inv.iter().all(|v| v.is_finite()) && (0..3).all(|i| inv[(i, i)] > 0.0) {
        Some(inv)
    } else {
        None
    }
}
