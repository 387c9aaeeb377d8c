//! Logistic function helpers.
//!
//! - `logistic(z) = 1 / (1 + exp(-z))`
//! - `logit(p) = ln(p / (1 - p))`, the inverse on `(0, 1)`
//!
//! Numerical notes:
//! - For large negative `z`, `exp(-z)` overflows to `+inf` and the result
//!   cleanly underflows to `0.0` (no NaN).
//! - A single expression is used on the whole real line so that the result
//!   is non-decreasing in `z` even after rounding.

/// Standard logistic function.
#[inline]
pub fn logistic(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Inverse of [`logistic`]; `None` outside the open interval `(0, 1)`.
pub fn logit(p: f64) -> Option<f64> {
    if p.is_finite() && p > 0.0 && p < 1.0 {
        Some((p / (1.0 - p)).ln())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logistic_midpoint_and_tails() {
        assert_eq!(logistic(0.0), 0.5);
        assert_eq!(logistic(-1e6), 0.0);
        assert_eq!(logistic(1e6), 1.0);
        assert!(logistic(-800.0).is_finite());
    }

    #[test]
    fn logit_inverts_logistic() {
        for &z in &[-8.0, -1.0, 0.0, 0.3, 4.0] {
            let back = logit(logistic(z)).unwrap();
            assert!((back - z).abs() < 1e-9, "z={z} back={back}");
        }
        assert!(logit(0.0).is_none());
        assert!(logit(1.0).is_none());
    }
}
