//! Curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - select the samples that can enter the weighted sum
//! - run a bounded Levenberg–Marquardt minimization of the sigmoid
//! - fall back to a data-driven starting point when the configured guess fails
//! - report parameter errors from the normal-matrix inverse

pub mod fitter;
pub mod seed;

pub use fitter::*;
pub use seed::*;
