//! Sigmoid efficiency model.
//!
//! The model is implemented as small, pure methods on `SigmoidModel` so that
//! the fitter, the working-point extractor and the plotting code all evaluate
//! the same expression.

pub mod model;

pub use model::*;
