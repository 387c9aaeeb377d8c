//! Mathematical utilities: the logistic function and linear least squares.

pub mod logistic;
pub mod lstsq;

pub use logistic::*;
pub use lstsq::*;
