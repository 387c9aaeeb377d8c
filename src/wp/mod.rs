//! Working-point extraction.
//!
//! Everything here is closed form: a converged [`crate::domain::FitResult`] goes
//! in, a [`crate::domain::WorkingPoint`] comes out. No optimization, no I/O.

pub mod extract;

pub use extract::*;
