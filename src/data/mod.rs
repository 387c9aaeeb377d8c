//! Data sources other than measured scans.

pub mod synthetic;

pub use synthetic::*;
