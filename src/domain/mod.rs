//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - scan samples (`ScanPoint`, `ScanSample`) and their metadata (`ScanMeta`)
//! - the sigmoid model and fit outputs (`SigmoidModel`, `FitResult`)
//! - derived working points (`WorkingPoint`) and the validated reference
//!   efficiency they are computed at (`ReferenceEfficiency`)

pub mod reference;
pub mod types;

pub use reference::*;
pub use types::*;

#[cfg(test)]
pub(crate) mod fixtures;
