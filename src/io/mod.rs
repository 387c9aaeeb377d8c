//! Input/output helpers.
//!
//! - scan + working-point CSV ingest (`ingest`)
//! - file-name metadata (`naming`)
//! - batch manifest (`manifest`)
//! - results CSV export (`export`)
//! - curves JSON read/write (`curve`)

pub mod curve;
pub mod export;
pub mod ingest;
pub mod manifest;
pub mod naming;

pub use curve::*;
pub use export::*;
pub use ingest::*;
pub use manifest::*;
pub use naming::*;
