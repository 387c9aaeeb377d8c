//! Reporting utilities: terminal summaries and legend text.

pub mod format;
pub mod legend;

pub use format::*;
pub use legend::*;
