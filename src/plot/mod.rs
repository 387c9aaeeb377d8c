//! Plotting: terminal (ASCII) and SVG comparison charts.

pub mod ascii;
pub mod style;
pub mod svg;

pub use ascii::*;
pub use svg::*;
