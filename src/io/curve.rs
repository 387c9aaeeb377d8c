//! Read/write curves JSON files.
//!
//! A curves file is the portable record of a batch:
//! - per scan: metadata, fit, working point and background rate
//! - the measured points (`[voltage, efficiency, error]`)
//! - a precomputed fitted grid across the fit domain for quick plotting
//!
//! The schema is defined by `domain::CurveFile`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::Utc;

use crate::domain::{CurveEntry, CurveFile, CurveGrid, FitResult, ScanAnalysis};
use crate::error::AppError;

/// Grid resolution of the stored fitted curves.
pub const GRID_POINTS: usize = 101;

/// Build the serializable record for a batch.
pub fn curve_file(analyses: &[ScanAnalysis]) -> CurveFile {
    CurveFile {
        tool: format!("hvscan {}", env!("CARGO_PKG_VERSION")),
        generated_at: Utc::now(),
        scans: analyses.iter().map(curve_entry).collect(),
    }
}

/// Write a curves JSON file.
pub fn write_curves_json(path: &Path, analyses: &[ScanAnalysis]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create curves JSON '{}': {e}", path.display())))?;

    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &curve_file(analyses))
        .map_err(|e| AppError::new(2, format!("Failed to write curves JSON: {e}")))?;
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush curves JSON '{}': {e}", path.display())))
}

/// Read a curves JSON file.
pub fn read_curves_json(path: &Path) -> Result<CurveFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open curves JSON '{}': {e}", path.display())))?;
    let curves: CurveFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid curves JSON: {e}")))?;
    Ok(curves)
}

fn curve_entry(a: &ScanAnalysis) -> CurveEntry {
    CurveEntry {
        meta: a.meta.clone(),
        fit: a.fit.clone(),
        working_point: a.working_point,
        background: a.background.clone(),
        points: a
            .sample
            .points
            .iter()
            .map(|p| [p.voltage, p.efficiency, p.efficiency_error])
            .collect(),
        grid: build_grid(&a.fit),
    }
}

fn build_grid(fit: &FitResult) -> CurveGrid {
    let (voltage, efficiency) = fit.model.sample(fit.domain, GRID_POINTS).into_iter().unzip();
    CurveGrid { voltage, efficiency }
}
