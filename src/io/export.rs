//! Export per-scan results to CSV.
//!
//! One row per scan, failed scans included: `status` is `ok` or `failed`, and
//! failed rows carry the error kind and message with the numeric columns empty.

use std::path::Path;

use crate::domain::{Attenuation, BackgroundRate, ScanAnalysis, ScanFailure};
use crate::error::AppError;

const HEADER: [&str; 26] = [
    "group",
    "label",
    "file",
    "mixture",
    "attenuation",
    "status",
    "error_kind",
    "error",
    "emax",
    "emax_err",
    "lambda",
    "lambda_err",
    "hv50",
    "hv50_err",
    "chi2",
    "ndf",
    "used",
    "excluded",
    "reference",
    "hv_ref",
    "wp_voltage",
    "wp_voltage_err",
    "wp_voltage_err_cov",
    "eff_at_wp",
    "bkg_khz_cm2",
    "bkg_note",
];

/// Write per-scan results to a CSV file.
pub fn write_results_csv(path: &Path, analyses: &[ScanAnalysis], failures: &[ScanFailure]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;

    let write_err = |e: csv::Error| AppError::new(2, format!("Failed to write export CSV '{}': {e}", path.display()));

    writer.write_record(HEADER).map_err(write_err)?;
    for a in analyses {
        writer.write_record(analysis_row(a)).map_err(write_err)?;
    }
    for f in failures {
        writer.write_record(failure_row(f)).map_err(write_err)?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV '{}': {e}", path.display())))?;
    Ok(())
}

fn analysis_row(a: &ScanAnalysis) -> Vec<String> {
    let fit = &a.fit;
    let wp = &a.working_point;
    let (bkg, bkg_note) = match &a.background {
        BackgroundRate::Measured { khz_per_cm2 } => (format!("{khz_per_cm2:.6}"), String::new()),
        BackgroundRate::Unavailable { reason } => (String::new(), reason.clone()),
    };
    vec![
        a.meta.group.clone().unwrap_or_default(),
        a.meta.label.clone(),
        a.meta.source.display().to_string(),
        a.meta.mixture.clone().unwrap_or_default(),
        attenuation_cell(a.meta.attenuation),
        "ok".to_string(),
        String::new(),
        String::new(),
        format!("{:.6}", fit.model.emax),
        format!("{:.6}", fit.errors.emax),
        format!("{:.8}", fit.model.lambda),
        format!("{:.8}", fit.errors.lambda),
        format!("{:.3}", fit.model.hv50),
        format!("{:.3}", fit.errors.hv50),
        format!("{:.6}", fit.quality.chi2),
        fit.quality.ndf.to_string(),
        fit.used.to_string(),
        fit.excluded.to_string(),
        format!("{}", wp.reference.fraction()),
        format!("{:.3}", wp.hv_ref),
        format!("{:.3}", wp.wp_voltage),
        format!("{:.3}", wp.wp_voltage_error),
        format!("{:.3}", wp.wp_voltage_error_cov),
        format!("{:.6}", wp.eff_at_wp),
        bkg,
        bkg_note,
    ]
}

fn failure_row(f: &ScanFailure) -> Vec<String> {
    let mut row = vec![String::new(); HEADER.len()];
    row[0] = f.job.group.clone().unwrap_or_default();
    row[1] = f.job.label.clone();
    row[2] = f.job.path.display().to_string();
    row[5] = "failed".to_string();
    row[6] = f.error.kind().to_string();
    row[7] = f.error.to_string();
    row
}

fn attenuation_cell(att: Option<Attenuation>) -> String {
    att.map(|a| a.to_string()).unwrap_or_default()
}
