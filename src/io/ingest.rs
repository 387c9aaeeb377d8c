//! CSV ingest for efficiency scans and their working-point companions.
//!
//! A scan file is a plain CSV with (at least) three columns:
//!
//! ```text
//! HV_top,efficiency,eff_error
//! 6000,0.01,0.01
//! 6500,0.50,0.02
//! ```
//!
//! Design goals:
//! - **Strict schema** for required columns (`MissingColumn`, exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **No fitting logic here**
//!
//! The companion file `<stem>_WP.csv` carries the chamber conditions at the
//! working point; only `noiseGammaRate` and `gamma_CS` are read from it.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::StringRecord;
use log::{debug, warn};

use crate::domain::{BackgroundRate, ScanPoint, ScanSample};
use crate::error::ScanError;

pub const HV_COLUMN: &str = "HV_top";
pub const EFFICIENCY_COLUMN: &str = "efficiency";
pub const ERROR_COLUMN: &str = "eff_error";

pub const NOISE_RATE_COLUMN: &str = "noiseGammaRate";
pub const GAMMA_CS_COLUMN: &str = "gamma_CS";

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: the scan plus what was skipped on the way.
#[derive(Debug, Clone)]
pub struct IngestedScan {
    pub sample: ScanSample,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Read a scan CSV from disk.
pub fn load_scan(path: &Path, label: &str) -> Result<IngestedScan, ScanError> {
    let file = File::open(path).map_err(|source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_scan(file, path, label)
}

/// Read a scan CSV from any reader; `path` is only used in error messages.
pub fn read_scan<R: Read>(reader: R, path: &Path, label: &str) -> Result<IngestedScan, ScanError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|source| ScanError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .clone();
    let header_map = build_header_map(&headers);

    let hv_idx = require_column(&header_map, HV_COLUMN, path)?;
    let eff_idx = require_column(&header_map, EFFICIENCY_COLUMN, path)?;
    let err_idx = require_column(&header_map, ERROR_COLUMN, path)?;

    let mut points = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2: header line, then 1-based numbering.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        let parsed = parse_f64(&record, hv_idx, HV_COLUMN).and_then(|voltage| {
            let efficiency = parse_f64(&record, eff_idx, EFFICIENCY_COLUMN)?;
            let error = parse_f64(&record, err_idx, ERROR_COLUMN)?;
            Ok(ScanPoint::new(voltage, efficiency, error))
        });

        match parsed {
            Ok(point) => points.push(point),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    for e in &row_errors {
        debug!("{}:{}: {}", path.display(), e.line, e.message);
    }
    if !row_errors.is_empty() {
        warn!(
            "{}: skipped {} of {rows_read} row(s)",
            path.display(),
            row_errors.len()
        );
    }

    Ok(IngestedScan {
        sample: ScanSample::new(label, points),
        row_errors,
        rows_read,
    })
}

/// `<dir>/<stem>_WP.<ext>` next to a scan file.
pub fn default_wp_path(scan_path: &Path) -> PathBuf {
    let stem = scan_path.file_stem().and_then(|s| s.to_str()).unwrap_or("scan");
    let ext = scan_path.extension().and_then(|s| s.to_str()).unwrap_or("csv");
    scan_path.with_file_name(format!("{stem}_WP.{ext}"))
}

/// Background gamma rate (kHz/cm²) from a working-point file.
///
/// Never fails: anything that prevents a measurement becomes
/// `BackgroundRate::Unavailable` with the reason, and a warning is logged.
pub fn load_background(path: &Path) -> BackgroundRate {
    let result = File::open(path)
        .map_err(|e| format!("cannot open {}: {e}", path.display()))
        .and_then(|file| read_background(file, path));

    match result {
        Ok(khz_per_cm2) => BackgroundRate::Measured { khz_per_cm2 },
        Err(reason) => {
            warn!("background rate unavailable: {reason}");
            BackgroundRate::Unavailable { reason }
        }
    }
}

/// `noiseGammaRate / (gamma_CS * 1000)` from the first data row.
pub fn read_background<R: Read>(reader: R, path: &Path) -> Result<f64, String> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| format!("{}: cannot read header: {e}", path.display()))?
        .clone();
    let header_map = build_header_map(&headers);

    let missing = |column: &str| format!("{}: columns `{NOISE_RATE_COLUMN}`/`{GAMMA_CS_COLUMN}` not found (missing `{column}`)", path.display());
    let noise_idx = *header_map
        .get(&normalize_header_name(NOISE_RATE_COLUMN))
        .ok_or_else(|| missing(NOISE_RATE_COLUMN))?;
    let gamma_idx = *header_map
        .get(&normalize_header_name(GAMMA_CS_COLUMN))
        .ok_or_else(|| missing(GAMMA_CS_COLUMN))?;

    let record = reader
        .records()
        .next()
        .ok_or_else(|| format!("{}: no data rows", path.display()))?
        .map_err(|e| format!("{}: {e}", path.display()))?;

    let noise = parse_f64(&record, noise_idx, NOISE_RATE_COLUMN)?;
    let gamma_cs = parse_f64(&record, gamma_idx, GAMMA_CS_COLUMN)?;
    if gamma_cs == 0.0 {
        return Err(format!("{}: `{GAMMA_CS_COLUMN}` is zero", path.display()));
    }

    Ok(noise / (gamma_cs * 1000.0))
}

fn require_column(header_map: &HashMap<String, usize>, column: &str, path: &Path) -> Result<usize, ScanError> {
    header_map
        .get(&normalize_header_name(column))
        .copied()
        .ok_or_else(|| ScanError::MissingColumn {
            column: column.to_string(),
            path: path.to_path_buf(),
        })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports may prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn parse_f64(record: &StringRecord, idx: usize, column: &str) -> Result<f64, String> {
    let raw = record
        .get(idx)
        .ok_or_else(|| format!("missing value for `{column}`"))?;
    if raw.is_empty() {
        return Err(format!("empty value for `{column}`"));
    }
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("invalid number for `{column}`: '{raw}'"))?;
    if !value.is_finite() {
        return Err(format!("non-finite value for `{column}`: '{raw}'"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(text: &str) -> Result<IngestedScan, ScanError> {
        read_scan(text.as_bytes(), Path::new("scan.csv"), "scan")
    }

    #[test]
    fn reads_required_columns_in_any_order() {
        let scan = read("eff_error,HV_top,extra,efficiency\n0.01,6000,x,0.02\n0.02,6500,y,0.5\n").unwrap();
        assert_eq!(scan.rows_read, 2);
        assert!(scan.row_errors.is_empty());
        assert_eq!(scan.sample.points[1], ScanPoint::new(6500.0, 0.5, 0.02));
        assert_eq!(scan.sample.label, "scan");
    }

    #[test]
    fn header_matching_ignores_bom_case_and_whitespace() {
        let scan = read("\u{feff}hv_top , Efficiency,EFF_ERROR\n7000,0.9,0.01\n").unwrap();
        assert_eq!(scan.sample.len(), 1);
    }

    #[test]
    fn missing_column_is_reported_by_name() {
        let err = read("HV_top,efficiency\n6000,0.1\n").unwrap_err();
        match err {
            ScanError::MissingColumn { column, .. } => assert_eq!(column, "eff_error"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bad_rows_are_skipped_with_line_numbers() {
        let scan = read("HV_top,efficiency,eff_error\n6000,0.1,0.01\n6500,abc,0.02\n7000,,0.01\n7500,0.95,nan\n8000,0.96,0.01\n").unwrap();
        assert_eq!(scan.rows_read, 5);
        assert_eq!(scan.sample.len(), 2);
        let lines: Vec<usize> = scan.row_errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 4, 5]);
        assert!(scan.row_errors[0].message.contains("efficiency"));
    }

    #[test]
    fn wp_path_sits_next_to_scan() {
        assert_eq!(
            default_wp_path(Path::new("data_2024/STDMX_OFF.csv")),
            PathBuf::from("data_2024/STDMX_OFF_WP.csv")
        );
    }

    #[test]
    fn background_rate_from_first_row() {
        let text = "noiseGammaRate,gamma_CS,other\n2400,2.0,1\n9999,1.0,1\n";
        let rate = read_background(text.as_bytes(), Path::new("wp.csv")).unwrap();
        assert!((rate - 1.2).abs() < 1e-12);
    }

    #[test]
    fn background_failures_carry_a_reason() {
        let err = read_background("noiseGammaRate\n10\n".as_bytes(), Path::new("wp.csv")).unwrap_err();
        assert!(err.contains("gamma_CS"), "{err}");

        let err = read_background("noiseGammaRate,gamma_CS\n10,0\n".as_bytes(), Path::new("wp.csv")).unwrap_err();
        assert!(err.contains("zero"), "{err}");

        let rate = load_background(Path::new("definitely/not/here_WP.csv"));
        assert!(matches!(rate, BackgroundRate::Unavailable { .. }));
        assert_eq!(rate.value(), None);
    }
}
