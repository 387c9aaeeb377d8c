//! Error types.
//!
//! Two layers:
//!
//! - [`ScanError`]: typed, per-scan failures raised by ingest, fitting and
//!   working-point extraction. The batch pipeline records these and moves on
//!   to the next scan.
//! - [`AppError`]: what the binary reports to the user, carrying a process
//!   exit code (2 = input/usage, 3 = no usable data, 4 = computation).

use std::path::PathBuf;

use thiserror::Error;

/// Failures that concern a single scan.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Fewer valid samples than free model parameters (or no voltage spread).
    #[error("insufficient data: {valid} valid sample(s), need at least {required} ({detail})")]
    InsufficientData {
        valid: usize,
        required: usize,
        detail: String,
    },

    /// The optimizer stopped without an acceptable solution.
    #[error("fit did not converge after {iterations} iteration(s): {reason}")]
    FitConvergence { iterations: usize, reason: String },

    /// Slope parameter is zero, near zero or non-finite; inversions are undefined.
    #[error("degenerate fit: lambda = {lambda:e} makes the sigmoid inversion undefined")]
    DegenerateFit { lambda: f64 },

    /// A required input column is absent.
    #[error("missing required column `{column}` in {}", path.display())]
    MissingColumn { column: String, path: PathBuf },

    /// Reference efficiency given in a unit other than a plateau fraction.
    #[error("reference efficiency {value} is not a fraction in (0, 1){hint}")]
    ReferenceUnitMismatch { value: f64, hint: String },

    /// Absolute reference efficiency at or above the fitted plateau.
    #[error("reference efficiency {reference} is unreachable with plateau {emax:.4}")]
    ReferenceUnreachable { reference: f64, emax: f64 },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Invalid manifest file.
    #[error("invalid manifest {}: {message}", path.display())]
    Manifest { path: PathBuf, message: String },
}

impl ScanError {
    /// Exit code used when this error aborts the whole run.
    pub fn exit_code(&self) -> u8 {
        match self {
            ScanError::MissingColumn { .. }
            | ScanError::ReferenceUnitMismatch { .. }
            | ScanError::Io { .. }
            | ScanError::Csv { .. }
            | ScanError::Manifest { .. } => 2,
            ScanError::InsufficientData { .. } => 3,
            ScanError::FitConvergence { .. }
            | ScanError::DegenerateFit { .. }
            | ScanError::ReferenceUnreachable { .. } => 4,
        }
    }

    /// Short machine-friendly tag (used in exports).
    pub fn kind(&self) -> &'static str {
        match self {
            ScanError::InsufficientData { .. } => "insufficient_data",
            ScanError::FitConvergence { .. } => "fit_convergence",
            ScanError::DegenerateFit { .. } => "degenerate_fit",
            ScanError::MissingColumn { .. } => "missing_column",
            ScanError::ReferenceUnitMismatch { .. } => "reference_unit_mismatch",
            ScanError::ReferenceUnreachable { .. } => "reference_unreachable",
            ScanError::Io { .. } => "io",
            ScanError::Csv { .. } => "csv",
            ScanError::Manifest { .. } => "manifest",
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<ScanError> for AppError {
    fn from(err: ScanError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_errors_map_to_exit_codes() {
        let err = ScanError::InsufficientData {
            valid: 2,
            required: 3,
            detail: "two rows".to_string(),
        };
        let app: AppError = err.into();
        assert_eq!(app.exit_code(), 3);
        assert!(app.to_string().contains("2 valid sample(s)"));

        let err = ScanError::DegenerateFit { lambda: 0.0 };
        assert_eq!(err.exit_code(), 4);
        assert_eq!(err.kind(), "degenerate_fit");
    }
}
