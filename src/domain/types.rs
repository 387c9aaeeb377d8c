//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON/CSV
//! - reloaded later for plotting or comparisons

use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::ReferenceEfficiency;
use crate::error::ScanError;

/// One voltage step of an efficiency scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanPoint {
    /// Effective high voltage (V).
    pub voltage: f64,
    /// Measured efficiency, nominally in `[0, 1]`.
    pub efficiency: f64,
    /// One-sigma error on `efficiency`.
    pub efficiency_error: f64,
}

impl ScanPoint {
    pub fn new(voltage: f64, efficiency: f64, efficiency_error: f64) -> Self {
        Self {
            voltage,
            efficiency,
            efficiency_error,
        }
    }
}

/// A full voltage sweep for one detector/gas configuration.
///
/// Voltage ordering is expected but not enforced; duplicated voltages are kept.
#[derive(Debug, Clone)]
pub struct ScanSample {
    pub label: String,
    pub points: Vec<ScanPoint>,
}

impl ScanSample {
    pub fn new(label: impl Into<String>, points: Vec<ScanPoint>) -> Self {
        Self {
            label: label.into(),
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Closed voltage interval covered by a scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoltageDomain {
    pub min: f64,
    pub max: f64,
}

impl VoltageDomain {
    pub fn from_voltages(voltages: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in voltages.into_iter().filter(|v| v.is_finite()) {
            min = min.min(v);
            max = max.max(v);
        }
        if min.is_finite() && max.is_finite() {
            Some(Self { min, max })
        } else {
            None
        }
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// Three-parameter logistic response:
///
/// `efficiency(v) = emax / (1 + exp(-lambda * (v - hv50)))`
///
/// Evaluation and inversion live in `crate::models`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SigmoidModel {
    /// Plateau efficiency.
    pub emax: f64,
    /// Slope (1/V).
    pub lambda: f64,
    /// Voltage at half plateau (V).
    pub hv50: f64,
}

/// Starting point for the optimizer.
///
/// The defaults assume voltages in volts, in the thousands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialGuess {
    pub emax: f64,
    pub lambda: f64,
    pub hv50: f64,
}

impl Default for InitialGuess {
    fn default() -> Self {
        Self {
            emax: 0.9,
            lambda: 0.01,
            hv50: 7000.0,
        }
    }
}

impl From<InitialGuess> for SigmoidModel {
    fn from(g: InitialGuess) -> Self {
        SigmoidModel {
            emax: g.emax,
            lambda: g.lambda,
            hv50: g.hv50,
        }
    }
}

/// How samples with zero, negative or non-finite errors enter the fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ZeroErrorPolicy {
    /// Drop the sample from the weighted sum.
    Exclude,
    /// Replace the error by `max(error, error_floor)`.
    Floor,
}

/// Which efficiency scale the reference fraction refers to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceBasis {
    /// Fraction of the fitted plateau (`efficiency / emax`).
    #[default]
    Relative,
    /// Absolute efficiency (must be below the plateau).
    Absolute,
}

/// One-sigma parameter errors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamErrors {
    pub emax: f64,
    pub lambda: f64,
    pub hv50: f64,
}

/// Goodness-of-fit diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    pub chi2: f64,
    /// Degrees of freedom (`used - 3`).
    pub ndf: usize,
    pub iterations: usize,
}

impl FitQuality {
    pub fn chi2_per_ndf(&self) -> Option<f64> {
        if self.ndf == 0 {
            None
        } else {
            Some(self.chi2 / self.ndf as f64)
        }
    }
}

/// Converged sigmoid fit for one scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub model: SigmoidModel,
    pub errors: ParamErrors,
    /// Parameter covariance in `(emax, lambda, hv50)` order.
    pub covariance: [[f64; 3]; 3],
    /// Voltage range of the samples that entered the fit.
    pub domain: VoltageDomain,
    pub quality: FitQuality,
    /// Samples used in the weighted sum.
    pub used: usize,
    /// Samples dropped (zero/invalid error or non-finite values).
    pub excluded: usize,
}

/// Operating-point quantities derived from one fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkingPoint {
    /// Reference fraction used for `hv_ref`.
    pub reference: ReferenceEfficiency,
    pub basis: ReferenceBasis,
    /// Voltage reaching the reference efficiency.
    pub hv_ref: f64,
    /// Recommended operating voltage.
    pub wp_voltage: f64,
    /// Linear-sum approximation `ln(19)/λ² σλ + σHV50`.
    pub wp_voltage_error: f64,
    /// First-order propagation through the full covariance.
    pub wp_voltage_error_cov: f64,
    /// Model efficiency at `wp_voltage`.
    pub eff_at_wp: f64,
}

/// Background gamma rate read from the companion working-point file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BackgroundRate {
    /// kHz/cm².
    Measured { khz_per_cm2: f64 },
    /// No usable value; the reason is kept for reports.
    Unavailable { reason: String },
}

impl BackgroundRate {
    pub fn value(&self) -> Option<f64> {
        match self {
            BackgroundRate::Measured { khz_per_cm2 } => Some(*khz_per_cm2),
            BackgroundRate::Unavailable { .. } => None,
        }
    }
}

/// Source attenuation setting parsed from the scan file name.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Attenuation {
    /// Source off.
    Off,
    /// Attenuation factor (ABS).
    Factor { value: f64 },
}

impl Attenuation {
    /// X position on plateau-vs-attenuation charts.
    pub fn plot_position(&self, off_position: f64) -> f64 {
        match self {
            Attenuation::Off => off_position,
            Attenuation::Factor { value } => *value,
        }
    }
}

impl std::fmt::Display for Attenuation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Attenuation::Off => write!(f, "OFF"),
            Attenuation::Factor { value } => write!(f, "{value}"),
        }
    }
}

/// Descriptive metadata for one scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanMeta {
    pub label: String,
    /// Scan file the data came from.
    pub source: PathBuf,
    /// Dataset group (year, campaign, ...).
    pub group: Option<String>,
    /// Gas mixture tag from the file name (e.g. `STDMX`).
    pub mixture: Option<String>,
    /// Readable mixture name for legends.
    #[serde(default)]
    pub mixture_name: Option<String>,
    pub attenuation: Option<Attenuation>,
    /// Explicit legend text from the manifest.
    pub legend: Option<String>,
}

/// One unit of batch work.
#[derive(Debug, Clone)]
pub struct ScanJob {
    pub path: PathBuf,
    pub label: String,
    pub group: Option<String>,
    /// Companion working-point file; defaults to `<stem>_WP.csv`.
    pub wp_file: Option<PathBuf>,
    pub legend: Option<String>,
    pub mixture_name: Option<String>,
}

/// Everything the report and plot layers need for one successful scan.
#[derive(Debug, Clone)]
pub struct ScanAnalysis {
    pub meta: ScanMeta,
    pub sample: ScanSample,
    pub fit: FitResult,
    pub working_point: WorkingPoint,
    pub background: BackgroundRate,
}

/// A scan that did not make it through ingest, fit or extraction.
#[derive(Debug)]
pub struct ScanFailure {
    pub job: ScanJob,
    pub error: ScanError,
}

/// A saved curves file (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveFile {
    pub tool: String,
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub scans: Vec<CurveEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveEntry {
    pub meta: ScanMeta,
    pub fit: FitResult,
    pub working_point: WorkingPoint,
    pub background: BackgroundRate,
    pub points: Vec<[f64; 3]>,
    pub grid: CurveGrid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveGrid {
    pub voltage: Vec<f64>,
    pub efficiency: Vec<f64>,
}
