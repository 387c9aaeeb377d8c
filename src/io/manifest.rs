//! Batch manifest (TOML).
//!
//! Instead of answering prompts for every file, a batch is declared once:
//!
//! ```toml
//! # hvscan.toml
//! [fit]
//! initial_guess = { emax = 0.9, lambda = 0.01, hv50 = 7000.0 }
//! max_iterations = 200
//! zero_error = "exclude"
//!
//! [extract]
//! reference = "95%"
//!
//! [output]
//! results_csv = "results.csv"
//! svg_dir = "plots"
//!
//! [mixtures]
//! STDMX = "Standard gas mixture"
//! ECO2 = "30% CO_{2} + 1.0% SF_{6}"
//!
//! [[group]]
//! name = "2024"
//! dir = "data_2024"
//! scans = ["STDMX_OFF.csv", { path = "STDMX_2.2.csv", label = "STDMX ABS 2.2" }]
//! ```
//!
//! Relative paths resolve against the manifest's directory (then the
//! group's `dir`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::domain::{InitialGuess, ReferenceBasis, ReferenceEfficiency, ScanJob, ZeroErrorPolicy};
use crate::error::ScanError;
use crate::fit::FitOptions;
use crate::io::naming::{mixture_from_path, scan_stem};

/// Root of an `hvscan.toml` file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub fit: FitSection,

    #[serde(default)]
    pub extract: ExtractSection,

    #[serde(default)]
    pub output: OutputSection,

    #[serde(default, rename = "group")]
    pub groups: Vec<GroupSection>,

    /// Mixture tag (file-name prefix) to legend name.
    #[serde(default)]
    pub mixtures: BTreeMap<String, String>,
}

/// Optimizer overrides; unset keys keep the built-in defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FitSection {
    pub initial_guess: Option<InitialGuess>,
    pub max_iterations: Option<usize>,
    pub tolerance: Option<f64>,
    pub zero_error: Option<ZeroErrorPolicy>,
    pub error_floor: Option<f64>,
    pub hv50_window: Option<f64>,
    pub retry_from_data: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractSection {
    /// Fraction (`0.95`) or explicit percentage (`"95%"`).
    pub reference: Option<ReferenceEfficiency>,
    pub basis: Option<ReferenceBasis>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputSection {
    pub results_csv: Option<PathBuf>,
    pub curves_json: Option<PathBuf>,
    /// Directory for SVG comparison charts.
    pub svg_dir: Option<PathBuf>,
    /// Print the ASCII plot after the summary.
    pub ascii_plot: Option<bool>,
}

/// One dataset group (a year, a campaign, a mixture family, ...).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupSection {
    pub name: String,
    /// Base directory for this group's scans.
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub scans: Vec<ScanEntry>,
}

/// A scan given as a bare path or as a table.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ScanEntry {
    Path(PathBuf),
    Detailed(ScanTable),
}

/// `{ path, label, wp_file, legend }`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanTable {
    pub path: PathBuf,
    pub label: Option<String>,
    pub wp_file: Option<PathBuf>,
    pub legend: Option<String>,
}

impl Manifest {
    /// Load a manifest from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ScanError> {
        let content = std::fs::read_to_string(path).map_err(|source| ScanError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Parse a manifest from TOML text; `path` is only used in error messages.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ScanError> {
        let manifest: Manifest = toml::from_str(content).map_err(|e| ScanError::Manifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if manifest.groups.iter().all(|g| g.scans.is_empty()) {
            return Err(ScanError::Manifest {
                path: path.to_path_buf(),
                message: "no scans listed (add a [[group]] with `scans = [...]`)".to_string(),
            });
        }
        Ok(manifest)
    }

    /// Built-in fit options overridden by the `[fit]` section.
    pub fn fit_options(&self) -> FitOptions {
        let mut opts = FitOptions::default();
        let f = &self.fit;
        if let Some(g) = f.initial_guess {
            opts.initial_guess = g;
        }
        if let Some(v) = f.max_iterations {
            opts.max_iterations = v;
        }
        if let Some(v) = f.tolerance {
            opts.tolerance = v;
        }
        if let Some(v) = f.zero_error {
            opts.zero_error = v;
        }
        if let Some(v) = f.error_floor {
            opts.error_floor = v;
        }
        if let Some(v) = f.hv50_window {
            opts.hv50_window = v;
        }
        if let Some(v) = f.retry_from_data {
            opts.retry_from_data = v;
        }
        opts
    }

    pub fn reference(&self) -> ReferenceEfficiency {
        self.extract.reference.unwrap_or_default()
    }

    /// Display name for the mixture tag in `path`'s file name, if declared.
    pub fn mixture_name(&self, path: &Path) -> Option<String> {
        let tag = mixture_from_path(path)?;
        self.mixtures.get(&tag).cloned()
    }

    pub fn basis(&self) -> ReferenceBasis {
        self.extract.basis.unwrap_or(ReferenceBasis::Relative)
    }

    /// Flatten all groups into jobs, in declaration order.
    ///
    /// `base` is the manifest's directory.
    pub fn jobs(&self, base: &Path) -> Vec<ScanJob> {
        let mut jobs = Vec::new();
        for group in &self.groups {
            let dir = match &group.dir {
                Some(d) => base.join(d),
                None => base.to_path_buf(),
            };
            for entry in &group.scans {
                let (path, label, wp_file, legend) = match entry {
                    ScanEntry::Path(p) => (p, None, None, None),
                    ScanEntry::Detailed(t) => (&t.path, t.label.clone(), t.wp_file.as_ref(), t.legend.clone()),
                };
                let path = dir.join(path);
                jobs.push(ScanJob {
                    label: label.unwrap_or_else(|| scan_stem(&path).to_string()),
                    group: Some(group.name.clone()),
                    wp_file: wp_file.map(|w| dir.join(w)),
                    legend,
                    mixture_name: self.mixture_name(&path),
                    path,
                });
            }
        }
        jobs
    }
}
