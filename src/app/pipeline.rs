//! Shared per-scan pipeline used by every command.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! ingest -> fit -> working point -> background/metadata
//!
//! Scans are independent, so a batch fans out over rayon and collects in
//! input order. A failing scan is recorded and never stops the others.

use log::{info, warn};
use rayon::prelude::*;

use crate::domain::{
    ReferenceBasis, ReferenceEfficiency, ScanAnalysis, ScanFailure, ScanJob, ScanMeta,
};
use crate::error::ScanError;
use crate::fit::{FitOptions, fit_sigmoid};
use crate::io::{attenuation_from_path, default_wp_path, load_background, load_scan, mixture_from_path};
use crate::wp::extract_with_basis;

/// Settings shared by every scan in a run.
#[derive(Debug, Clone, Default)]
pub struct BatchSettings {
    pub fit: FitOptions,
    pub reference: ReferenceEfficiency,
    pub basis: ReferenceBasis,
}

/// Successful analyses and failures, each in input order.
#[derive(Debug, Default)]
pub struct BatchOutput {
    pub analyses: Vec<ScanAnalysis>,
    pub failures: Vec<ScanFailure>,
}

impl BatchOutput {
    pub fn total(&self) -> usize {
        self.analyses.len() + self.failures.len()
    }
}

/// Run every job; failures are logged and collected.
pub fn run_batch(jobs: Vec<ScanJob>, settings: &BatchSettings) -> BatchOutput {
    let results: Vec<(ScanJob, Result<ScanAnalysis, ScanError>)> = jobs
        .into_par_iter()
        .map(|job| {
            let result = analyze_scan(&job, settings);
            (job, result)
        })
        .collect();

    let mut out = BatchOutput::default();
    for (job, result) in results {
        match result {
            Ok(analysis) => out.analyses.push(analysis),
            Err(error) => {
                warn!("{} ({}): {error}", job.label, job.path.display());
                out.failures.push(ScanFailure { job, error });
            }
        }
    }
    info!(
        "batch finished: {} of {} scan(s) analyzed",
        out.analyses.len(),
        out.total()
    );
    out
}

/// Ingest, fit and extract one scan.
pub fn analyze_scan(job: &ScanJob, settings: &BatchSettings) -> Result<ScanAnalysis, ScanError> {
    let ingest = load_scan(&job.path, &job.label)?;
    let fit = fit_sigmoid(&ingest.sample, &settings.fit)?;
    let working_point = extract_with_basis(&fit, settings.reference, settings.basis)?;

    let wp_path = job.wp_file.clone().unwrap_or_else(|| default_wp_path(&job.path));
    let background = load_background(&wp_path);

    info!(
        "{}: Emax = {:.4}, HV50 = {:.1} V, WP = {:.1} V ({} iteration(s))",
        job.label, fit.model.emax, fit.model.hv50, working_point.wp_voltage, fit.quality.iterations
    );

    Ok(ScanAnalysis {
        meta: ScanMeta {
            label: job.label.clone(),
            source: job.path.clone(),
            group: job.group.clone(),
            mixture: mixture_from_path(&job.path),
            mixture_name: job.mixture_name.clone(),
            attenuation: attenuation_from_path(&job.path),
            legend: job.legend.clone(),
        },
        sample: ingest.sample,
        fit,
        working_point,
        background,
    })
}
