//! Synthetic efficiency scans for demos and tests.
//!
//! Each step counts `triggers` events; the observed efficiency is the model
//! efficiency plus Gaussian noise with the binomial width
//! `sqrt(e (1 - e) / triggers)`, clipped to `[0, 1]`. The reported error uses
//! the same width, floored at `1 / triggers` so that saturated steps keep a
//! usable weight.

use std::path::Path;

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{ScanPoint, ScanSample, SigmoidModel};
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct SyntheticScan {
    pub model: SigmoidModel,
    pub v_min: f64,
    pub v_max: f64,
    pub steps: usize,
    /// Events per voltage step.
    pub triggers: u32,
    pub seed: u64,
}

impl Default for SyntheticScan {
    fn default() -> Self {
        Self {
            model: SigmoidModel::new(0.96, 0.011, 6750.0),
            v_min: 6000.0,
            v_max: 7600.0,
            steps: 12,
            triggers: 2000,
            seed: 42,
        }
    }
}

/// Generate a scan; deterministic for a given `seed`.
pub fn generate_scan(spec: &SyntheticScan, label: &str) -> Result<ScanSample, AppError> {
    if spec.steps < 2 {
        return Err(AppError::new(2, "A synthetic scan needs at least 2 steps."));
    }
    if !(spec.v_min.is_finite() && spec.v_max.is_finite() && spec.v_max > spec.v_min) {
        return Err(AppError::new(2, "Invalid voltage range for synthetic scan."));
    }
    if spec.triggers == 0 {
        return Err(AppError::new(2, "Trigger count must be > 0."));
    }

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let n = spec.triggers as f64;
    let floor = 1.0 / n;

    let mut points = Vec::with_capacity(spec.steps);
    for i in 0..spec.steps {
        let u = i as f64 / (spec.steps - 1) as f64;
        let voltage = spec.v_min + u * (spec.v_max - spec.v_min);
        let truth = spec.model.efficiency(voltage).clamp(0.0, 1.0);
        let sigma = (truth * (1.0 - truth) / n).sqrt();

        let efficiency = if sigma > 0.0 {
            let noise = Normal::new(0.0, sigma)
                .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;
            (truth + noise.sample(&mut rng)).clamp(0.0, 1.0)
        } else {
            truth
        };
        let error = (efficiency * (1.0 - efficiency) / n).sqrt().max(floor);
        points.push(ScanPoint::new(voltage, efficiency, error));
    }

    Ok(ScanSample::new(label, points))
}

/// Write a scan in the ingest format (`HV_top,efficiency,eff_error`).
pub fn write_scan_csv(path: &Path, sample: &ScanSample) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create scan CSV '{}': {e}", path.display())))?;
    let write_err = |e: csv::Error| AppError::new(2, format!("Failed to write scan CSV '{}': {e}", path.display()));

    writer
        .write_record(["HV_top", "efficiency", "eff_error"])
        .map_err(write_err)?;
    for p in &sample.points {
        writer
            .write_record([
                format!("{}", p.voltage),
                format!("{:.6}", p.efficiency),
                format!("{:.6}", p.efficiency_error),
            ])
            .map_err(write_err)?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush scan CSV '{}': {e}", path.display())))
}

/// Write a companion working-point file with the background columns.
pub fn write_wp_csv(path: &Path, noise_gamma_rate: f64, gamma_cs: f64) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create WP CSV '{}': {e}", path.display())))?;
    let write_err = |e: csv::Error| AppError::new(2, format!("Failed to write WP CSV '{}': {e}", path.display()));

    writer
        .write_record(["noiseGammaRate", "gamma_CS"])
        .map_err(write_err)?;
    writer
        .write_record([noise_gamma_rate.to_string(), gamma_cs.to_string()])
        .map_err(write_err)?;
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush WP CSV '{}': {e}", path.display())))
}
