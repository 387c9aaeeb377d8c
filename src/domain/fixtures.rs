//! Hand-built analyses for unit tests of the presentation layers.

use std::path::PathBuf;

use crate::domain::{
    Attenuation, BackgroundRate, FitQuality, FitResult, ParamErrors, ReferenceBasis, ReferenceEfficiency,
    ScanAnalysis, ScanMeta, ScanPoint, ScanSample, SigmoidModel, VoltageDomain, WorkingPoint,
};

pub fn analysis(label: &str, mixture: &str, emax: f64, hv50: f64, background: BackgroundRate) -> ScanAnalysis {
    let model = SigmoidModel::new(emax, 0.01, hv50);
    let points: Vec<ScanPoint> = (0..6)
        .map(|i| {
            let v = 6000.0 + 300.0 * i as f64;
            ScanPoint::new(v, model.efficiency(v), 0.01)
        })
        .collect();
    let wp_voltage = hv50 + 19f64.ln() / 0.01 + 150.0;
    ScanAnalysis {
        meta: ScanMeta {
            label: label.to_string(),
            source: PathBuf::from(format!("{label}.csv")),
            group: Some("2024".to_string()),
            mixture: Some(mixture.to_string()),
            mixture_name: None,
            attenuation: Some(Attenuation::Off),
            legend: None,
        },
        sample: ScanSample::new(label, points),
        fit: FitResult {
            model,
            errors: ParamErrors {
                emax: 0.002,
                lambda: 0.0005,
                hv50: 5.0,
            },
            covariance: [[4e-6, 0.0, 0.0], [0.0, 2.5e-7, 0.0], [0.0, 0.0, 25.0]],
            domain: VoltageDomain { min: 6000.0, max: 7500.0 },
            quality: FitQuality {
                chi2: 2.5,
                ndf: 3,
                iterations: 7,
            },
            used: 6,
            excluded: 0,
        },
        working_point: WorkingPoint {
            reference: ReferenceEfficiency::NINETY_FIVE,
            basis: ReferenceBasis::Relative,
            hv_ref: wp_voltage - 150.0,
            wp_voltage,
            wp_voltage_error: 20.0,
            wp_voltage_error_cov: 16.0,
            eff_at_wp: model.efficiency(wp_voltage),
        },
        background,
    }
}
