//! Derived operating quantities for one fitted scan.
//!
//! Two voltages are computed and they are deliberately independent:
//!
//! - `hv_ref`: where the curve reaches a caller-chosen reference efficiency
//!   (relative to the plateau by default)
//! - `wp_voltage`: the operating policy, 95% of plateau plus a 150 V margin,
//!   whatever reference the caller asked for
//!
//! The WP error is reported twice. `wp_voltage_error` is the linear sum
//! `ln(19)/λ² · σλ + σHV50` used by the detector group; `wp_voltage_error_cov`
//! propagates the full covariance to first order (it includes the λ–HV50
//! correlation, which the linear sum ignores).

use crate::domain::{FitResult, ReferenceBasis, ReferenceEfficiency, SigmoidModel, WorkingPoint};
use crate::error::ScanError;

/// Plateau fraction that defines the working point.
pub const WP_REFERENCE: f64 = 0.95;

/// Safety margin added above the 95% voltage (V).
pub const WP_MARGIN_V: f64 = 150.0;

/// Slopes at or below this magnitude make the inversions meaningless.
pub const DEGENERATE_LAMBDA: f64 = 1e-12;

/// Working point with the reference taken relative to the plateau.
pub fn extract(fit: &FitResult, reference: ReferenceEfficiency) -> Result<WorkingPoint, ScanError> {
    extract_with_basis(fit, reference, ReferenceBasis::Relative)
}

/// Working point with an explicit reference basis.
///
/// With `ReferenceBasis::Absolute` the reference is an efficiency on the
/// measured scale and must lie below the fitted plateau.
pub fn extract_with_basis(
    fit: &FitResult,
    reference: ReferenceEfficiency,
    basis: ReferenceBasis,
) -> Result<WorkingPoint, ScanError> {
    let model = fit.model;
    let lambda = model.lambda;
    if !lambda.is_finite() || lambda.abs() <= DEGENERATE_LAMBDA {
        return Err(ScanError::DegenerateFit { lambda });
    }

    let r = reference.fraction();
    let hv_ref = match basis {
        ReferenceBasis::Relative => model.voltage_at_relative(r),
        ReferenceBasis::Absolute => {
            if !(model.emax > r) {
                return Err(ScanError::ReferenceUnreachable {
                    reference: r,
                    emax: model.emax,
                });
            }
            model.voltage_at_efficiency(r)
        }
    }
    .ok_or(ScanError::DegenerateFit { lambda })?;

    let wp_voltage = working_point_voltage(&model).ok_or(ScanError::DegenerateFit { lambda })?;

    let (wp_voltage_error, wp_voltage_error_cov) = wp_errors(fit);

    Ok(WorkingPoint {
        reference,
        basis,
        hv_ref,
        wp_voltage,
        wp_voltage_error,
        wp_voltage_error_cov,
        eff_at_wp: model.efficiency(wp_voltage),
    })
}

/// `hv50 - ln(1/0.95 - 1)/λ + 150`.
pub fn working_point_voltage(model: &SigmoidModel) -> Option<f64> {
    model.voltage_at_relative(WP_REFERENCE).map(|v| v + WP_MARGIN_V)
}

fn wp_errors(fit: &FitResult) -> (f64, f64) {
    let lambda = fit.model.lambda;
    // d(wp)/d(lambda) = -ln(19) / lambda²; d(wp)/d(hv50) = 1.
    let k = (1.0 / WP_REFERENCE - 1.0).ln().abs() / (lambda * lambda);

    let linear = k * fit.errors.lambda + fit.errors.hv50;

    let c = &fit.covariance;
    let var = k * k * c[1][1] - 2.0 * k * c[1][2] + c[2][2];
    (linear, var.max(0.0).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitQuality, ParamErrors, VoltageDomain};

    fn fit_with(model: SigmoidModel, errors: ParamErrors, cov_lh: f64) -> FitResult {
        let mut covariance = [[0.0; 3]; 3];
        covariance[0][0] = errors.emax * errors.emax;
        covariance[1][1] = errors.lambda * errors.lambda;
        covariance[2][2] = errors.hv50 * errors.hv50;
        covariance[1][2] = cov_lh;
        covariance[2][1] = cov_lh;
        FitResult {
            model,
            errors,
            covariance,
            domain: VoltageDomain { min: 6000.0, max: 7500.0 },
            quality: FitQuality {
                chi2: 1.0,
                ndf: 1,
                iterations: 10,
            },
            used: 4,
            excluded: 0,
        }
    }

    fn typical() -> FitResult {
        fit_with(
            SigmoidModel::new(0.95, 0.01, 6600.0),
            ParamErrors {
                emax: 0.01,
                lambda: 0.001,
                hv50: 10.0,
            },
            0.0,
        )
    }

    #[test]
    fn hv_ref_round_trips_through_the_model() {
        let fit = typical();
        for r in [0.05, 0.5, 0.9, 0.95, 0.99] {
            let wp = extract(&fit, ReferenceEfficiency::from_fraction(r).unwrap()).unwrap();
            let back = fit.model.relative_efficiency(wp.hv_ref);
            assert!((back - r).abs() < 1e-9, "r={r} back={back}");
        }
    }

    #[test]
    fn absolute_basis_inverts_measured_scale() {
        let fit = typical();
        let r = ReferenceEfficiency::from_fraction(0.9).unwrap();
        let wp = extract_with_basis(&fit, r, ReferenceBasis::Absolute).unwrap();
        assert!((fit.model.efficiency(wp.hv_ref) - 0.9).abs() < 1e-9);

        let r = ReferenceEfficiency::from_fraction(0.96).unwrap();
        let err = extract_with_basis(&fit, r, ReferenceBasis::Absolute).unwrap_err();
        assert!(matches!(err, ScanError::ReferenceUnreachable { .. }), "{err}");
    }

    #[test]
    fn working_point_follows_fixed_policy() {
        let fit = typical();
        let wp = extract(&fit, ReferenceEfficiency::from_fraction(0.5).unwrap()).unwrap();

        let expected = 6600.0 + 19f64.ln() / 0.01 + 150.0;
        assert!((wp.wp_voltage - expected).abs() < 1e-9);
        // Independent of the caller's reference.
        assert!((wp.hv_ref - 6600.0).abs() < 1e-9);

        let linear = 19f64.ln() / (0.01 * 0.01) * 0.001 + 10.0;
        assert!((wp.wp_voltage_error - linear).abs() < 1e-9);
        assert!((wp.eff_at_wp - fit.model.efficiency(wp.wp_voltage)).abs() < 1e-15);
        assert!(wp.eff_at_wp > 0.95 * 0.95 && wp.eff_at_wp < 0.95);
    }

    #[test]
    fn covariance_error_uses_correlation() {
        let errors = ParamErrors {
            emax: 0.01,
            lambda: 0.001,
            hv50: 10.0,
        };
        let uncorrelated = extract(&fit_with(typical().model, errors, 0.0), ReferenceEfficiency::default()).unwrap();
        let k = 19f64.ln() / 1e-4;
        let quad = ((k * 0.001).powi(2) + 100.0).sqrt();
        assert!((uncorrelated.wp_voltage_error_cov - quad).abs() < 1e-9);
        assert!(uncorrelated.wp_voltage_error_cov <= uncorrelated.wp_voltage_error);

        // Positive λ–HV50 correlation shrinks the WP error (d/dλ is negative).
        let correlated = extract(&fit_with(typical().model, errors, 0.005), ReferenceEfficiency::default()).unwrap();
        assert!(correlated.wp_voltage_error_cov < uncorrelated.wp_voltage_error_cov);
        assert_eq!(correlated.wp_voltage_error, uncorrelated.wp_voltage_error);
    }

    #[test]
    fn zero_or_tiny_slope_is_degenerate() {
        let errors = typical().errors;
        for lambda in [0.0, 1e-13, -1e-13, f64::NAN, f64::INFINITY] {
            let fit = fit_with(SigmoidModel::new(0.95, lambda, 6600.0), errors, 0.0);
            let err = extract(&fit, ReferenceEfficiency::default()).unwrap_err();
            assert!(matches!(err, ScanError::DegenerateFit { .. }), "lambda={lambda}: {err}");
        }
    }

    #[test]
    fn extraction_is_idempotent() {
        let fit = typical();
        let r = ReferenceEfficiency::from_fraction(0.93).unwrap();
        let a = extract(&fit, r).unwrap();
        let b = extract(&fit, r).unwrap();
        assert_eq!(a.hv_ref.to_bits(), b.hv_ref.to_bits());
        assert_eq!(a.wp_voltage.to_bits(), b.wp_voltage.to_bits());
        assert_eq!(a.wp_voltage_error.to_bits(), b.wp_voltage_error.to_bits());
        assert_eq!(a.eff_at_wp.to_bits(), b.eff_at_wp.to_bits());
    }
}
