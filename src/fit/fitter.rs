//! Weighted sigmoid fit for a single scan.
//!
//! Given:
//! - voltages `v_i`
//! - observed efficiencies `e_i`
//! - efficiency errors `σ_i`
//! - an initial guess `(emax0, lambda0, hv50_0)`
//!
//! we minimize
//!
//! ```text
//! χ² = Σ ((efficiency(v_i) - e_i) / σ_i)²
//! ```
//!
//! with Levenberg–Marquardt.
//!
//! Implementation notes:
//! - The optimizer works in a dimensionless voltage `x = (v - v_mid) / h`
//!   (`h` = half the sampled span), where the parameters `(emax, λh, (hv50 - v_mid)/h)`
//!   are all O(1). Results are mapped back to volts at the end, covariance included.
//! - Damping is Marquardt-scaled (`μ · diag(JᵀWJ)`), and each damped step is solved
//!   as an augmented least-squares problem with the SVD solver.
//! - Parameter errors come from `(JᵀWJ)⁻¹` at the solution (errors are taken
//!   as known, so the covariance is not rescaled by χ²/ndf).

use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector, Matrix3};

use crate::domain::{
    FitQuality, FitResult, InitialGuess, ParamErrors, ScanPoint, ScanSample, SigmoidModel, VoltageDomain,
    ZeroErrorPolicy,
};
use crate::error::ScanError;
use crate::fit::seed::guess_from_data;
use crate::math::{invert_normal_matrix, solve_least_squares};

/// Number of free model parameters; also the minimum sample count.
pub const MIN_POINTS: usize = 3;

const MU_START: f64 = 1e-3;
const MU_MIN: f64 = 1e-15;
const MU_MAX: f64 = 1e16;
/// Below this χ² the model reproduces the data to rounding precision.
const CHI2_FLOOR: f64 = 1e-24;

/// Fitting options that affect how each scan is calibrated.
#[derive(Debug, Clone)]
pub struct FitOptions {
    /// Starting point for the optimizer.
    pub initial_guess: InitialGuess,
    /// Upper bound on optimizer iterations (accepted + rejected steps).
    pub max_iterations: usize,
    /// Relative χ² change below which the fit is considered converged.
    ///
    /// A relative parameter step below `sqrt(tolerance)` also counts.
    pub tolerance: f64,
    /// Treatment of samples whose error is zero, negative or non-finite.
    pub zero_error: ZeroErrorPolicy,
    /// Error floor used by `ZeroErrorPolicy::Floor`.
    pub error_floor: f64,
    /// Maximum distance of `hv50` outside the sampled range, in units of the span.
    pub hv50_window: f64,
    /// Retry from a data-driven guess when the configured guess fails.
    pub retry_from_data: bool,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            initial_guess: InitialGuess::default(),
            max_iterations: 200,
            tolerance: 1e-10,
            zero_error: ZeroErrorPolicy::Exclude,
            error_floor: 1e-3,
            hv50_window: 1.0,
            retry_from_data: true,
        }
    }
}

/// A sample that enters the weighted sum.
#[derive(Debug, Clone, Copy)]
struct WeightedPoint {
    /// Dimensionless voltage.
    x: f64,
    y: f64,
    /// `1 / σ`.
    sqrt_w: f64,
}

/// Voltage normalization `x = (v - center) / scale`.
#[derive(Debug, Clone, Copy)]
struct Scaling {
    center: f64,
    scale: f64,
}

impl Scaling {
    fn from_domain(domain: VoltageDomain) -> Self {
        Self {
            center: 0.5 * (domain.min + domain.max),
            scale: 0.5 * domain.span(),
        }
    }

    fn to_internal(self, m: SigmoidModel) -> SigmoidModel {
        SigmoidModel {
            emax: m.emax,
            lambda: m.lambda * self.scale,
            hv50: (m.hv50 - self.center) / self.scale,
        }
    }

    fn to_external(self, q: SigmoidModel) -> SigmoidModel {
        SigmoidModel {
            emax: q.emax,
            lambda: q.lambda / self.scale,
            hv50: q.hv50 * self.scale + self.center,
        }
    }

    /// `∂external/∂internal` (diagonal).
    fn jacobian_diag(self) -> [f64; 3] {
        [1.0, 1.0 / self.scale, self.scale]
    }
}

/// Outcome of one optimizer run in internal coordinates.
#[derive(Debug, Clone)]
struct Solution {
    params: SigmoidModel,
    chi2: f64,
    iterations: usize,
    normal: Matrix3<f64>,
    used: usize,
}

/// Fit the sigmoid to one scan.
///
/// Fails with `InsufficientData` (before any optimizer call) when fewer than
/// three samples survive the zero-error policy or all voltages coincide, and
/// with `FitConvergence` when no trustworthy minimum is found.
pub fn fit_sigmoid(sample: &ScanSample, opts: &FitOptions) -> Result<FitResult, ScanError> {
    let (selected, excluded) = select_points(&sample.points, opts);
    if excluded > 0 {
        debug!(
            "{}: {excluded} sample(s) excluded from the weighted sum",
            sample.label
        );
    }

    if selected.len() < MIN_POINTS {
        return Err(ScanError::InsufficientData {
            valid: selected.len(),
            required: MIN_POINTS,
            detail: format!("{excluded} sample(s) excluded for invalid values or errors"),
        });
    }

    let domain = VoltageDomain::from_voltages(selected.iter().map(|p| p.voltage)).ok_or_else(|| {
        ScanError::InsufficientData {
            valid: 0,
            required: MIN_POINTS,
            detail: "no finite voltages".to_string(),
        }
    })?;
    if !(domain.span() > 0.0) {
        return Err(ScanError::InsufficientData {
            valid: selected.len(),
            required: MIN_POINTS,
            detail: format!("all samples at the same voltage ({})", domain.min),
        });
    }

    let scaling = Scaling::from_domain(domain);
    let points: Vec<WeightedPoint> = selected
        .iter()
        .map(|p| WeightedPoint {
            x: (p.voltage - scaling.center) / scaling.scale,
            y: p.efficiency,
            sqrt_w: 1.0 / p.efficiency_error,
        })
        .collect();

    let start = scaling.to_internal(opts.initial_guess.into());
    let first = minimize(&points, start, opts).and_then(|s| finish(s, scaling, domain, opts));

    let result = match first {
        Ok(fit) => Ok(fit),
        Err(err) if opts.retry_from_data => match guess_from_data(&selected) {
            Some(guess) => {
                info!(
                    "{}: configured guess failed ({err}); retrying from data-driven guess {guess:?}",
                    sample.label
                );
                let start = scaling.to_internal(guess.into());
                minimize(&points, start, opts)
                    .and_then(|s| finish(s, scaling, domain, opts))
                    .map_err(|_| err)
            }
            None => Err(err),
        },
        Err(err) => Err(err),
    };

    result.map(|mut fit| {
        fit.excluded = excluded;
        fit
    })
}

/// Apply the zero-error policy and drop non-finite samples.
fn select_points(points: &[ScanPoint], opts: &FitOptions) -> (Vec<ScanPoint>, usize) {
    let floor = opts.error_floor.abs();
    let mut kept = Vec::with_capacity(points.len());
    for p in points {
        if !(p.voltage.is_finite() && p.efficiency.is_finite()) {
            continue;
        }
        let err = p.efficiency_error;
        let usable = err.is_finite() && err > 0.0;
        match opts.zero_error {
            ZeroErrorPolicy::Exclude if usable => kept.push(*p),
            ZeroErrorPolicy::Exclude => {}
            ZeroErrorPolicy::Floor if usable => kept.push(*p),
            ZeroErrorPolicy::Floor if floor > 0.0 => kept.push(ScanPoint {
                efficiency_error: floor,
                ..*p
            }),
            ZeroErrorPolicy::Floor => {}
        }
    }
    let excluded = points.len() - kept.len();
    (kept, excluded)
}

/// Levenberg–Marquardt in internal coordinates.
fn minimize(points: &[WeightedPoint], start: SigmoidModel, opts: &FitOptions) -> Result<Solution, ScanError> {
    let n = points.len();
    let mut q = start;
    let mut chi2 = chi_square(points, &q);
    if !chi2.is_finite() {
        return Err(ScanError::FitConvergence {
            iterations: 0,
            reason: "non-finite χ² at the initial guess".to_string(),
        });
    }

    let mut mu = MU_START;
    let mut iterations = 0usize;
    let tol = opts.tolerance.max(f64::EPSILON);
    let step_tol = tol.sqrt();

    let (mut jac, mut resid) = weighted_system(points, &q);
    let mut normal = normal_matrix(&jac);

    loop {
        if chi2 <= CHI2_FLOOR {
            break;
        }
        if iterations >= opts.max_iterations {
            return Err(ScanError::FitConvergence {
                iterations,
                reason: format!("iteration budget exhausted (χ² = {chi2:.6e})"),
            });
        }
        iterations += 1;

        // Augmented system: [J; sqrt(μ D)] δ = [r; 0].
        let mut aug = DMatrix::<f64>::zeros(n + 3, 3);
        let mut rhs = DVector::<f64>::zeros(n + 3);
        aug.rows_mut(0, n).copy_from(&jac);
        rhs.rows_mut(0, n).copy_from(&resid);
        for j in 0..3 {
            let d = normal[(j, j)].max(1e-12);
            aug[(n + j, j)] = (mu * d).sqrt();
        }

        let Some(delta) = solve_least_squares(&aug, &rhs) else {
            mu *= 10.0;
            if mu > MU_MAX {
                return Err(ScanError::FitConvergence {
                    iterations,
                    reason: "damped step could not be solved".to_string(),
                });
            }
            continue;
        };

        let trial = SigmoidModel {
            emax: q.emax + delta[0],
            lambda: q.lambda + delta[1],
            hv50: q.hv50 + delta[2],
        };
        let trial_chi2 = chi_square(points, &trial);

        if trial_chi2.is_finite() && trial_chi2 < chi2 {
            let rel_chi2 = (chi2 - trial_chi2) / chi2;
            let rel_step = [
                delta[0] / (q.emax.abs() + step_tol),
                delta[1] / (q.lambda.abs() + step_tol),
                delta[2] / (q.hv50.abs() + step_tol),
            ]
            .iter()
            .fold(0.0_f64, |acc, v| acc.max(v.abs()));

            q = trial;
            chi2 = trial_chi2;
            mu = (mu / 10.0).max(MU_MIN);
            (jac, resid) = weighted_system(points, &q);
            normal = normal_matrix(&jac);

            if rel_chi2 <= tol || (rel_step <= step_tol && rel_chi2 <= step_tol) {
                break;
            }
        } else {
            mu *= 10.0;
            if mu > MU_MAX {
                // No downhill direction left at machine precision: stationary point.
                debug!("damping saturated after {iterations} iteration(s); treating as converged");
                break;
            }
        }
    }

    Ok(Solution {
        params: q,
        chi2,
        iterations,
        normal,
        used: n,
    })
}

/// Validate the solution and map it back to volts.
fn finish(
    solution: Solution,
    scaling: Scaling,
    domain: VoltageDomain,
    opts: &FitOptions,
) -> Result<FitResult, ScanError> {
    let iterations = solution.iterations;
    let model = scaling.to_external(solution.params);

    if ![model.emax, model.lambda, model.hv50].iter().all(|v| v.is_finite()) {
        return Err(ScanError::FitConvergence {
            iterations,
            reason: "non-finite parameters".to_string(),
        });
    }

    let window = opts.hv50_window.max(0.0) * domain.span();
    if model.hv50 < domain.min - window || model.hv50 > domain.max + window {
        return Err(ScanError::FitConvergence {
            iterations,
            reason: format!(
                "inflection HV50 = {:.1} lies outside the sampled range [{:.1}, {:.1}]",
                model.hv50, domain.min, domain.max
            ),
        });
    }

    let cov_internal = invert_normal_matrix(&solution.normal).ok_or_else(|| ScanError::FitConvergence {
        iterations,
        reason: "singular normal matrix (parameters not constrained by the data)".to_string(),
    })?;

    let d = scaling.jacobian_diag();
    let mut covariance = [[0.0; 3]; 3];
    for (i, row) in covariance.iter_mut().enumerate() {
        for (j, c) in row.iter_mut().enumerate() {
            *c = d[i] * cov_internal[(i, j)] * d[j];
        }
    }

    let errors = ParamErrors {
        emax: covariance[0][0].sqrt(),
        lambda: covariance[1][1].sqrt(),
        hv50: covariance[2][2].sqrt(),
    };
    if !(errors.hv50 <= domain.span()) {
        return Err(ScanError::FitConvergence {
            iterations,
            reason: format!(
                "inflection not constrained by the data (σ(HV50) = {:.3e} over a {:.1} V scan)",
                errors.hv50,
                domain.span()
            ),
        });
    }

    if model.lambda < 0.0 {
        warn!("fitted slope is negative (lambda = {:.3e}); the scan is falling, not rising", model.lambda);
    }

    let used = solution.used;
    Ok(FitResult {
        model,
        errors,
        covariance,
        domain,
        quality: FitQuality {
            chi2: solution.chi2,
            ndf: used.saturating_sub(MIN_POINTS),
            iterations,
        },
        used,
        excluded: 0,
    })
}

fn chi_square(points: &[WeightedPoint], q: &SigmoidModel) -> f64 {
    points
        .iter()
        .map(|p| {
            let r = (p.y - q.efficiency(p.x)) * p.sqrt_w;
            r * r
        })
        .sum()
}

/// Weighted Jacobian rows and weighted residuals `(e_i - f(x_i)) / σ_i`.
fn weighted_system(points: &[WeightedPoint], q: &SigmoidModel) -> (DMatrix<f64>, DVector<f64>) {
    let n = points.len();
    let mut jac = DMatrix::<f64>::zeros(n, 3);
    let mut resid = DVector::<f64>::zeros(n);
    for (i, p) in points.iter().enumerate() {
        let g = q.gradient(p.x);
        for j in 0..3 {
            jac[(i, j)] = g[j] * p.sqrt_w;
        }
        resid[i] = (p.y - q.efficiency(p.x)) * p.sqrt_w;
    }
    (jac, resid)
}

fn normal_matrix(jac: &DMatrix<f64>) -> Matrix3<f64> {
    let jtj = jac.transpose() * jac;
    Matrix3::from_fn(|i, j| jtj[(i, j)])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(points: &[(f64, f64, f64)]) -> ScanSample {
        ScanSample::new(
            "test",
            points.iter().map(|&(v, e, s)| ScanPoint::new(v, e, s)).collect(),
        )
    }

    #[test]
    fn four_point_scan_converges_near_expected_inflection() {
        let s = sample(&[
            (6000.0, 0.01, 0.01),
            (6500.0, 0.5, 0.02),
            (7000.0, 0.89, 0.01),
            (7500.0, 0.95, 0.01),
        ]);
        let opts = FitOptions {
            retry_from_data: false,
            ..FitOptions::default()
        };
        let fit = fit_sigmoid(&s, &opts).unwrap();

        assert!((fit.model.emax - 0.95).abs() < 0.05, "{:?}", fit.model);
        assert!(fit.model.hv50 > 6450.0 && fit.model.hv50 < 6800.0, "{:?}", fit.model);
        assert!(fit.model.lambda > 0.0);
        assert_eq!(fit.used, 4);
        assert_eq!(fit.quality.ndf, 1);
        assert_eq!(fit.domain, VoltageDomain { min: 6000.0, max: 7500.0 });
        assert!(fit.errors.emax > 0.0 && fit.errors.lambda > 0.0 && fit.errors.hv50 > 0.0);
    }

    #[test]
    fn noiseless_scan_recovers_generating_parameters() {
        let truth = SigmoidModel::new(0.97, 0.0085, 6720.0);
        let points: Vec<(f64, f64, f64)> = (0..12)
            .map(|i| {
                let v = 6100.0 + 110.0 * i as f64;
                (v, truth.efficiency(v), 0.01)
            })
            .collect();
        let fit = fit_sigmoid(&sample(&points), &FitOptions::default()).unwrap();

        assert!((fit.model.emax - truth.emax).abs() < 1e-6, "{:?}", fit.model);
        assert!((fit.model.lambda - truth.lambda).abs() / truth.lambda < 1e-5, "{:?}", fit.model);
        assert!((fit.model.hv50 - truth.hv50).abs() < 1e-3, "{:?}", fit.model);
        assert!(fit.quality.chi2 < 1e-8);
    }

    #[test]
    fn fewer_than_three_points_fail_before_optimizing() {
        let s = sample(&[(6000.0, 0.1, 0.01), (7000.0, 0.9, 0.01)]);
        // A zero iteration budget would surface as FitConvergence if the optimizer ran.
        let opts = FitOptions {
            max_iterations: 0,
            ..FitOptions::default()
        };
        let err = fit_sigmoid(&s, &opts).unwrap_err();
        assert!(matches!(err, ScanError::InsufficientData { valid: 2, .. }), "{err}");
    }

    #[test]
    fn zero_errors_are_excluded_or_floored() {
        let s = sample(&[
            (6000.0, 0.02, 0.01),
            (6400.0, 0.0, 0.0),
            (6600.0, 0.45, 0.02),
            (7000.0, 0.90, 0.01),
            (7400.0, 0.95, 0.01),
        ]);

        let fit = fit_sigmoid(&s, &FitOptions::default()).unwrap();
        assert_eq!(fit.used, 4);
        assert_eq!(fit.excluded, 1);

        let floored = FitOptions {
            zero_error: ZeroErrorPolicy::Floor,
            error_floor: 0.05,
            ..FitOptions::default()
        };
        let fit = fit_sigmoid(&s, &floored).unwrap();
        assert_eq!(fit.used, 5);
        assert_eq!(fit.excluded, 0);
        assert!((fit.model.emax - 0.95).abs() < 0.02, "{:?}", fit.model);
    }

    #[test]
    fn floor_only_replaces_invalid_errors() {
        let s = sample(&[
            (6000.0, 0.02, 0.01),
            (6400.0, 0.10, 0.0),
            (6600.0, 0.45, 0.02),
            (7000.0, 0.90, -1.0),
            (7400.0, 0.95, f64::NAN),
        ]);
        let opts = FitOptions {
            zero_error: ZeroErrorPolicy::Floor,
            error_floor: 0.05,
            ..FitOptions::default()
        };
        let (kept, excluded) = select_points(&s.points, &opts);
        let errors: Vec<f64> = kept.iter().map(|p| p.efficiency_error).collect();
        assert_eq!(errors, [0.01, 0.05, 0.02, 0.05, 0.05]);
        assert_eq!(excluded, 0);
    }

    #[test]
    fn inflection_outside_window_is_rejected() {
        // Noiseless scan that starts 50 V above the inflection.
        let truth = SigmoidModel::new(0.96, 0.0085, 6050.0);
        let points: Vec<(f64, f64, f64)> = (0..12)
            .map(|i| {
                let v = 6100.0 + 110.0 * i as f64;
                (v, truth.efficiency(v), 0.01)
            })
            .collect();
        let s = sample(&points);
        let near_truth = FitOptions {
            initial_guess: InitialGuess {
                emax: 0.95,
                lambda: 0.009,
                hv50: 6080.0,
            },
            retry_from_data: false,
            ..FitOptions::default()
        };

        let fit = fit_sigmoid(&s, &near_truth).unwrap();
        assert!((fit.model.hv50 - 6050.0).abs() < 1e-2, "{:?}", fit.model);

        let strict = FitOptions {
            hv50_window: 0.0,
            ..near_truth
        };
        let err = fit_sigmoid(&s, &strict).unwrap_err();
        match err {
            ScanError::FitConvergence { reason, .. } => {
                assert!(reason.contains("outside the sampled range"), "{reason}");
            }
            other => panic!("expected FitConvergence, got {other}"),
        }
    }

    #[test]
    fn exclusion_can_leave_too_few_points() {
        let s = sample(&[(6000.0, 0.02, 0.0), (6500.0, 0.5, 0.02), (7000.0, 0.9, f64::NAN)]);
        let err = fit_sigmoid(&s, &FitOptions::default()).unwrap_err();
        assert!(matches!(err, ScanError::InsufficientData { valid: 1, .. }), "{err}");
    }

    #[test]
    fn identical_voltages_are_insufficient() {
        let s = sample(&[(7000.0, 0.5, 0.01), (7000.0, 0.52, 0.01), (7000.0, 0.49, 0.01)]);
        let err = fit_sigmoid(&s, &FitOptions::default()).unwrap_err();
        assert!(matches!(err, ScanError::InsufficientData { .. }), "{err}");
    }

    #[test]
    fn scan_without_transition_is_rejected() {
        // Flat plateau: no inflection can be located inside the scan.
        let points: Vec<(f64, f64, f64)> = (0..8).map(|i| (6000.0 + 100.0 * i as f64, 0.9, 0.01)).collect();
        let err = fit_sigmoid(&sample(&points), &FitOptions::default()).unwrap_err();
        assert!(matches!(err, ScanError::FitConvergence { .. }), "{err}");
    }

    #[test]
    fn data_driven_retry_rescues_off_scale_guess() {
        // Voltages in kV while the default guess assumes volts.
        let truth = SigmoidModel::new(0.95, 9.0, 6.7);
        let points: Vec<(f64, f64, f64)> = (0..10)
            .map(|i| {
                let v = 6.2 + 0.1 * i as f64;
                (v, truth.efficiency(v), 0.01)
            })
            .collect();

        let fit = fit_sigmoid(&sample(&points), &FitOptions::default()).unwrap();
        assert!((fit.model.hv50 - 6.7).abs() < 1e-4, "{:?}", fit.model);
    }
}
