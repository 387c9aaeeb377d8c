//! Model evaluation for the three-parameter sigmoid.
//!
//! The fitter relies on two primitive operations:
//! - predict `efficiency(v)` given the parameters (for residuals/plots)
//! - the gradient of `efficiency(v)` with respect to the parameters (Jacobian rows)
//!
//! The working-point extractor additionally needs the closed-form inversions.

use crate::domain::{SigmoidModel, VoltageDomain};
use crate::math::{logistic, logit};

/// Parameter order used by Jacobians and covariances.
pub const PARAM_NAMES: [&str; 3] = ["Emax", "Lambda", "HV50"];

impl SigmoidModel {
    pub fn new(emax: f64, lambda: f64, hv50: f64) -> Self {
        Self { emax, lambda, hv50 }
    }

    /// `emax / (1 + exp(-lambda * (v - hv50)))`.
    pub fn efficiency(&self, voltage: f64) -> f64 {
        self.emax * logistic(self.lambda * (voltage - self.hv50))
    }

    /// Efficiency as a fraction of the plateau.
    pub fn relative_efficiency(&self, voltage: f64) -> f64 {
        logistic(self.lambda * (voltage - self.hv50))
    }

    /// `∂efficiency/∂(emax, lambda, hv50)` at `voltage`.
    pub fn gradient(&self, voltage: f64) -> [f64; 3] {
        let dv = voltage - self.hv50;
        let s = logistic(self.lambda * dv);
        let ds = self.emax * s * (1.0 - s);
        [s, ds * dv, -ds * self.lambda]
    }

    /// Voltage where `relative_efficiency(v) == fraction`.
    ///
    /// `v = hv50 + logit(fraction) / lambda`; `None` when the slope is zero
    /// or `fraction` is outside `(0, 1)`.
    pub fn voltage_at_relative(&self, fraction: f64) -> Option<f64> {
        if self.lambda == 0.0 {
            return None;
        }
        let v = self.hv50 + logit(fraction)? / self.lambda;
        v.is_finite().then_some(v)
    }

    /// Voltage where `efficiency(v) == efficiency` (absolute scale).
    ///
    /// `None` when the value is not strictly between 0 and the plateau.
    pub fn voltage_at_efficiency(&self, efficiency: f64) -> Option<f64> {
        if self.emax == 0.0 {
            return None;
        }
        self.voltage_at_relative(efficiency / self.emax)
    }

    /// Sample the curve on `n` evenly spaced voltages across `domain`.
    pub fn sample(&self, domain: VoltageDomain, n: usize) -> Vec<(f64, f64)> {
        let n = n.max(2);
        (0..n)
            .map(|i| {
                let u = i as f64 / (n as f64 - 1.0);
                let v = domain.min + u * (domain.max - domain.min);
                (v, self.efficiency(v))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn efficiency_at_hv50_is_half_plateau() {
        for &(emax, lambda, hv50) in &[(0.95, 0.01, 6700.0), (0.5, 0.003, 9123.25), (1.0, 2.0, 1.5)] {
            let m = SigmoidModel::new(emax, lambda, hv50);
            assert_eq!(m.efficiency(hv50), emax / 2.0);
        }
    }

    #[test]
    fn gradient_matches_finite_difference() {
        let m = SigmoidModel::new(0.93, 0.012, 6800.0);
        let v = 6850.0;
        let g = m.gradient(v);
        let steps = [1e-6, 1e-8, 1e-3];
        for k in 0..3 {
            let h = steps[k];
            let mut plus = m;
            let mut minus = m;
            match k {
                0 => {
                    plus.emax += h;
                    minus.emax -= h;
                }
                1 => {
                    plus.lambda += h;
                    minus.lambda -= h;
                }
                _ => {
                    plus.hv50 += h;
                    minus.hv50 -= h;
                }
            }
            let numeric = (plus.efficiency(v) - minus.efficiency(v)) / (2.0 * h);
            assert!(
                (numeric - g[k]).abs() < 1e-5 * g[k].abs().max(1e-3),
                "{}: analytic={} numeric={numeric}",
                PARAM_NAMES[k],
                g[k]
            );
        }
    }

    #[test]
    fn inversion_round_trips() {
        let m = SigmoidModel::new(0.96, 0.011, 6650.0);
        let v = m.voltage_at_relative(0.95).unwrap();
        assert!((m.relative_efficiency(v) - 0.95).abs() < 1e-9);
        let v = m.voltage_at_efficiency(0.9).unwrap();
        assert!((m.efficiency(v) - 0.9).abs() < 1e-9);
        assert!(m.voltage_at_efficiency(0.97).is_none());
        assert!(SigmoidModel::new(0.9, 0.0, 7000.0).voltage_at_relative(0.5).is_none());
    }
}
