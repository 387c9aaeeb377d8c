//! Data-driven starting points.
//!
//! The configured initial guess encodes a voltage scale (thousands of volts).
//! When a scan lives elsewhere the optimizer can wander off, so the fitter
//! retries from a guess read directly off the samples:
//!
//! - plateau: the largest observed efficiency
//! - inflection: the first crossing of half the plateau (linear interpolation)
//! - slope: from the 10%–90% rise width (`2 ln 9 / λ` for a logistic)

use crate::domain::{InitialGuess, ScanPoint};

/// Estimate a starting point from the samples.
///
/// Returns `None` when there are fewer than two finite samples or the
/// efficiencies are all non-positive.
pub fn guess_from_data(points: &[ScanPoint]) -> Option<InitialGuess> {
    let mut sorted: Vec<(f64, f64)> = points
        .iter()
        .filter(|p| p.voltage.is_finite() && p.efficiency.is_finite())
        .map(|p| (p.voltage, p.efficiency))
        .collect();
    if sorted.len() < 2 {
        return None;
    }
    sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let emax = sorted.iter().map(|&(_, e)| e).fold(f64::NEG_INFINITY, f64::max);
    if !(emax > 0.0) {
        return None;
    }

    let v_min = sorted[0].0;
    let v_max = sorted[sorted.len() - 1].0;
    let span = v_max - v_min;
    if !(span > 0.0) {
        return None;
    }

    let hv50 = crossing(&sorted, 0.5 * emax).unwrap_or(0.5 * (v_min + v_max));
    let width = match (crossing(&sorted, 0.1 * emax), crossing(&sorted, 0.9 * emax)) {
        (Some(lo), Some(hi)) if hi > lo => hi - lo,
        _ => 0.5 * span,
    };
    let lambda = 2.0 * 9f64.ln() / width;

    Some(InitialGuess {
        emax: emax.min(1.0),
        lambda,
        hv50,
    })
}

/// First voltage where the efficiency reaches `level`, interpolated linearly.
fn crossing(sorted: &[(f64, f64)], level: f64) -> Option<f64> {
    if sorted[0].1 >= level {
        return Some(sorted[0].0);
    }
    sorted.windows(2).find_map(|w| {
        let (v0, e0) = w[0];
        let (v1, e1) = w[1];
        if e0 < level && e1 >= level {
            let u = if e1 > e0 { (level - e0) / (e1 - e0) } else { 0.0 };
            Some(v0 + u * (v1 - v0))
        } else {
            None
        }
    })
}
