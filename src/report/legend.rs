//! Legend text for comparison charts.
//!
//! The detector group's plots carry one legend line per scan:
//!
//! ```text
//! plateau = 95%, WP = 6.95 kV, bkg gamma rate = 1.2 kHz/cm², Eff(WP) = 94%
//! ```
//!
//! When a chart mixes gas mixtures, the mixture replaces the background: its
//! manifest name when one is declared, else the file-name tag.

use std::collections::BTreeSet;

use crate::domain::{BackgroundRate, ScanAnalysis};

/// What the middle field of a legend line shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegendMode {
    Background,
    Mixture,
}

/// `Mixture` when the scans do not all share one mixture tag.
pub fn legend_mode(analyses: &[ScanAnalysis]) -> LegendMode {
    let mixtures: BTreeSet<&str> = analyses
        .iter()
        .map(|a| a.meta.mixture.as_deref().unwrap_or(""))
        .collect();
    if mixtures.len() > 1 {
        LegendMode::Mixture
    } else {
        LegendMode::Background
    }
}

/// One legend line; an explicit manifest legend wins.
pub fn legend_text(a: &ScanAnalysis, mode: LegendMode) -> String {
    if let Some(text) = &a.meta.legend {
        return text.clone();
    }

    let middle = match mode {
        LegendMode::Mixture => a
            .meta
            .mixture_name
            .clone()
            .or_else(|| a.meta.mixture.clone())
            .unwrap_or_else(|| a.meta.label.clone()),
        LegendMode::Background => background_text(&a.background),
    };

    format!(
        "plateau = {}, WP = {:.2} kV, {middle}, Eff(WP) = {}",
        percent(a.fit.model.emax),
        a.working_point.wp_voltage / 1000.0,
        percent(a.working_point.eff_at_wp),
    )
}

pub fn background_text(rate: &BackgroundRate) -> String {
    match rate {
        BackgroundRate::Measured { khz_per_cm2 } if *khz_per_cm2 == 0.0 => "no background gamma rate".to_string(),
        BackgroundRate::Measured { khz_per_cm2 } => format!("bkg gamma rate = {khz_per_cm2:.1} kHz/cm²"),
        BackgroundRate::Unavailable { .. } => "bkg gamma rate n/a".to_string(),
    }
}

fn percent(fraction: f64) -> String {
    format!("{:.0}%", fraction * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fixtures::analysis;

    #[test]
    fn legend_matches_group_format() {
        let a = analysis("STDMX_OFF", "STDMX", 0.95, 6500.0, BackgroundRate::Measured { khz_per_cm2: 1.2 });
        let text = legend_text(&a, LegendMode::Background);
        assert!(text.starts_with("plateau = 95%, WP = 6.94 kV, bkg gamma rate = 1.2 kHz/cm², Eff(WP) = "), "{text}");
        assert!(text.ends_with("94%"), "{text}");
    }

    #[test]
    fn zero_and_missing_background_are_spelled_out() {
        assert_eq!(
            background_text(&BackgroundRate::Measured { khz_per_cm2: 0.0 }),
            "no background gamma rate"
        );
        let missing = BackgroundRate::Unavailable {
            reason: "no file".to_string(),
        };
        assert_eq!(background_text(&missing), "bkg gamma rate n/a");
    }

    #[test]
    fn mixed_mixtures_switch_mode() {
        let bkg = BackgroundRate::Measured { khz_per_cm2: 0.0 };
        let a = analysis("STDMX_OFF", "STDMX", 0.95, 6500.0, bkg.clone());
        let b = analysis("ECO2_OFF", "ECO2", 0.93, 6900.0, bkg);
        assert_eq!(legend_mode(std::slice::from_ref(&a)), LegendMode::Background);
        let both = vec![a, b];
        assert_eq!(legend_mode(&both), LegendMode::Mixture);
        assert!(legend_text(&both[1], LegendMode::Mixture).contains(", ECO2, "));
    }

    #[test]
    fn declared_mixture_name_replaces_tag() {
        let mut a = analysis("ECO2_OFF", "ECO2", 0.93, 6900.0, BackgroundRate::Measured { khz_per_cm2: 0.0 });
        a.meta.mixture_name = Some("30% CO_{2} + 1.0% SF_{6}".to_string());
        let text = legend_text(&a, LegendMode::Mixture);
        assert!(text.contains(", 30% CO_{2} + 1.0% SF_{6}, "), "{text}");
        assert!(!text.contains("ECO2"), "{text}");
    }

    #[test]
    fn explicit_legend_wins() {
        let mut a = analysis("x", "STDMX", 0.95, 6500.0, BackgroundRate::Measured { khz_per_cm2: 0.0 });
        a.meta.legend = Some("reference chamber".to_string());
        assert_eq!(legend_text(&a, LegendMode::Background), "reference chamber");
    }
}
