//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the fitting code stays clean and testable
//! - output changes are localized

use crate::domain::{BackgroundRate, ScanAnalysis, ScanFailure};
use crate::models::PARAM_NAMES;

/// Full summary: one block per analyzed scan, then the failures.
pub fn format_batch_summary(analyses: &[ScanAnalysis], failures: &[ScanFailure]) -> String {
    let mut out = String::new();

    out.push_str("=== hvscan - efficiency scan fits ===\n");
    out.push_str(&format!(
        "Scans: {} analyzed, {} failed\n",
        analyses.len(),
        failures.len()
    ));

    for a in analyses {
        out.push('\n');
        out.push_str(&format_scan(a));
    }

    if !analyses.is_empty() {
        out.push('\n');
        out.push_str(&format_table(analyses));
    }

    if !failures.is_empty() {
        out.push('\n');
        out.push_str(&format_failures(failures));
    }

    out
}

/// Fit parameters and working point of one scan.
pub fn format_scan(a: &ScanAnalysis) -> String {
    let fit = &a.fit;
    let wp = &a.working_point;
    let mut out = String::new();

    let group = a.meta.group.as_deref().map(|g| format!(" [{g}]")).unwrap_or_default();
    out.push_str(&format!("--- {}{group} ---\n", a.meta.label));
    out.push_str(&format!(
        "Points: used={} excluded={} | HV=[{:.0}, {:.0}] V\n",
        fit.used, fit.excluded, fit.domain.min, fit.domain.max
    ));

    let values = [fit.model.emax, fit.model.lambda, fit.model.hv50];
    let errors = [fit.errors.emax, fit.errors.lambda, fit.errors.hv50];
    for ((name, v), e) in PARAM_NAMES.iter().zip(values).zip(errors) {
        out.push_str(&format!("{name:<7} = {} ± {}\n", fmt_num(v), fmt_num(e)));
    }

    let chi2 = match fit.quality.chi2_per_ndf() {
        Some(r) => format!("{r:.3}"),
        None => "n/a".to_string(),
    };
    out.push_str(&format!(
        "chi2/ndf = {:.3}/{} = {chi2} ({} iterations)\n",
        fit.quality.chi2, fit.quality.ndf, fit.quality.iterations
    ));

    out.push_str(&format!("HV({}) = {:.1} V\n", wp.reference, wp.hv_ref));
    out.push_str(&format!(
        "WP = {:.3} ± {:.3} kV (covariance: ± {:.3} kV), Eff(WP) = {:.1}%\n",
        wp.wp_voltage / 1000.0,
        wp.wp_voltage_error / 1000.0,
        wp.wp_voltage_error_cov / 1000.0,
        wp.eff_at_wp * 100.0
    ));

    let bkg = match &a.background {
        BackgroundRate::Measured { khz_per_cm2 } => format!("{khz_per_cm2:.3} kHz/cm²"),
        BackgroundRate::Unavailable { reason } => format!("unavailable ({reason})"),
    };
    out.push_str(&format!("Background = {bkg}\n"));

    out
}

/// Compact one-line-per-scan table.
pub fn format_table(analyses: &[ScanAnalysis]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<20} {:<8} {:>6} {:>8} {:>8} {:>8} {:>8} {:>10}\n",
            "scan", "ABS", "Emax", "HV50", "HVref", "WP", "Eff(WP)", "bkg"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<20} {:-<8} {:-<6} {:-<8} {:-<8} {:-<8} {:-<8} {:-<10}\n",
            "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for a in analyses {
        let bkg = a
            .background
            .value()
            .map(|v| format!("{v:.2}"))
            .unwrap_or_else(|| "n/a".to_string());
        let abs = a.meta.attenuation.map(|x| x.to_string()).unwrap_or_else(|| "?".to_string());
        out.push_str(
            format!(
                "{:<20} {:<8} {:>6.3} {:>8.1} {:>8.1} {:>8.1} {:>8.3} {:>10}\n",
                truncate(&a.meta.label, 20),
                truncate(&abs, 8),
                a.fit.model.emax,
                a.fit.model.hv50,
                a.working_point.hv_ref,
                a.working_point.wp_voltage,
                a.working_point.eff_at_wp,
                bkg
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

/// Failed scans with their error kind and message.
pub fn format_failures(failures: &[ScanFailure]) -> String {
    let mut out = String::new();
    out.push_str(&format!("Failed scans ({}):\n", failures.len()));
    for f in failures {
        out.push_str(&format!(
            "- {} ({}): [{}] {}\n",
            f.job.label,
            f.job.path.display(),
            f.error.kind(),
            f.error
        ));
    }
    out
}

fn fmt_num(v: f64) -> String {
    let a = v.abs();
    if a != 0.0 && !(1e-3..1e5).contains(&a) {
        format!("{v:.4e}")
    } else {
        format!("{v:.5}")
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::domain::ScanJob;
    use crate::domain::fixtures::analysis;
    use crate::error::ScanError;

    #[test]
    fn summary_lists_scans_and_failures() {
        let ok = analysis("STDMX_OFF", "STDMX", 0.95, 6500.0, BackgroundRate::Measured { khz_per_cm2: 1.25 });
        let failed = ScanFailure {
            job: ScanJob {
                path: PathBuf::from("BROKEN_1.csv"),
                label: "BROKEN_1".to_string(),
                group: None,
                wp_file: None,
                legend: None,
                mixture_name: None,
            },
            error: ScanError::DegenerateFit { lambda: 0.0 },
        };

        let text = format_batch_summary(&[ok], &[failed]);
        assert!(text.contains("Scans: 1 analyzed, 1 failed"), "{text}");
        assert!(text.contains("--- STDMX_OFF [2024] ---"), "{text}");
        assert!(text.contains("HV(95%) = 6794.4 V"), "{text}");
        assert!(text.contains("Background = 1.250 kHz/cm²"), "{text}");
        assert!(text.contains("- BROKEN_1 (BROKEN_1.csv): [degenerate_fit]"), "{text}");
    }

    #[test]
    fn table_rows_are_trimmed() {
        let a = analysis("a-very-long-scan-label-indeed", "STDMX", 0.95, 6500.0, BackgroundRate::Unavailable {
            reason: "missing".to_string(),
        });
        let table = format_table(&[a]);
        let row = table.lines().nth(2).unwrap();
        assert!(row.starts_with("a-very-long-scan-la. OFF"), "{row}");
        assert!(row.ends_with("n/a"), "{row}");
        assert!(table.lines().all(|l| l == l.trim_end()));
    }

    #[test]
    fn small_numbers_use_scientific_notation() {
        assert_eq!(fmt_num(0.0123), "0.01230");
        assert_eq!(fmt_num(0.0005), "5.0000e-4");
        assert_eq!(fmt_num(0.0), "0.00000");
    }
}
