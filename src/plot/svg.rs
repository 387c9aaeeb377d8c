//! SVG comparison charts (plotters).
//!
//! Three charts per batch:
//! - `eff_vs_hv.svg`: measured points with error bars, fitted sigmoids and
//!   working-point crosses, one legend line per scan
//! - `plateau_vs_abs.svg`: plateau efficiency against source attenuation,
//!   one series per group (`OFF` drawn at [`OFF_PLOT_POSITION`])
//! - `plateau_vs_bkg.svg`: plateau efficiency against background gamma rate,
//!   one series per group
//!
//! The last two are skipped when no scan carries the x quantity.

use std::error::Error;
use std::path::{Path, PathBuf};

use log::{info, warn};
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;

use crate::domain::ScanAnalysis;
use crate::error::AppError;
use crate::io::OFF_PLOT_POSITION;
use crate::plot::style::{MarkerShape, SeriesStyle, series_style};
use crate::report::{legend_mode, legend_text};

type Chart<'a, 'b> = ChartContext<'a, SVGBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;
type DrawResult = Result<(), Box<dyn Error>>;

const SIZE: (u32, u32) = (1100, 720);
const CURVE_SAMPLES: usize = 200;

/// Write every applicable chart into `dir`; returns the written paths.
pub fn write_comparison_charts(dir: &Path, analyses: &[ScanAnalysis]) -> Result<Vec<PathBuf>, AppError> {
    if analyses.is_empty() {
        return Err(AppError::new(3, "No analyzed scans to plot."));
    }
    std::fs::create_dir_all(dir)
        .map_err(|e| AppError::new(2, format!("Failed to create plot dir '{}': {e}", dir.display())))?;

    let mut written = Vec::new();

    let path = dir.join("eff_vs_hv.svg");
    render_efficiency_chart(&path, analyses)?;
    written.push(path);

    let path = dir.join("plateau_vs_abs.svg");
    if render_plateau_vs_attenuation(&path, analyses)? {
        written.push(path);
    } else {
        info!("no scan has a parsed attenuation; skipping {}", path.display());
    }

    let path = dir.join("plateau_vs_bkg.svg");
    if render_plateau_vs_background(&path, analyses)? {
        written.push(path);
    } else {
        info!("no scan has a measured background rate; skipping {}", path.display());
    }

    Ok(written)
}

/// Efficiency vs HV with fits and working points.
pub fn render_efficiency_chart(path: &Path, analyses: &[ScanAnalysis]) -> Result<(), AppError> {
    draw_efficiency_chart(path, analyses).map_err(|e| plot_error(path, e))
}

/// Plateau vs attenuation; `Ok(false)` when nothing could be placed.
pub fn render_plateau_vs_attenuation(path: &Path, analyses: &[ScanAnalysis]) -> Result<bool, AppError> {
    let points = grouped_points(analyses, |a| {
        a.meta
            .attenuation
            .map(|att| att.plot_position(OFF_PLOT_POSITION))
    });
    if points.iter().all(|(_, p)| p.is_empty()) {
        return Ok(false);
    }
    draw_plateau_chart(path, "Plateau efficiency vs ABS", "ABS", &points).map_err(|e| plot_error(path, e))?;
    Ok(true)
}

/// Plateau vs background rate; `Ok(false)` when no rate was measured.
pub fn render_plateau_vs_background(path: &Path, analyses: &[ScanAnalysis]) -> Result<bool, AppError> {
    let points = grouped_points(analyses, |a| a.background.value());
    if points.iter().all(|(_, p)| p.is_empty()) {
        return Ok(false);
    }
    draw_plateau_chart(
        path,
        "Plateau efficiency vs background rate",
        "Background gamma rate (kHz/cm²)",
        &points,
    )
    .map_err(|e| plot_error(path, e))?;
    Ok(true)
}

fn plot_error(path: &Path, e: Box<dyn Error>) -> AppError {
    AppError::new(4, format!("Plotting error ({}): {e}", path.display()))
}

/// `(group, [(x, emax, emax_err)])` in order of first appearance.
///
/// Scans without an x value are left out with a warning.
fn grouped_points(
    analyses: &[ScanAnalysis],
    x_of: impl Fn(&ScanAnalysis) -> Option<f64>,
) -> Vec<(String, Vec<(f64, f64, f64)>)> {
    let mut groups: Vec<(String, Vec<(f64, f64, f64)>)> = Vec::new();
    for a in analyses {
        let name = a.meta.group.clone().unwrap_or_else(|| "scans".to_string());
        let idx = match groups.iter().position(|(g, _)| *g == name) {
            Some(i) => i,
            None => {
                groups.push((name, Vec::new()));
                groups.len() - 1
            }
        };
        match x_of(a) {
            Some(x) if x.is_finite() => groups[idx].1.push((x, a.fit.model.emax, a.fit.errors.emax)),
            _ => warn!("{}: no x value for this chart; left out", a.meta.label),
        }
    }
    groups
}

fn draw_efficiency_chart(path: &Path, analyses: &[ScanAnalysis]) -> DrawResult {
    let mut v_min = f64::INFINITY;
    let mut v_max = f64::NEG_INFINITY;
    for a in analyses {
        v_min = v_min.min(a.fit.domain.min);
        v_max = v_max.max(a.fit.domain.max).max(a.working_point.wp_voltage);
    }
    let pad = ((v_max - v_min) * 0.03).max(1.0);
    let (x0, x1) = (v_min - pad, v_max + pad);

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Efficiency vs HV", ("sans-serif", 24).into_font())
        .margin(20)
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 45)
        .build_cartesian_2d(x0..x1, 0.0..1.05)?;

    chart
        .configure_mesh()
        .x_desc("HV_eff (V)")
        .y_desc("Efficiency")
        .x_label_formatter(&|v| format!("{v:.0}"))
        .y_label_formatter(&|v| format!("{v:.1}"))
        .draw()?;

    let mode = legend_mode(analyses);
    for (i, a) in analyses.iter().enumerate() {
        let style = series_style(i);
        let color = style.color;

        chart.draw_series(a.sample.points.iter().map(|p| {
            ErrorBar::new_vertical(
                p.voltage,
                p.efficiency - p.efficiency_error,
                p.efficiency,
                p.efficiency + p.efficiency_error,
                color.stroke_width(1),
                6,
            )
        }))?;

        chart.draw_series(LineSeries::new(
            a.fit.model.sample(a.fit.domain, CURVE_SAMPLES),
            color.stroke_width(2),
        ))?;

        let points: Vec<(f64, f64)> = a.sample.points.iter().map(|p| (p.voltage, p.efficiency)).collect();
        draw_markers(&mut chart, &points, style, Some(legend_text(a, mode)))?;

        chart.draw_series(std::iter::once(Cross::new(
            (a.working_point.wp_voltage, a.working_point.eff_at_wp),
            7,
            color.stroke_width(2),
        )))?;
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK.mix(0.4))
        .label_font(("sans-serif", 13).into_font())
        .position(SeriesLabelPosition::LowerRight)
        .draw()?;

    root.present()?;
    Ok(())
}

fn draw_plateau_chart(path: &Path, title: &str, x_desc: &str, groups: &[(String, Vec<(f64, f64, f64)>)]) -> DrawResult {
    let all = groups.iter().flat_map(|(_, p)| p.iter());
    let (mut x_lo, mut x_hi) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut y_lo, mut y_hi) = (f64::INFINITY, f64::NEG_INFINITY);
    for &(x, y, e) in all {
        x_lo = x_lo.min(x);
        x_hi = x_hi.max(x);
        y_lo = y_lo.min(y - e);
        y_hi = y_hi.max(y + e);
    }
    let x_pad = ((x_hi - x_lo) * 0.08).max(0.5);
    let y_pad = ((y_hi - y_lo) * 0.15).max(0.01);
    let (x0, x1) = ((x_lo - x_pad).min(0.0), x_hi + x_pad);
    let (y0, y1) = (y_lo - y_pad, y_hi + y_pad);

    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24).into_font())
        .margin(20)
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 45)
        .build_cartesian_2d(x0..x1, y0..y1)?;

    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc("Emax")
        .y_label_formatter(&|v| format!("{v:.3}"))
        .draw()?;

    for (i, (group, points)) in groups.iter().enumerate() {
        if points.is_empty() {
            continue;
        }
        let style = series_style(i);
        chart.draw_series(points.iter().map(|&(x, y, e)| {
            ErrorBar::new_vertical(x, y - e, y, y + e, style.color.stroke_width(1), 6)
        }))?;
        let xy: Vec<(f64, f64)> = points.iter().map(|&(x, y, _)| (x, y)).collect();
        draw_markers(&mut chart, &xy, style, Some(group.clone()))?;
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK.mix(0.4))
        .position(SeriesLabelPosition::LowerLeft)
        .draw()?;

    root.present()?;
    Ok(())
}

fn draw_markers(chart: &mut Chart<'_, '_>, points: &[(f64, f64)], style: SeriesStyle, label: Option<String>) -> DrawResult {
    let color = style.color;
    let filled = color.filled();
    let open = color.stroke_width(2);

    let anno = match style.marker {
        MarkerShape::Circle => chart.draw_series(points.iter().map(|&p| Circle::new(p, 4, filled)))?,
        MarkerShape::OpenCircle => chart.draw_series(points.iter().map(|&p| Circle::new(p, 4, open)))?,
        MarkerShape::Square => chart.draw_series(
            points
                .iter()
                .map(|&p| EmptyElement::at(p) + Rectangle::new([(-4, -4), (4, 4)], filled)),
        )?,
        MarkerShape::OpenSquare => chart.draw_series(
            points
                .iter()
                .map(|&p| EmptyElement::at(p) + Rectangle::new([(-4, -4), (4, 4)], open)),
        )?,
        MarkerShape::TriangleUp => chart.draw_series(points.iter().map(|&p| TriangleMarker::new(p, 5, filled)))?,
        MarkerShape::OpenTriangle => chart.draw_series(points.iter().map(|&p| TriangleMarker::new(p, 5, open)))?,
        MarkerShape::Cross => chart.draw_series(points.iter().map(|&p| Cross::new(p, 4, open)))?,
    };

    if let Some(label) = label {
        anno.label(label)
            .legend(move |(x, y)| Circle::new((x, y), 4, color.filled()));
    }
    Ok(())
}
