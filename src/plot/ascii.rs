//! ASCII plotting for terminal output.
//!
//! Fixed-size character grid, so the same inputs always print the same plot.
//! Efficiency is on the vertical axis, HV on the horizontal one.
//!
//! Glyphs:
//! - measured points: one glyph per scan (`o`, `x`, `+`, ...)
//! - fitted curves: `-` line
//! - working points: `W`

use crate::domain::{CurveFile, ScanAnalysis};
use crate::plot::style::series_style;

/// One scan as the grid sees it.
#[derive(Debug, Clone)]
struct Series {
    label: String,
    glyph: char,
    points: Vec<(f64, f64)>,
    curve: Vec<(f64, f64)>,
    working_point: Option<(f64, f64)>,
}

/// Render in-memory analyses: points, fitted curves and working points.
pub fn render_ascii_plot(analyses: &[ScanAnalysis], width: usize, height: usize) -> String {
    let series: Vec<Series> = analyses
        .iter()
        .enumerate()
        .map(|(i, a)| Series {
            label: a.meta.label.clone(),
            glyph: series_style(i).glyph,
            points: a.sample.points.iter().map(|p| (p.voltage, p.efficiency)).collect(),
            curve: a.fit.model.sample(a.fit.domain, width.max(2)),
            working_point: Some((a.working_point.wp_voltage, a.working_point.eff_at_wp)),
        })
        .collect();
    render_plot(&series, width, height)
}

/// Render a saved curves file (stored points and fitted grid).
pub fn render_ascii_plot_from_curves(curves: &CurveFile, width: usize, height: usize) -> String {
    let series: Vec<Series> = curves
        .scans
        .iter()
        .enumerate()
        .map(|(i, s)| Series {
            label: s.meta.label.clone(),
            glyph: series_style(i).glyph,
            points: s.points.iter().map(|p| (p[0], p[1])).collect(),
            curve: s
                .grid
                .voltage
                .iter()
                .zip(s.grid.efficiency.iter())
                .map(|(&v, &e)| (v, e))
                .collect(),
            working_point: Some((s.working_point.wp_voltage, s.working_point.eff_at_wp)),
        })
        .collect();
    render_plot(&series, width, height)
}

fn render_plot(series: &[Series], width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (v_min, v_max) = x_range(series).unwrap_or((0.0, 1.0));
    let (e_min, e_max) = y_range(series).unwrap_or((0.0, 1.0));
    let (e_min, e_max) = pad_range(e_min, e_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Curves first so points overlay them.
    for s in series {
        draw_curve(&mut grid, &s.curve, v_min, v_max, e_min, e_max);
    }
    for s in series {
        if let Some((v, e)) = s.working_point {
            if v >= v_min && v <= v_max {
                grid[map_y(e, e_min, e_max, height)][map_x(v, v_min, v_max, width)] = 'W';
            }
        }
    }
    for s in series {
        for &(v, e) in &s.points {
            grid[map_y(e, e_min, e_max, height)][map_x(v, v_min, v_max, width)] = s.glyph;
        }
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: HV=[{v_min:.0}, {v_max:.0}] V | efficiency=[{e_min:.3}, {e_max:.3}]\n"
    ));

    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    for s in series {
        out.push_str(&format!("  {} {}\n", s.glyph, s.label));
    }

    out
}

fn x_range(series: &[Series]) -> Option<(f64, f64)> {
    let xs = series
        .iter()
        .flat_map(|s| s.points.iter().chain(s.curve.iter()).map(|&(v, _)| v));
    finite_range(xs)
}

fn y_range(series: &[Series]) -> Option<(f64, f64)> {
    let ys = series
        .iter()
        .flat_map(|s| s.points.iter().chain(s.curve.iter()).map(|&(_, e)| e));
    finite_range(ys)
}

fn finite_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values.filter(|v| v.is_finite()) {
        min = min.min(v);
        max = max.max(v);
    }
    if min.is_finite() && max.is_finite() && max > min {
        Some((min, max))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(v: f64, v_min: f64, v_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((v - v_min) / (v_max - v_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(e: f64, e_min: f64, e_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((e - e_min) / (e_max - e_min)).clamp(0.0, 1.0);
    // Highest efficiency on row 0.
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], v_min: f64, v_max: f64, e_min: f64, e_max: f64) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(v, e) in curve {
        if !(v.is_finite() && e.is_finite()) {
            continue;
        }
        let x = map_x(v, v_min, v_max, width);
        let y = map_y(e, e_min, e_max, height);
        if let Some((x0, y0)) = prev {
            draw_line(grid, x0, y0, x, y, '-');
        } else {
            grid[y][x] = '-';
        }
        prev = Some((x, y));
    }
}

/// Integer line drawing (Bresenham).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plot_golden_snapshot_small() {
        let series = vec![Series {
            label: "scan".to_string(),
            glyph: 'o',
            points: vec![(0.0, 0.0), (10.0, 1.0)],
            curve: vec![(0.0, 0.0), (10.0, 1.0)],
            working_point: None,
        }];

        let txt = render_plot(&series, 10, 5);
        let expected = concat!(
            "Plot: HV=[0, 10] V | efficiency=[-0.050, 1.050]\n",
            "        -o\n",
            "      --  \n",
            "    --    \n",
            "  --      \n",
            "o-        \n",
            "  o scan\n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn every_scan_gets_its_glyph_and_legend_line() {
        use crate::domain::BackgroundRate;
        use crate::domain::fixtures::analysis;

        let bkg = BackgroundRate::Measured { khz_per_cm2: 0.0 };
        let a = analysis("first", "STDMX", 0.95, 6500.0, bkg.clone());
        let b = analysis("second", "STDMX", 0.90, 6900.0, bkg);
        let txt = render_ascii_plot(&[a, b], 60, 20);

        assert!(txt.contains("  o first\n"));
        assert!(txt.contains("  x second\n"));
        let body: String = txt.lines().skip(1).take(20).collect();
        assert!(body.contains('o') && body.contains('x') && body.contains('-'));
        assert_eq!(txt.lines().count(), 1 + 20 + 2);
    }
}
