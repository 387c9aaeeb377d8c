//! Per-dataset styling, cycled by index.
//!
//! Dataset `i` always gets the same colour, marker and terminal glyph, so a
//! scan keeps its look across the HV, attenuation and background charts.

use plotters::style::RGBColor;

const PALETTE: [RGBColor; 7] = [
    RGBColor(0, 0, 255),
    RGBColor(255, 0, 0),
    RGBColor(0, 153, 0),
    RGBColor(255, 0, 255),
    RGBColor(255, 153, 0),
    RGBColor(0, 204, 204),
    RGBColor(0, 0, 0),
];

const GLYPHS: [char; 7] = ['o', 'x', '+', '*', '#', '@', '%'];

/// Marker shapes available on the SVG charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerShape {
    Circle,
    Square,
    TriangleUp,
    Cross,
    OpenCircle,
    OpenSquare,
    OpenTriangle,
}

const MARKERS: [MarkerShape; 7] = [
    MarkerShape::Circle,
    MarkerShape::Square,
    MarkerShape::TriangleUp,
    MarkerShape::Cross,
    MarkerShape::OpenCircle,
    MarkerShape::OpenSquare,
    MarkerShape::OpenTriangle,
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesStyle {
    pub color: RGBColor,
    pub marker: MarkerShape,
    pub glyph: char,
}

pub fn series_style(index: usize) -> SeriesStyle {
    SeriesStyle {
        color: PALETTE[index % PALETTE.len()],
        marker: MARKERS[index % MARKERS.len()],
        glyph: GLYPHS[index % GLYPHS.len()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn styles_cycle() {
        assert_eq!(series_style(0), series_style(7));
        assert_ne!(series_style(0).color, series_style(1).color);
        assert_eq!(series_style(3).glyph, '*');
        assert_eq!(series_style(10).marker, MarkerShape::Cross);
    }
}
