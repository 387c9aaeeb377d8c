//! Scan metadata encoded in file names.
//!
//! Scan files are named `<MIXTURE>_<ABS>.csv`, e.g. `STDMX_OFF.csv` or
//! `ECO2_2.2.csv`: the gas mixture up to the first underscore, the source
//! attenuation after it (`OFF` when the source is off).

use std::path::Path;

use log::warn;

use crate::domain::Attenuation;

/// Where `Attenuation::Off` is drawn on attenuation axes.
pub const OFF_PLOT_POSITION: f64 = 25.0;

/// File stem without directories or extension.
pub fn scan_stem(path: &Path) -> &str {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("")
}

/// Gas mixture tag: the stem up to the first `_` (the whole stem if none).
pub fn mixture_from_path(path: &Path) -> Option<String> {
    let stem = scan_stem(path);
    let mixture = stem.split('_').next().unwrap_or("").trim();
    (!mixture.is_empty()).then(|| mixture.to_string())
}

/// Source attenuation from the stem after the first `_`.
///
/// Returns `None` (and logs a warning) when the suffix is missing or not a
/// number; an unknown attenuation is never reported as zero.
pub fn attenuation_from_path(path: &Path) -> Option<Attenuation> {
    let stem = scan_stem(path);
    let Some((_, suffix)) = stem.split_once('_') else {
        warn!("{}: no attenuation suffix in file name", path.display());
        return None;
    };
    let parsed = parse_attenuation(suffix);
    if parsed.is_none() {
        warn!("{}: cannot parse attenuation '{suffix}'", path.display());
    }
    parsed
}

pub fn parse_attenuation(text: &str) -> Option<Attenuation> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("off") {
        return Some(Attenuation::Off);
    }
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(Attenuation::Factor { value }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixture_and_attenuation_from_names() {
        let p = Path::new("data_2024/STDMX_OFF.csv");
        assert_eq!(mixture_from_path(p).as_deref(), Some("STDMX"));
        assert_eq!(attenuation_from_path(p), Some(Attenuation::Off));

        let p = Path::new("ECO2_2.2.csv");
        assert_eq!(mixture_from_path(p).as_deref(), Some("ECO2"));
        assert_eq!(attenuation_from_path(p), Some(Attenuation::Factor { value: 2.2 }));
    }

    #[test]
    fn unparseable_attenuation_is_none_not_zero() {
        assert_eq!(attenuation_from_path(Path::new("STDMX.csv")), None);
        assert_eq!(attenuation_from_path(Path::new("STDMX_run3_b.csv")), None);
        assert_eq!(mixture_from_path(Path::new("STDMX.csv")).as_deref(), Some("STDMX"));
    }

    #[test]
    fn off_is_drawn_at_fixed_position() {
        assert_eq!(Attenuation::Off.plot_position(OFF_PLOT_POSITION), 25.0);
        assert_eq!(Attenuation::Factor { value: 4.6 }.plot_position(OFF_PLOT_POSITION), 4.6);
    }
}
