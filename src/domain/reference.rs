//! Reference efficiency with a single unit convention.
//!
//! Internally a reference efficiency is always a **fraction** in `(0, 1)`
//! (`0.95`). Percent values are accepted only through explicit conversions:
//! a `%` suffix when parsing text, or [`ReferenceEfficiency::from_percent`].
//! Bare magnitudes such as `95` or `9500` are rejected instead of guessed.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// Validated reference fraction.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "ReferenceSpec", into = "f64")]
pub struct ReferenceEfficiency(f64);

impl ReferenceEfficiency {
    /// The 95% reference used by the working-point policy.
    pub const NINETY_FIVE: ReferenceEfficiency = ReferenceEfficiency(0.95);

    pub fn from_fraction(value: f64) -> Result<Self, ScanError> {
        if value.is_finite() && value > 0.0 && value < 1.0 {
            return Ok(Self(value));
        }
        Err(ScanError::ReferenceUnitMismatch {
            value,
            hint: unit_hint(value),
        })
    }

    pub fn from_percent(percent: f64) -> Result<Self, ScanError> {
        Self::from_fraction(percent / 100.0).map_err(|_| ScanError::ReferenceUnitMismatch {
            value: percent,
            hint: " (percent value must lie in (0, 100))".to_string(),
        })
    }

    pub fn fraction(self) -> f64 {
        self.0
    }

    pub fn percent(self) -> f64 {
        self.0 * 100.0
    }
}

impl Default for ReferenceEfficiency {
    fn default() -> Self {
        Self::NINETY_FIVE
    }
}

impl std::fmt::Display for ReferenceEfficiency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Round away binary noise such as 7.000000000000001.
        let pct = (self.percent() * 1e9).round() / 1e9;
        write!(f, "{pct}%")
    }
}

impl FromStr for ReferenceEfficiency {
    type Err = ScanError;

    /// `"0.95"` is a fraction, `"95%"` is a percentage.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(pct) = s.strip_suffix('%') {
            let value = pct.trim().parse::<f64>().map_err(|_| ScanError::ReferenceUnitMismatch {
                value: f64::NAN,
                hint: format!(" (cannot parse '{s}')"),
            })?;
            return Self::from_percent(value);
        }
        let value = s.parse::<f64>().map_err(|_| ScanError::ReferenceUnitMismatch {
            value: f64::NAN,
            hint: format!(" (cannot parse '{s}')"),
        })?;
        Self::from_fraction(value)
    }
}

impl From<ReferenceEfficiency> for f64 {
    fn from(value: ReferenceEfficiency) -> Self {
        value.0
    }
}

/// Serialized form: a number (fraction) or a string (`"0.95"` / `"95%"`).
#[derive(Deserialize)]
#[serde(untagged)]
enum ReferenceSpec {
    Number(f64),
    Text(String),
}

impl TryFrom<ReferenceSpec> for ReferenceEfficiency {
    type Error = ScanError;

    fn try_from(spec: ReferenceSpec) -> Result<Self, Self::Error> {
        match spec {
            ReferenceSpec::Number(v) => ReferenceEfficiency::from_fraction(v),
            ReferenceSpec::Text(s) => s.parse(),
        }
    }
}

fn unit_hint(value: f64) -> String {
    if !value.is_finite() {
        return String::new();
    }
    if (1.0..=100.0).contains(&value) {
        format!(" (looks like a percentage; write \"{value}%\" or {})", value / 100.0)
    } else if value > 100.0 && value <= 10_000.0 {
        " (looks like a scaled percentage; use a fraction such as 0.95)".to_string()
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fractions_are_accepted() {
        let r = ReferenceEfficiency::from_fraction(0.95).unwrap();
        assert_eq!(r.fraction(), 0.95);
        assert!((r.percent() - 95.0).abs() < 1e-12);
    }

    #[test]
    fn percent_magnitudes_are_rejected() {
        for bad in [95.0, 9500.0, 1.0, 0.0, -0.5, f64::NAN] {
            let err = ReferenceEfficiency::from_fraction(bad).unwrap_err();
            assert!(matches!(err, ScanError::ReferenceUnitMismatch { .. }), "{bad}");
        }
        let msg = ReferenceEfficiency::from_fraction(95.0).unwrap_err().to_string();
        assert!(msg.contains("percentage"), "{msg}");
    }

    #[test]
    fn explicit_percent_is_converted() {
        let r: ReferenceEfficiency = "95%".parse().unwrap();
        assert!((r.fraction() - 0.95).abs() < 1e-12);
        let r: ReferenceEfficiency = " 0.9 ".parse().unwrap();
        assert!((r.fraction() - 0.9).abs() < 1e-12);
        assert!("95".parse::<ReferenceEfficiency>().is_err());
        assert_eq!(ReferenceEfficiency::from_fraction(0.07).unwrap().to_string(), "7%");
        assert!("abc%".parse::<ReferenceEfficiency>().is_err());
    }
}
