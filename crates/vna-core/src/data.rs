//! Measurement data: per-point S-parameters plus export helpers.

use std::fmt::Write as _;

use chrono::Utc;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// VSWR reported when `|S11| >= 1` (total or over-unity reflection).
const VSWR_SATURATED: f64 = 9999.0;

/// One sweep's worth of raw or corrected S-parameter rows.
///
/// The three vectors are index-aligned: `frequencies[i]` is the stimulus for
/// `s11[i]` and `s21[i]`. After a successful scan all three have exactly the
/// configured sweep's point count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub frequencies: Vec<f64>,
    pub s11: Vec<Complex64>,
    pub s21: Vec<Complex64>,
}

impl Measurement {
    pub fn with_capacity(points: usize) -> Self {
        Self {
            frequencies: Vec::with_capacity(points),
            s11: Vec::with_capacity(points),
            s21: Vec::with_capacity(points),
        }
    }

    /// Number of sweep points captured.
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// Render the measurement as Touchstone text.
    ///
    /// Emits `!`-prefixed comment lines, the `# Hz S RI R 50` option line,
    /// then one `<freq> <s11 re> <s11 im> <s21 re> <s21 im>` row per point
    /// with six fractional digits and the frequency truncated to an integer.
    pub fn to_touchstone(&self) -> String {
        let mut out = String::new();
        out.push_str("! VNA data export\n");
        let _ = writeln!(out, "! Date: {}", Utc::now().to_rfc3339());
        out.push_str("# Hz S RI R 50\n");
        for i in 0..self.len() {
            let _ = writeln!(
                out,
                "{} {:.6} {:.6} {:.6} {:.6}",
                self.frequencies[i] as i64,
                self.s11[i].re,
                self.s11[i].im,
                self.s21[i].re,
                self.s21[i].im,
            );
        }
        out
    }

    /// Voltage standing-wave ratio derived from `|S11|`, per point.
    pub fn vswr(&self) -> Vec<f64> {
        self.s11
            .iter()
            .map(|s| {
                let gamma = s.norm();
                if gamma >= 1.0 {
                    VSWR_SATURATED
                } else {
                    (1.0 + gamma) / (1.0 - gamma)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Measurement {
        Measurement {
            frequencies: vec![1_000_000.0, 2_000_000.0],
            s11: vec![Complex64::new(0.5, -0.5), Complex64::new(0.0, 0.0)],
            s21: vec![Complex64::new(0.1, -0.1), Complex64::new(1.0, 0.0)],
        }
    }

    #[test]
    fn touchstone_has_header_and_rows() {
        let text = sample().to_touchstone();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with('!'));
        assert!(lines[1].starts_with("! Date:"));
        assert_eq!(lines[2], "# Hz S RI R 50");
        assert_eq!(lines[3], "1000000 0.500000 -0.500000 0.100000 -0.100000");
        assert_eq!(lines[4], "2000000 0.000000 0.000000 1.000000 0.000000");
    }

    #[test]
    fn vswr_of_matched_load_is_one() {
        let data = Measurement {
            frequencies: vec![1e6],
            s11: vec![Complex64::new(0.0, 0.0)],
            s21: vec![Complex64::new(0.0, 0.0)],
        };
        assert_eq!(data.vswr(), vec![1.0]);
    }

    #[test]
    fn vswr_of_half_reflection() {
        let data = Measurement {
            frequencies: vec![1e6],
            s11: vec![Complex64::new(0.5, 0.0)],
            s21: vec![Complex64::new(0.0, 0.0)],
        };
        let vswr = data.vswr();
        assert!((vswr[0] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn vswr_saturates_at_total_reflection() {
        let data = Measurement {
            frequencies: vec![1e6, 1e6],
            s11: vec![Complex64::new(1.0, 0.0), Complex64::new(0.8, 0.8)],
            s21: vec![Complex64::new(0.0, 0.0); 2],
        };
        assert_eq!(data.vswr(), vec![VSWR_SATURATED, VSWR_SATURATED]);
    }
}
