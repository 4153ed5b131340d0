//! Short-Open-Load one-port calibration.
//!
//! A calibration plan names the reference standards to sweep; the captured
//! standards feed the SOL solver, which produces three complex error terms
//! per frequency:
//!
//! - directivity `e00`
//! - source match `e11`
//! - reflection tracking `e10·e01`
//!
//! Applying a profile inverts the one-port error model point by point:
//! `corrected = (m − e00) / (tracking + e11·(m − e00))`. Transmission (`s21`)
//! passes through unchanged; the one-port model says nothing about it.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::data::Measurement;
use crate::error::{Result, VnaError};
use crate::sweep::SweepConfig;

/// Absolute tolerance for frequency-grid agreement, in Hz.
///
/// This is a contract, not an implementation detail: grids that disagree by
/// more than this at any point do not combine, and there is no interpolation
/// fallback.
pub const FREQUENCY_TOLERANCE_HZ: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CalibrationMethod {
    Sol,
}

/// A physical reference standard the operator connects to the port.
///
/// `Thru` is reserved for future two-port work; SOL needs open/short/load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalibrationStandard {
    Open,
    Short,
    Load,
    Thru,
}

impl fmt::Display for CalibrationStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CalibrationStandard::Open => "open",
            CalibrationStandard::Short => "short",
            CalibrationStandard::Load => "load",
            CalibrationStandard::Thru => "thru",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationStep {
    pub standard: CalibrationStandard,
}

impl CalibrationStep {
    pub fn new(standard: CalibrationStandard) -> Self {
        Self { standard }
    }
}

/// Ordered description of a calibration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPlan {
    pub name: String,
    pub sweep: SweepConfig,
    pub steps: Vec<CalibrationStep>,
}

impl CalibrationPlan {
    /// A SOL plan sweeping open, short, load in that order.
    pub fn sol(name: impl Into<String>, sweep: SweepConfig) -> Self {
        Self {
            name: name.into(),
            sweep,
            steps: vec![
                CalibrationStep::new(CalibrationStandard::Open),
                CalibrationStep::new(CalibrationStandard::Short),
                CalibrationStep::new(CalibrationStandard::Load),
            ],
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(VnaError::EmptyPlan);
        }
        self.sweep.validate()
    }
}

/// Raw data captured while one standard was connected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationMeasurement {
    pub frequencies: Vec<f64>,
    pub s11: Vec<Complex64>,
    pub s21: Vec<Complex64>,
}

impl From<&Measurement> for CalibrationMeasurement {
    fn from(data: &Measurement) -> Self {
        Self {
            frequencies: data.frequencies.clone(),
            s11: data.s11.clone(),
            s21: data.s21.clone(),
        }
    }
}

/// Per-frequency SOL error terms, index-aligned with the profile grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationErrorTerms {
    /// `e00`
    pub directivity: Vec<Complex64>,
    /// `e11`
    pub source_match: Vec<Complex64>,
    /// `e10·e01`
    pub reflection_tracking: Vec<Complex64>,
}

/// A solved, validated calibration ready to correct measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    pub name: String,
    pub method: CalibrationMethod,
    pub created_at: DateTime<Utc>,
    pub sweep: SweepConfig,
    pub frequencies: Vec<f64>,
    pub standards: HashMap<CalibrationStandard, CalibrationMeasurement>,
    pub error_terms: CalibrationErrorTerms,
}

impl CalibrationProfile {
    /// Solve the SOL error terms from captured standards and assemble a
    /// validated profile.
    ///
    /// Requires open, short and load; all three grids must agree with the
    /// load grid within [`FREQUENCY_TOLERANCE_HZ`] pointwise.
    pub fn solve(
        name: impl Into<String>,
        sweep: SweepConfig,
        standards: HashMap<CalibrationStandard, CalibrationMeasurement>,
    ) -> Result<Self> {
        let load = require(&standards, CalibrationStandard::Load)?;
        let open = require(&standards, CalibrationStandard::Open)?;
        let short = require(&standards, CalibrationStandard::Short)?;

        if load.s11.is_empty() {
            return Err(VnaError::EmptyCalibration);
        }
        grids_match(&load.frequencies, &open.frequencies)?;
        grids_match(&load.frequencies, &short.frequencies)?;

        let count = load.s11.len();
        let mut directivity = Vec::with_capacity(count);
        let mut source_match = Vec::with_capacity(count);
        let mut reflection_tracking = Vec::with_capacity(count);

        let one = Complex64::new(1.0, 0.0);
        for i in 0..count {
            let e00 = load.s11[i];
            let lo = open.s11[i] - e00;
            let ls = short.s11[i] - e00;
            let denom = lo - ls;
            if denom == Complex64::new(0.0, 0.0) {
                return Err(VnaError::Singular {
                    freq_hz: load.frequencies[i],
                });
            }

            let e11 = (lo + ls) / denom;
            let tracking = -ls * (one + e11);

            directivity.push(e00);
            source_match.push(e11);
            reflection_tracking.push(tracking);
        }

        let profile = Self {
            name: name.into(),
            method: CalibrationMethod::Sol,
            created_at: Utc::now(),
            sweep,
            frequencies: load.frequencies.clone(),
            standards,
            error_terms: CalibrationErrorTerms {
                directivity,
                source_match,
                reflection_tracking,
            },
        };
        profile.validate()?;
        tracing::debug!(name = %profile.name, points = count, "SOL error terms solved");
        Ok(profile)
    }

    /// Consistency checks on an assembled profile: non-empty grid, error-term
    /// lengths, all SOL standards present and grid-aligned.
    pub fn validate(&self) -> Result<()> {
        if self.frequencies.is_empty() {
            return Err(VnaError::EmptyCalibration);
        }
        for terms in [
            &self.error_terms.directivity,
            &self.error_terms.source_match,
            &self.error_terms.reflection_tracking,
        ] {
            if terms.len() != self.frequencies.len() {
                return Err(VnaError::GridLength {
                    expected: self.frequencies.len(),
                    actual: terms.len(),
                });
            }
        }
        for standard in [
            CalibrationStandard::Open,
            CalibrationStandard::Short,
            CalibrationStandard::Load,
        ] {
            let captured = require(&self.standards, standard)?;
            grids_match(&self.frequencies, &captured.frequencies)?;
        }
        Ok(())
    }

    /// Correct a raw measurement with this profile.
    ///
    /// The measurement grid must match the profile grid in length and within
    /// [`FREQUENCY_TOLERANCE_HZ`] at every point. `s11` is corrected; `s21`
    /// and the frequencies are passed through.
    pub fn apply(&self, data: &Measurement) -> Result<Measurement> {
        grids_match(&self.frequencies, &data.frequencies)?;

        let mut corrected = Measurement {
            frequencies: data.frequencies.clone(),
            s11: Vec::with_capacity(data.s11.len()),
            s21: data.s21.clone(),
        };

        for (i, &m) in data.s11.iter().enumerate() {
            let e00 = self.error_terms.directivity[i];
            let e11 = self.error_terms.source_match[i];
            let tracking = self.error_terms.reflection_tracking[i];

            let numerator = m - e00;
            let denominator = tracking + e11 * (m - e00);
            if denominator == Complex64::new(0.0, 0.0) {
                return Err(VnaError::Singular {
                    freq_hz: data.frequencies[i],
                });
            }
            corrected.s11.push(numerator / denominator);
        }

        Ok(corrected)
    }
}

fn require<'a>(
    standards: &'a HashMap<CalibrationStandard, CalibrationMeasurement>,
    standard: CalibrationStandard,
) -> Result<&'a CalibrationMeasurement> {
    standards
        .get(&standard)
        .ok_or(VnaError::MissingStandard(standard))
}

/// Pointwise grid comparison against the contract tolerance.
fn grids_match(expected: &[f64], actual: &[f64]) -> Result<()> {
    if expected.len() != actual.len() {
        return Err(VnaError::GridLength {
            expected: expected.len(),
            actual: actual.len(),
        });
    }
    for (index, (&e, &a)) in expected.iter().zip(actual).enumerate() {
        if (e - a).abs() > FREQUENCY_TOLERANCE_HZ {
            return Err(VnaError::GridMismatch {
                index,
                expected_hz: e,
                actual_hz: a,
            });
        }
    }
    Ok(())
}
