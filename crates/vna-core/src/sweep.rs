//! Linear frequency sweep description.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VnaError};

/// A linear frequency grid: `points` samples from `start_hz` to `stop_hz`.
///
/// Immutable value type; drivers remember the most recent one to know how
/// much data a scan will produce, and calibration profiles pin the one they
/// were acquired with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    pub start_hz: f64,
    pub stop_hz: f64,
    pub points: usize,
}

impl SweepConfig {
    pub fn new(start_hz: f64, stop_hz: f64, points: usize) -> Self {
        Self {
            start_hz,
            stop_hz,
            points,
        }
    }

    /// Check the caller-facing invariants: ascending range, at least one point.
    pub fn validate(&self) -> Result<()> {
        if self.start_hz >= self.stop_hz || self.points == 0 {
            return Err(VnaError::InvalidSweep {
                start_hz: self.start_hz,
                stop_hz: self.stop_hz,
                points: self.points,
            });
        }
        Ok(())
    }

    /// Spacing between adjacent sweep points.
    ///
    /// A single-point sweep has zero spacing, so its one synthesized
    /// frequency is exactly `start_hz`.
    pub fn step_hz(&self) -> f64 {
        if self.points > 1 {
            (self.stop_hz - self.start_hz) / (self.points - 1) as f64
        } else {
            0.0
        }
    }

    /// Frequency of sweep point `i`.
    pub fn frequency_hz(&self, i: usize) -> f64 {
        self.start_hz + i as f64 * self.step_hz()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ascending_sweep() {
        assert!(SweepConfig::new(1e6, 900e6, 101).validate().is_ok());
    }

    #[test]
    fn rejects_reversed_and_degenerate_ranges() {
        assert!(matches!(
            SweepConfig::new(900e6, 1e6, 101).validate(),
            Err(VnaError::InvalidSweep { .. })
        ));
        assert!(matches!(
            SweepConfig::new(1e6, 1e6, 101).validate(),
            Err(VnaError::InvalidSweep { .. })
        ));
        assert!(matches!(
            SweepConfig::new(1e6, 900e6, 0).validate(),
            Err(VnaError::InvalidSweep { .. })
        ));
    }

    #[test]
    fn step_spans_the_grid() {
        let sweep = SweepConfig::new(1e6, 9e6, 5);
        assert_eq!(sweep.step_hz(), 2e6);
        assert_eq!(sweep.frequency_hz(0), 1e6);
        assert_eq!(sweep.frequency_hz(4), 9e6);
    }

    #[test]
    fn single_point_sweep_has_zero_step() {
        let sweep = SweepConfig::new(1e6, 1e6, 1);
        assert_eq!(sweep.step_hz(), 0.0);
        assert_eq!(sweep.frequency_hz(0), 1e6);
    }

    #[test]
    fn deserializes_from_toml() {
        let sweep: SweepConfig =
            toml::from_str("start_hz = 1e6\nstop_hz = 9e8\npoints = 101").unwrap();
        assert_eq!(sweep.points, 101);
    }
}
