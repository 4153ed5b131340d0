//! Error types for the VNA stack.
//!
//! `VnaError` consolidates every failure the stack reports, from argument
//! validation through wire-protocol violations to calibration math. Variants
//! carry enough position information (row, field, frequency) for a caller to
//! point at the offending data without re-parsing anything.

use thiserror::Error;

use crate::calibration::CalibrationStandard;

/// Convenience alias for results using the stack-wide error type.
pub type Result<T> = std::result::Result<T, VnaError>;

#[derive(Error, Debug)]
pub enum VnaError {
    /// Sweep parameters rejected before reaching the device.
    #[error("invalid sweep: start {start_hz} Hz, stop {stop_hz} Hz, {points} points")]
    InvalidSweep {
        start_hz: f64,
        stop_hz: f64,
        points: usize,
    },

    /// Calibration plan carries no steps.
    #[error("calibration plan contains no steps")]
    EmptyPlan,

    /// No supported dialect claimed the device.
    #[error("device not supported: no dialect identified it")]
    Unidentified,

    /// A data row carried fewer fields than the wire format requires.
    #[error("row {row}: expected 5 fields, got {count}")]
    FieldCount { row: usize, count: usize },

    /// A data field failed to parse as a float.
    #[error("row {row}: could not parse {field} from {value:?}")]
    Malformed {
        row: usize,
        field: &'static str,
        value: String,
    },

    /// The device stopped emitting rows before the sweep completed.
    #[error("scan ended early: received {received} rows, expected {expected}")]
    ScanTruncated { received: usize, expected: usize },

    /// FIFO payload length disagrees with the configured sweep.
    #[error("FIFO payload of {len} bytes does not match expected {expected}")]
    FifoLength { len: usize, expected: usize },

    /// Underlying port read/write failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port open/configure failure.
    #[cfg(feature = "serial")]
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    /// The device did not answer within the identification window.
    #[error("read timed out")]
    ReadTimeout,

    /// Scan requested before any sweep was configured.
    #[error("no sweep configured")]
    NoSweep,

    /// A required calibration standard was never captured.
    #[error("missing measurement for the {0} standard")]
    MissingStandard(CalibrationStandard),

    /// Captured calibration data is empty.
    #[error("calibration data is empty")]
    EmptyCalibration,

    /// Frequency grids differ in length.
    #[error("frequency grid length mismatch: expected {expected}, got {actual}")]
    GridLength { expected: usize, actual: usize },

    /// Frequency grids disagree beyond the contract tolerance.
    #[error(
        "frequency grid mismatch at index {index}: expected {expected_hz} Hz, got {actual_hz} Hz"
    )]
    GridMismatch {
        index: usize,
        expected_hz: f64,
        actual_hz: f64,
    },

    /// Calibration arithmetic hit a zero denominator.
    #[error("singular calibration system at {freq_hz} Hz")]
    Singular { freq_hz: f64 },

    /// The operator prompt reported a failure; the plan is aborted.
    #[error("calibration prompt failed: {0}")]
    Prompt(anyhow::Error),

    /// Cancellation signal observed at a step boundary.
    #[error("operation canceled")]
    Canceled,

    /// Operation attempted on a handle that has been closed.
    #[error("device handle is closed")]
    Closed,
}
