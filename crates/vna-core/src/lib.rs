//! Core types for the VNA control stack.
//!
//! This crate provides the foundation shared by the protocol drivers and the
//! device-lifecycle layer:
//!
//! - [`error::VnaError`]: the stack-wide error type
//! - [`serial`]: the byte-stream port abstraction drivers talk through
//! - [`sweep::SweepConfig`]: linear frequency sweep description
//! - [`data::Measurement`]: per-point S-parameter rows plus Touchstone/VSWR
//!   export
//! - [`calibration`]: Short-Open-Load one-port calibration (plan types,
//!   error-term solver, application to measured data)
//!
//! Protocol dialects live in `vna-driver-nanovna`; the connection pool and
//! device handle live in `vna-hardware`.

pub mod calibration;
pub mod data;
pub mod error;
pub mod serial;
pub mod sweep;

pub use calibration::{
    CalibrationMeasurement, CalibrationMethod, CalibrationPlan, CalibrationProfile,
    CalibrationStandard, CalibrationStep, FREQUENCY_TOLERANCE_HZ,
};
pub use data::Measurement;
pub use error::{Result, VnaError};
pub use serial::{DynSerial, SerialPortIO};
pub use sweep::SweepConfig;
