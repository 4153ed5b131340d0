//! Device lifecycle for the VNA stack.
//!
//! [`VnaPool`] owns at most one [`VnaHandle`] per serial port path; the
//! handle serializes all driver traffic for its device, holds the active
//! calibration profile, and runs calibration plans.
//!
//! ```rust,ignore
//! use vna_core::SweepConfig;
//! use vna_hardware::{PoolConfig, VnaPool};
//!
//! let pool = VnaPool::new(PoolConfig::default());
//! let device = pool.get("/dev/ttyACM0").await?;
//! device.set_sweep(SweepConfig::new(1e6, 900e6, 101)).await?;
//! let data = device.scan_corrected().await?;
//! println!("{}", data.to_touchstone());
//! ```

mod config;
mod handle;
mod pool;

pub use config::PoolConfig;
pub use handle::{CalibrationPrompt, VnaHandle};
pub use pool::{PortOpener, VnaPool};
