//! Dialect tunables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing knobs shared by both protocol dialects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialectOptions {
    /// How long identification waits for the device to answer, in
    /// milliseconds. Outside identification, reads block until the device
    /// responds.
    #[serde(default = "default_identify_timeout_ms")]
    pub identify_timeout_ms: u64,

    /// Delay between the ASCII scan trigger and the first data row, in
    /// milliseconds. Empirical: stock V1 firmware needs roughly this long
    /// before it starts emitting rows.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

fn default_identify_timeout_ms() -> u64 {
    500
}

fn default_settle_ms() -> u64 {
    100
}

impl Default for DialectOptions {
    fn default() -> Self {
        Self {
            identify_timeout_ms: default_identify_timeout_ms(),
            settle_ms: default_settle_ms(),
        }
    }
}

impl DialectOptions {
    pub fn identify_timeout(&self) -> Duration {
        Duration::from_millis(self.identify_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}
