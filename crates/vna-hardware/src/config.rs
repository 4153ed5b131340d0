//! Pool configuration.

use serde::{Deserialize, Serialize};

use vna_driver_nanovna::DialectOptions;

/// Settings for the connection pool, deserializable from TOML:
///
/// ```toml
/// baud_rate = 115200
///
/// [dialect]
/// identify_timeout_ms = 500
/// settle_ms = 100
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Serial link speed; both NanoVNA families run 115200 8-N-1.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Protocol-dialect timing knobs.
    #[serde(default)]
    pub dialect: DialectOptions,
}

fn default_baud_rate() -> u32 {
    115_200
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            baud_rate: default_baud_rate(),
            dialect: DialectOptions::default(),
        }
    }
}
