//! Dialect auto-detection.
//!
//! The two NanoVNA families are wire-incompatible, so a freshly opened port
//! is probed one dialect at a time: V1 first (text `version` query), then V2
//! (variant register read, preceded by the framing NOP flush). The first
//! dialect whose identification succeeds claims the device.

use tokio::io::BufReader;
use tracing::{debug, info, instrument};

use vna_core::data::Measurement;
use vna_core::error::{Result, VnaError};
use vna_core::serial::DynSerial;
use vna_core::sweep::SweepConfig;

use crate::options::DialectOptions;
use crate::v1::V1Driver;
use crate::v2::V2Driver;

/// The driver variant that claimed a device. The set is closed; dispatch is
/// a match, not a vtable.
///
/// Dropping the driver closes the underlying port.
pub enum NanoVnaDriver {
    V1(V1Driver),
    V2(V2Driver),
}

impl NanoVnaDriver {
    pub async fn identify(&mut self) -> Result<String> {
        match self {
            NanoVnaDriver::V1(driver) => driver.identify().await,
            NanoVnaDriver::V2(driver) => driver.identify().await,
        }
    }

    pub async fn set_sweep(&mut self, config: SweepConfig) -> Result<()> {
        match self {
            NanoVnaDriver::V1(driver) => driver.set_sweep(config).await,
            NanoVnaDriver::V2(driver) => driver.set_sweep(config).await,
        }
    }

    pub async fn scan(&mut self) -> Result<Measurement> {
        match self {
            NanoVnaDriver::V1(driver) => driver.scan().await,
            NanoVnaDriver::V2(driver) => driver.scan().await,
        }
    }

    /// Short dialect tag for logging.
    pub fn dialect(&self) -> &'static str {
        match self {
            NanoVnaDriver::V1(_) => "v1",
            NanoVnaDriver::V2(_) => "v2",
        }
    }
}

/// Probe `port` for a supported dialect.
///
/// Ownership of the port moves into the winning driver. When no dialect
/// claims the device the port is dropped here, which closes it.
#[instrument(skip_all, err(level = "debug"))]
pub async fn detect(port: DynSerial, options: DialectOptions) -> Result<NanoVnaDriver> {
    let mut v1 = V1Driver::from_buffered(BufReader::new(port), options.clone());
    match v1.identify().await {
        Ok(identity) => {
            info!(dialect = "v1", %identity, "device identified");
            return Ok(NanoVnaDriver::V1(v1));
        }
        Err(err) => debug!(dialect = "v1", %err, "probe failed"),
    }

    // The V2 constructor's NOP flush also clears out whatever the V1 probe
    // left half-consumed on the wire.
    let mut v2 = V2Driver::from_buffered(v1.into_buffered(), options).await?;
    match v2.identify().await {
        Ok(identity) => {
            info!(dialect = "v2", %identity, "device identified");
            return Ok(NanoVnaDriver::V2(v2));
        }
        Err(err) => debug!(dialect = "v2", %err, "probe failed"),
    }

    Err(VnaError::Unidentified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn fast_options() -> DialectOptions {
        DialectOptions {
            identify_timeout_ms: 50,
            settle_ms: 0,
        }
    }

    #[tokio::test]
    async fn v1_device_claims_the_port_first() -> anyhow::Result<()> {
        let (mut host, device) = tokio::io::duplex(4096);

        let emulator = tokio::spawn(async move {
            let mut cmd = [0u8; 8];
            host.read_exact(&mut cmd).await.unwrap();
            assert_eq!(&cmd, b"version\n");
            host.write_all(b"NanoVNA H\n").await.unwrap();
            host
        });

        let driver = detect(Box::new(device), fast_options()).await?;
        assert_eq!(driver.dialect(), "v1");
        emulator.await?;
        Ok(())
    }

    #[tokio::test]
    async fn silent_v1_falls_through_to_v2() -> anyhow::Result<()> {
        let (mut host, device) = tokio::io::duplex(4096);

        let emulator = tokio::spawn(async move {
            // V1 probe: `version\n`, left unanswered.
            let mut cmd = [0u8; 8];
            host.read_exact(&mut cmd).await.unwrap();
            assert_eq!(&cmd, b"version\n");
            // V2 probe: 8-byte NOP flush plus the variant read.
            let mut cmd = [0u8; 10];
            host.read_exact(&mut cmd).await.unwrap();
            assert_eq!(cmd, [0, 0, 0, 0, 0, 0, 0, 0, 0x10, 0xF0]);
            host.write_all(&[0x02]).await.unwrap();
        });

        let driver = detect(Box::new(device), fast_options()).await?;
        assert_eq!(driver.dialect(), "v2");
        emulator.await?;
        Ok(())
    }

    #[tokio::test]
    async fn unsupported_device_is_reported() {
        let (mut host, device) = tokio::io::duplex(4096);

        let emulator = tokio::spawn(async move {
            let mut cmd = [0u8; 8];
            host.read_exact(&mut cmd).await.unwrap();
            // Answer the V1 probe with a foreign banner...
            host.write_all(b"unrelated gadget\n").await.unwrap();
            // ...and the V2 probe with an unknown variant.
            let mut cmd = [0u8; 10];
            host.read_exact(&mut cmd).await.unwrap();
            host.write_all(&[0x09]).await.unwrap();
        });

        let result = detect(Box::new(device), fast_options()).await;
        assert!(matches!(result, Err(VnaError::Unidentified)));
        emulator.await.unwrap();
    }
}
