//! NanoVNA V2 / LiteVNA driver (register-oriented binary protocol).
//!
//! Protocol overview:
//! - Host sends opcode frames; all multi-byte values are little-endian
//! - `READ 0xF0` answers one byte naming the device variant (2 or 4)
//! - Sweep setup is three register writes: start (u64), step (u64),
//!   point count (u16)
//! - `READFIFO 0x30` streams `32 × points` bytes, one 32-byte record per
//!   sweep point; frequencies are synthesized host-side, the device never
//!   transmits them
//!
//! Record layout (offsets in bytes): S11 re/im f32 at 0/4, S12 (ignored) at
//! 8..16, S21 re/im f32 at 16/20, S22 (ignored) at 24..32.

use num_complex::Complex64;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, instrument};

use vna_core::data::Measurement;
use vna_core::error::{Result, VnaError};
use vna_core::serial::DynSerial;
use vna_core::sweep::SweepConfig;

use crate::options::DialectOptions;

const OP_NOP: u8 = 0x00;
const OP_READ: u8 = 0x10;
const OP_WRITE2: u8 = 0x21;
const OP_WRITE4: u8 = 0x22;
/// 64-bit register write is encoded as `opWRITE4 + 2`.
const OP_WRITE8: u8 = OP_WRITE4 + 2;
const OP_READ_FIFO: u8 = 0x18;

const REG_SWEEP_START: u8 = 0x00;
const REG_SWEEP_STEP: u8 = 0x10;
const REG_SWEEP_POINTS: u8 = 0x20;
const REG_VALS_FIFO: u8 = 0x30;
const REG_DEVICE_VARIANT: u8 = 0xF0;

const VARIANT_V2: u8 = 2;
const VARIANT_V2_PLUS4: u8 = 4;

/// Bytes per FIFO record (S11, S12, S21, S22 as f32 re/im pairs).
const FIFO_RECORD_LEN: usize = 32;

pub struct V2Driver {
    port: BufReader<DynSerial>,
    sweep: Option<SweepConfig>,
    options: DialectOptions,
}

impl V2Driver {
    /// Construct the driver and realign the device's command framing.
    ///
    /// Eight NOPs flush out any half-received previous command; a device in
    /// sync ignores them.
    pub async fn new(port: DynSerial, options: DialectOptions) -> Result<Self> {
        Self::from_buffered(BufReader::new(port), options).await
    }

    pub(crate) async fn from_buffered(
        mut port: BufReader<DynSerial>,
        options: DialectOptions,
    ) -> Result<Self> {
        port.get_mut().write_all(&[OP_NOP; 8]).await?;
        port.get_mut().flush().await?;
        Ok(Self {
            port,
            sweep: None,
            options,
        })
    }

    /// Probe the device identity by reading the variant register.
    ///
    /// Variants 2 (V2) and 4 (V2Plus4) are accepted; the answer must arrive
    /// within the identify timeout.
    #[instrument(skip(self), err(level = "debug"))]
    pub async fn identify(&mut self) -> Result<String> {
        self.port
            .get_mut()
            .write_all(&[OP_READ, REG_DEVICE_VARIANT])
            .await?;
        self.port.get_mut().flush().await?;

        let mut variant = [0u8; 1];
        tokio::time::timeout(
            self.options.identify_timeout(),
            self.port.read_exact(&mut variant),
        )
        .await
        .map_err(|_| VnaError::ReadTimeout)??;

        match variant[0] {
            VARIANT_V2 | VARIANT_V2_PLUS4 => Ok(format!("NanoVNA_V2 (Variant {})", variant[0])),
            other => {
                debug!(variant = other, "variant register does not name a V2 device");
                Err(VnaError::Unidentified)
            }
        }
    }

    /// Push the sweep registers: start, step, point count, in that order.
    pub async fn set_sweep(&mut self, config: SweepConfig) -> Result<()> {
        let step = config.step_hz();
        self.write_reg_u64(REG_SWEEP_START, config.start_hz as u64)
            .await?;
        self.write_reg_u64(REG_SWEEP_STEP, step as u64).await?;
        self.write_reg_u16(REG_SWEEP_POINTS, config.points as u16)
            .await?;
        self.sweep = Some(config);
        Ok(())
    }

    /// Drain one sweep's worth of FIFO records.
    ///
    /// Reads exactly `32 × points` bytes and never more; a short read is an
    /// I/O error. Frequencies come from the sweep configuration, not the
    /// wire.
    #[instrument(skip(self), err(level = "debug"))]
    pub async fn scan(&mut self) -> Result<Measurement> {
        let sweep = self.sweep.ok_or(VnaError::NoSweep)?;

        // Third byte is reserved by the protocol.
        self.port
            .get_mut()
            .write_all(&[OP_READ_FIFO, REG_VALS_FIFO, 0x00])
            .await?;
        self.port.get_mut().flush().await?;

        let mut payload = vec![0u8; sweep.points * FIFO_RECORD_LEN];
        self.port.read_exact(&mut payload).await?;

        let data = parse_fifo(&sweep, &payload)?;
        debug!(points = data.len(), "FIFO scan complete");
        Ok(data)
    }

    async fn write_reg_u64(&mut self, addr: u8, value: u64) -> Result<()> {
        let mut frame = [0u8; 10];
        frame[0] = OP_WRITE8;
        frame[1] = addr;
        frame[2..].copy_from_slice(&value.to_le_bytes());
        self.port.get_mut().write_all(&frame).await?;
        self.port.get_mut().flush().await?;
        Ok(())
    }

    async fn write_reg_u16(&mut self, addr: u8, value: u16) -> Result<()> {
        let mut frame = [0u8; 4];
        frame[0] = OP_WRITE2;
        frame[1] = addr;
        frame[2..].copy_from_slice(&value.to_le_bytes());
        self.port.get_mut().write_all(&frame).await?;
        self.port.get_mut().flush().await?;
        Ok(())
    }
}

/// Decode a FIFO payload into a measurement.
///
/// The payload must be a nonzero multiple of the record length and match the
/// configured point count exactly.
fn parse_fifo(sweep: &SweepConfig, payload: &[u8]) -> Result<Measurement> {
    let expected = sweep.points * FIFO_RECORD_LEN;
    if payload.is_empty() || payload.len() % FIFO_RECORD_LEN != 0 || payload.len() != expected {
        return Err(VnaError::FifoLength {
            len: payload.len(),
            expected,
        });
    }

    let mut data = Measurement::with_capacity(sweep.points);
    for (i, record) in payload.chunks_exact(FIFO_RECORD_LEN).enumerate() {
        data.frequencies.push(sweep.frequency_hz(i));
        data.s11.push(complex_at(record, 0));
        data.s21.push(complex_at(record, 16));
    }
    Ok(data)
}

/// Read an f32 re/im pair at `offset` within a record, widened to f64.
fn complex_at(record: &[u8], offset: usize) -> Complex64 {
    let re = f32::from_le_bytes([
        record[offset],
        record[offset + 1],
        record[offset + 2],
        record[offset + 3],
    ]);
    let im = f32::from_le_bytes([
        record[offset + 4],
        record[offset + 5],
        record[offset + 6],
        record[offset + 7],
    ]);
    Complex64::new(f64::from(re), f64::from(im))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn fast_options() -> DialectOptions {
        DialectOptions {
            identify_timeout_ms: 100,
            settle_ms: 0,
        }
    }

    async fn test_driver() -> (tokio::io::DuplexStream, V2Driver) {
        let (host, device) = tokio::io::duplex(4096);
        let driver = V2Driver::new(Box::new(device), fast_options())
            .await
            .unwrap();
        (host, driver)
    }

    /// Build one 32-byte FIFO record from the four f32 pairs.
    fn record(s11: (f32, f32), s21: (f32, f32)) -> [u8; 32] {
        let mut buf = [0u8; 32];
        buf[0..4].copy_from_slice(&s11.0.to_le_bytes());
        buf[4..8].copy_from_slice(&s11.1.to_le_bytes());
        buf[16..20].copy_from_slice(&s21.0.to_le_bytes());
        buf[20..24].copy_from_slice(&s21.1.to_le_bytes());
        buf
    }

    #[tokio::test]
    async fn construction_sends_the_nop_flush() -> anyhow::Result<()> {
        let (mut host, _driver) = test_driver().await;
        let mut flush = [0u8; 8];
        host.read_exact(&mut flush).await?;
        assert_eq!(flush, [OP_NOP; 8]);
        Ok(())
    }

    #[tokio::test]
    async fn identify_names_the_variant() -> anyhow::Result<()> {
        let (mut host, mut driver) = test_driver().await;

        host.write_all(&[0x02]).await?;
        let identity = driver.identify().await?;
        assert_eq!(identity, "NanoVNA_V2 (Variant 2)");

        let mut sent = [0u8; 10];
        host.read_exact(&mut sent).await?;
        assert_eq!(&sent[8..], &[OP_READ, REG_DEVICE_VARIANT]);
        Ok(())
    }

    #[tokio::test]
    async fn identify_accepts_plus4_variant() -> anyhow::Result<()> {
        let (mut host, mut driver) = test_driver().await;
        host.write_all(&[0x04]).await?;
        assert_eq!(driver.identify().await?, "NanoVNA_V2 (Variant 4)");
        Ok(())
    }

    #[tokio::test]
    async fn identify_rejects_unknown_variant() {
        let (mut host, mut driver) = test_driver().await;
        host.write_all(&[0x07]).await.unwrap();
        assert!(matches!(
            driver.identify().await,
            Err(VnaError::Unidentified)
        ));
    }

    #[tokio::test]
    async fn set_sweep_writes_the_three_registers() -> anyhow::Result<()> {
        let (mut host, mut driver) = test_driver().await;

        driver.set_sweep(SweepConfig::new(1e6, 9e6, 5)).await?;

        // 8-byte NOP flush, then 10 + 10 + 4 bytes of register writes.
        let mut sent = [0u8; 32];
        host.read_exact(&mut sent).await?;

        let start = &sent[8..18];
        assert_eq!(start[0], OP_WRITE8);
        assert_eq!(start[1], REG_SWEEP_START);
        assert_eq!(u64::from_le_bytes(start[2..10].try_into()?), 1_000_000);

        let step = &sent[18..28];
        assert_eq!(step[0], OP_WRITE8);
        assert_eq!(step[1], REG_SWEEP_STEP);
        assert_eq!(u64::from_le_bytes(step[2..10].try_into()?), 2_000_000);

        let points = &sent[28..32];
        assert_eq!(points[0], OP_WRITE2);
        assert_eq!(points[1], REG_SWEEP_POINTS);
        assert_eq!(u16::from_le_bytes(points[2..4].try_into()?), 5);
        Ok(())
    }

    #[tokio::test]
    async fn scan_parses_one_record() -> anyhow::Result<()> {
        let (mut host, mut driver) = test_driver().await;

        driver.set_sweep(SweepConfig::new(1e6, 1e6, 1)).await?;
        host.write_all(&record((0.5, -0.5), (0.1, -0.1))).await?;

        let data = driver.scan().await?;
        assert_eq!(data.len(), 1);
        assert!((data.frequencies[0] - 1_000_000.0).abs() < 1e-6);
        assert!((data.s11[0] - Complex64::new(0.5, -0.5)).norm() < 1e-6);
        assert!((data.s21[0] - Complex64::new(0.1, -0.1)).norm() < 1e-6);
        Ok(())
    }

    #[tokio::test]
    async fn scan_synthesizes_the_frequency_grid() -> anyhow::Result<()> {
        let (mut host, mut driver) = test_driver().await;

        driver.set_sweep(SweepConfig::new(1e6, 5e6, 3)).await?;
        for _ in 0..3 {
            host.write_all(&record((0.0, 0.0), (0.0, 0.0))).await?;
        }

        let data = driver.scan().await?;
        for (i, expected) in [1e6, 3e6, 5e6].iter().enumerate() {
            assert!((data.frequencies[i] - expected).abs() < 1e-6);
        }
        Ok(())
    }

    #[tokio::test]
    async fn truncated_fifo_is_an_error() {
        let (mut host, mut driver) = test_driver().await;

        driver
            .set_sweep(SweepConfig::new(1e6, 2e6, 2))
            .await
            .unwrap();
        // One record instead of two, then silence.
        host.write_all(&record((0.0, 0.0), (0.0, 0.0)))
            .await
            .unwrap();
        host.shutdown().await.unwrap();

        assert!(matches!(driver.scan().await, Err(VnaError::Io(_))));
    }

    #[tokio::test]
    async fn scan_without_sweep_is_rejected() {
        let (_host, mut driver) = test_driver().await;
        assert!(matches!(driver.scan().await, Err(VnaError::NoSweep)));
    }

    #[test]
    fn fifo_length_must_match_the_sweep() {
        let sweep = SweepConfig::new(1e6, 2e6, 2);
        assert!(matches!(
            parse_fifo(&sweep, &[0u8; 32]),
            Err(VnaError::FifoLength {
                len: 32,
                expected: 64
            })
        ));
        assert!(matches!(
            parse_fifo(&sweep, &[]),
            Err(VnaError::FifoLength { len: 0, .. })
        ));
        assert!(matches!(
            parse_fifo(&sweep, &[0u8; 40]),
            Err(VnaError::FifoLength { len: 40, .. })
        ));
    }
}
