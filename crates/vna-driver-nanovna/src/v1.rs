//! NanoVNA V1 family driver (line-oriented ASCII protocol).
//!
//! Protocol overview:
//! - Commands terminated by LF: `version`, `sweep <start> <stop> <points>`,
//!   `data`
//! - `data` emits one `freq s11_re s11_im s21_re s21_im` row per sweep point,
//!   whitespace-separated floats, LF-terminated
//! - Identification: the `version` banner contains "NanoVNA" (any case)

use num_complex::Complex64;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, instrument};

use vna_core::data::Measurement;
use vna_core::error::{Result, VnaError};
use vna_core::serial::DynSerial;
use vna_core::sweep::SweepConfig;

use crate::options::DialectOptions;

pub struct V1Driver {
    port: BufReader<DynSerial>,
    sweep: Option<SweepConfig>,
    options: DialectOptions,
}

impl V1Driver {
    pub fn new(port: DynSerial, options: DialectOptions) -> Self {
        Self::from_buffered(BufReader::new(port), options)
    }

    pub(crate) fn from_buffered(port: BufReader<DynSerial>, options: DialectOptions) -> Self {
        Self {
            port,
            sweep: None,
            options,
        }
    }

    /// Hand the port back, e.g. so the next dialect can probe it.
    pub(crate) fn into_buffered(self) -> BufReader<DynSerial> {
        self.port
    }

    /// Probe the device identity.
    ///
    /// Sends `version` and reads a single banner line under the identify
    /// timeout. A device that prints extra lines before the banner is not
    /// recognized here; the V2 probe runs next in that case.
    #[instrument(skip(self), err(level = "debug"))]
    pub async fn identify(&mut self) -> Result<String> {
        self.port.get_mut().write_all(b"version\n").await?;
        self.port.get_mut().flush().await?;

        let mut line = String::new();
        let n = tokio::time::timeout(
            self.options.identify_timeout(),
            self.port.read_line(&mut line),
        )
        .await
        .map_err(|_| VnaError::ReadTimeout)??;
        if n == 0 {
            return Err(VnaError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "port closed during identification",
            )));
        }

        if line.to_lowercase().contains("nanovna") {
            Ok(line.trim().to_string())
        } else {
            debug!(banner = %line.trim(), "version response does not name a NanoVNA");
            Err(VnaError::Unidentified)
        }
    }

    /// Configure the sweep. Remembered locally so [`scan`](Self::scan) knows
    /// how many rows to expect; start/stop go out truncated to whole Hz.
    pub async fn set_sweep(&mut self, config: SweepConfig) -> Result<()> {
        let cmd = format!(
            "sweep {} {} {}\n",
            config.start_hz as i64, config.stop_hz as i64, config.points
        );
        self.port.get_mut().write_all(cmd.as_bytes()).await?;
        self.port.get_mut().flush().await?;
        self.sweep = Some(config);
        Ok(())
    }

    /// Trigger a sweep and collect one row per configured point.
    #[instrument(skip(self), err(level = "debug"))]
    pub async fn scan(&mut self) -> Result<Measurement> {
        let sweep = self.sweep.ok_or(VnaError::NoSweep)?;

        self.port.get_mut().write_all(b"data\n").await?;
        self.port.get_mut().flush().await?;

        // Give the firmware a moment to start emitting rows.
        tokio::time::sleep(self.options.settle()).await;

        let mut data = Measurement::with_capacity(sweep.points);
        for row in 0..sweep.points {
            let mut line = String::new();
            let n = self.port.read_line(&mut line).await?;
            if n == 0 {
                return Err(VnaError::ScanTruncated {
                    received: row,
                    expected: sweep.points,
                });
            }
            let (freq, s11, s21) = parse_row(row + 1, &line)?;
            data.frequencies.push(freq);
            data.s11.push(s11);
            data.s21.push(s21);
        }
        debug!(points = data.len(), "scan complete");
        Ok(data)
    }
}

/// Parse one `freq s11_re s11_im s21_re s21_im` row. `row` is 1-based for
/// error reporting.
fn parse_row(row: usize, line: &str) -> Result<(f64, Complex64, Complex64)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 5 {
        return Err(VnaError::FieldCount {
            row,
            count: fields.len(),
        });
    }

    let freq = parse_field(row, "frequency", fields[0])?;
    let s11_re = parse_field(row, "S11 real", fields[1])?;
    let s11_im = parse_field(row, "S11 imaginary", fields[2])?;
    let s21_re = parse_field(row, "S21 real", fields[3])?;
    let s21_im = parse_field(row, "S21 imaginary", fields[4])?;

    Ok((
        freq,
        Complex64::new(s11_re, s11_im),
        Complex64::new(s21_re, s21_im),
    ))
}

fn parse_field(row: usize, field: &'static str, raw: &str) -> Result<f64> {
    raw.parse().map_err(|_| VnaError::Malformed {
        row,
        field,
        value: raw.to_string(),
    })
}
