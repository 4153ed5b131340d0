//! Serial port abstraction consumed by the protocol drivers.
//!
//! Drivers talk to any `AsyncRead + AsyncWrite` byte stream. In production
//! that is a `tokio_serial::SerialStream` (behind the `serial` feature); in
//! tests it is one end of a `tokio::io::duplex` pair driven by a scripted
//! device emulator.
//!
//! There is no port-level read timeout: operations that need one (device
//! identification) scope a `tokio::time::timeout` around the read, and
//! everything else blocks until the device answers.

use tokio::io::{AsyncRead, AsyncWrite};

/// Trait alias for the byte-stream channel a VNA hangs off.
pub trait SerialPortIO: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> SerialPortIO for T {}

/// Type-erased boxed serial port. Dropping it closes the underlying channel.
pub type DynSerial = Box<dyn SerialPortIO>;

/// Open a serial port at `baud`, 8-N-1, no flow control.
///
/// Opening a port touches the OS synchronously, so it is pushed onto the
/// blocking pool; the returned stream is ready for async I/O.
#[cfg(feature = "serial")]
pub async fn open_serial(path: &str, baud: u32) -> crate::Result<DynSerial> {
    use tokio_serial::SerialPortBuilderExt;

    let path = path.to_string();
    let stream = tokio::task::spawn_blocking(move || {
        tokio_serial::new(&path, baud)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
    })
    .await
    .map_err(std::io::Error::other)??;

    Ok(Box::new(stream))
}
