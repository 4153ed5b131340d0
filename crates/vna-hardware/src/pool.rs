//! Connection pool: at most one device handle per serial port path.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::RwLock;
use tracing::{info, instrument};

use vna_core::error::Result;
use vna_core::serial::DynSerial;
use vna_driver_nanovna::detect;

use crate::config::PoolConfig;
use crate::handle::VnaHandle;

/// Async factory producing a byte stream for a port path at a baud rate.
/// Tests and simulators inject one; the `serial` feature supplies the real
/// tokio-serial opener.
pub type PortOpener = Box<dyn Fn(String, u32) -> BoxFuture<'static, Result<DynSerial>> + Send + Sync>;

pub struct VnaPool {
    devices: RwLock<HashMap<String, Arc<VnaHandle>>>,
    opener: PortOpener,
    config: PoolConfig,
}

impl VnaPool {
    /// Pool backed by real serial ports.
    #[cfg(feature = "serial")]
    pub fn new(config: PoolConfig) -> Self {
        Self::with_opener(
            config,
            Box::new(|path, baud| {
                Box::pin(async move { vna_core::serial::open_serial(&path, baud).await })
            }),
        )
    }

    /// Pool with an injected port factory.
    pub fn with_opener(config: PoolConfig, opener: PortOpener) -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
            opener,
            config,
        }
    }

    /// Fetch the handle for `path`, opening and probing the device on first
    /// use.
    ///
    /// Lookups take the map's shared lock. On a miss the exclusive lock is
    /// taken and the map re-checked before opening, so a storm of concurrent
    /// `get`s for a cold path still produces exactly one probe and one
    /// handle.
    #[instrument(skip(self), err(level = "debug"))]
    pub async fn get(&self, path: &str) -> Result<Arc<VnaHandle>> {
        if let Some(handle) = self.devices.read().await.get(path) {
            return Ok(handle.clone());
        }

        let mut devices = self.devices.write().await;
        if let Some(handle) = devices.get(path) {
            return Ok(handle.clone());
        }

        let port = (self.opener)(path.to_string(), self.config.baud_rate).await?;
        // On probe failure the port is dropped here, which closes it.
        let driver = detect(port, self.config.dialect.clone()).await?;
        info!(path, dialect = driver.dialect(), "device attached");

        let handle = Arc::new(VnaHandle::new(driver));
        devices.insert(path.to_string(), handle.clone());
        Ok(handle)
    }

    /// Number of attached devices.
    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.devices.read().await.is_empty()
    }

    /// Close every handle and empty the pool.
    pub async fn close_all(&self) {
        let mut devices = self.devices.write().await;
        for (path, handle) in devices.drain() {
            handle.close().await;
            info!(path, "device detached");
        }
    }
}
