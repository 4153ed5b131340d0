//! Per-device handle: serializes driver traffic, owns the active calibration.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, instrument};

use vna_core::calibration::{
    CalibrationMeasurement, CalibrationPlan, CalibrationProfile, CalibrationStandard,
};
use vna_core::data::Measurement;
use vna_core::error::{Result, VnaError};
use vna_core::sweep::SweepConfig;
use vna_driver_nanovna::NanoVnaDriver;

/// Operator callback invoked before each calibration step, at the moment the
/// named reference standard must be physically connected to the port. A
/// returned error aborts the plan.
pub type CalibrationPrompt =
    Box<dyn Fn(CalibrationStandard) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// One attached VNA.
///
/// Every driver interaction runs under a single exclusive lock, so at most
/// one sweep configuration, scan, close or calibration step is in flight per
/// device; serial hardware cannot interleave commands. Handles are shared
/// (`Arc`) between callers; the pool keeps one per port path.
pub struct VnaHandle {
    driver: Mutex<Option<NanoVnaDriver>>,
    calibration: RwLock<Option<Arc<CalibrationProfile>>>,
    cancel: watch::Sender<bool>,
}

impl VnaHandle {
    pub fn new(driver: NanoVnaDriver) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            driver: Mutex::new(Some(driver)),
            calibration: RwLock::new(None),
            cancel,
        }
    }

    /// Subscribe to this handle's cancellation signal. It flips to `true`
    /// when the handle is closed.
    pub fn cancel_signal(&self) -> watch::Receiver<bool> {
        self.cancel.subscribe()
    }

    /// Validate and push a sweep configuration to the device.
    #[instrument(skip(self), err(level = "debug"))]
    pub async fn set_sweep(&self, config: SweepConfig) -> Result<()> {
        config.validate()?;
        let mut guard = self.driver.lock().await;
        let driver = guard.as_mut().ok_or(VnaError::Closed)?;
        driver.set_sweep(config).await
    }

    /// Take one raw (uncalibrated) scan.
    pub async fn scan(&self) -> Result<Measurement> {
        let mut guard = self.driver.lock().await;
        let driver = guard.as_mut().ok_or(VnaError::Closed)?;
        driver.scan().await
    }

    /// Take one scan and route it through the active calibration profile.
    /// Without an installed profile the raw measurement comes back as-is.
    pub async fn scan_corrected(&self) -> Result<Measurement> {
        let raw = self.scan().await?;
        match self.calibration() {
            Some(profile) => profile.apply(&raw),
            None => Ok(raw),
        }
    }

    /// Snapshot of the active calibration profile, if one is installed.
    ///
    /// The profile behind the `Arc` is immutable; callers wanting an owned
    /// deep copy can clone it.
    pub fn calibration(&self) -> Option<Arc<CalibrationProfile>> {
        self.calibration.read().clone()
    }

    /// Execute a calibration plan and install the resulting profile.
    ///
    /// For each step, in order: invoke the prompt (the operator connects the
    /// standard), honor the cancellation signal, then take one scan under the
    /// driver lock. Once every standard is captured the SOL error terms are
    /// solved and validated, and the profile becomes this handle's active
    /// calibration.
    ///
    /// Any failure — prompt, cancellation, scan, solver, validation — aborts
    /// the plan and leaves the previously installed profile untouched.
    ///
    /// `cancel` defaults to the handle's own signal (raised by
    /// [`close`](Self::close)); pass a receiver to cancel a single plan from
    /// outside.
    #[instrument(skip_all, fields(plan = %plan.name), err(level = "debug"))]
    pub async fn acquire_calibration(
        &self,
        cancel: Option<watch::Receiver<bool>>,
        plan: CalibrationPlan,
        prompt: Option<CalibrationPrompt>,
    ) -> Result<Arc<CalibrationProfile>> {
        plan.validate()?;
        let cancel = cancel.unwrap_or_else(|| self.cancel.subscribe());

        self.set_sweep(plan.sweep).await?;

        let mut standards: HashMap<CalibrationStandard, CalibrationMeasurement> = HashMap::new();
        for step in &plan.steps {
            if let Some(prompt) = prompt.as_ref() {
                prompt(step.standard).await.map_err(VnaError::Prompt)?;
            }
            if *cancel.borrow() {
                info!(standard = %step.standard, "calibration canceled at step boundary");
                return Err(VnaError::Canceled);
            }

            debug!(standard = %step.standard, "sweeping calibration standard");
            let data = self.scan().await?;
            standards.insert(step.standard, CalibrationMeasurement::from(&data));
        }

        let profile = Arc::new(CalibrationProfile::solve(plan.name, plan.sweep, standards)?);
        *self.calibration.write() = Some(profile.clone());
        info!(points = profile.frequencies.len(), "calibration profile installed");
        Ok(profile)
    }

    /// Close the handle: raise the cancellation signal and drop the driver,
    /// which closes the port. Safe to call more than once; subsequent
    /// operations fail with [`VnaError::Closed`].
    pub async fn close(&self) {
        let _ = self.cancel.send(true);
        let mut guard = self.driver.lock().await;
        if guard.take().is_some() {
            debug!("device handle closed");
        }
    }
}
