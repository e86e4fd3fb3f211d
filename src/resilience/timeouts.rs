//! Timeout enforcement for probes.
//!
//! # Responsibilities
//! - Wrap any probe with a time budget
//! - Cancel the probe future cleanly when the budget runs out
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors (`ProbeError::Timeout`)
//! - The scheduler treats a timeout exactly like any other failure

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::health::error::ProbeError;
use crate::health::probe::Probe;

/// A probe that fails with `ProbeError::Timeout` when `inner` takes too long.
pub struct TimeoutProbe {
    inner: Arc<dyn Probe>,
    timeout: Duration,
}

impl TimeoutProbe {
    pub fn new(inner: Arc<dyn Probe>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl Probe for TimeoutProbe {
    async fn check(&self) -> Result<(), ProbeError> {
        match tokio::time::timeout(self.timeout, self.inner.check()).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout(self.timeout)),
        }
    }
}

/// Wrap `probe` in a `TimeoutProbe` when a budget is configured.
pub fn with_timeout(probe: Arc<dyn Probe>, timeout: Option<Duration>) -> Arc<dyn Probe> {
    match timeout {
        Some(timeout) => Arc::new(TimeoutProbe::new(probe, timeout)),
        None => probe,
    }
}
