//! Probes: the operations a health check runs.
//!
//! # Responsibilities
//! - Define the `Probe` seam the scheduler calls
//! - Adapt closures and static values into probes
//! - Provide HTTP and TCP probes for config-driven checks
//!
//! # Design Decisions
//! - A probe reports `Ok(())` or a `ProbeError`; there is no tri-state
//! - Probes never enforce their own time budget; wrap them in `TimeoutProbe`
//! - Probes take `&self` and may be invoked from any worker thread

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::health::error::ProbeError;

/// A single health probe.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Run the probe once.
    async fn check(&self) -> Result<(), ProbeError>;
}

/// Probe backed by an async closure.
pub struct FnProbe<F> {
    f: F,
}

impl<F, Fut> FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), ProbeError>> + Send,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Probe for FnProbe<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), ProbeError>> + Send,
{
    async fn check(&self) -> Result<(), ProbeError> {
        (self.f)().await
    }
}

/// Probe that reports a fixed, externally switchable result.
#[derive(Debug)]
pub struct StaticProbe {
    healthy: AtomicBool,
}

impl StaticProbe {
    pub fn new(healthy: bool) -> Self {
        Self {
            healthy: AtomicBool::new(healthy),
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }
}

#[async_trait]
impl Probe for StaticProbe {
    async fn check(&self) -> Result<(), ProbeError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ProbeError::Unhealthy("static probe set to unhealthy".to_string()))
        }
    }
}

/// GET a URL and require a 2xx response.
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
    retries: u32,
}

impl HttpProbe {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            retries: 0,
        }
    }

    /// Retry connection-level errors this many extra times per invocation.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn check(&self) -> Result<(), ProbeError> {
        let mut attempt = 0;
        let response = loop {
            match self.client.get(&self.url).send().await {
                Ok(response) => break response,
                Err(e) if attempt < self.retries && (e.is_connect() || e.is_request()) => {
                    attempt += 1;
                    tracing::debug!(url = %self.url, attempt, error = %e, "Retrying health probe");
                }
                Err(e) => return Err(e.into()),
            }
        };

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ProbeError::Status(status.as_u16()))
        }
    }
}

/// Succeeds when a TCP connection to `address` can be opened.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    address: String,
}

impl TcpProbe {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl Probe for TcpProbe {
    async fn check(&self) -> Result<(), ProbeError> {
        let stream = TcpStream::connect(&self.address).await?;
        drop(stream);
        Ok(())
    }
}
