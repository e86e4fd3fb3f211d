//! Startup orchestration.
//!
//! # Responsibilities
//! - Turn configured probe tables into `Probe`s
//! - Register every configured check with a fresh engine
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - The HTTP client is built once, and only if an HTTP probe needs it
//! - Checks register in file order

use std::sync::Arc;

use thiserror::Error;

use crate::config::client::{ClientBuildError, ClientConfig};
use crate::config::schema::{AppConfig, ProbeConfig};
use crate::health::{HealthEngine, HealthError, HttpProbe, Probe, StaticProbe, TcpProbe};
use crate::resilience::timeouts::with_timeout;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] ClientBuildError),

    #[error("failed to register health check: {0}")]
    Health(#[from] HealthError),
}

/// Builds probes from config, sharing one HTTP client between them.
struct ProbeBuilder<'a> {
    client_config: &'a ClientConfig,
    client: Option<reqwest::Client>,
}

impl<'a> ProbeBuilder<'a> {
    fn new(client_config: &'a ClientConfig) -> Self {
        Self {
            client_config,
            client: None,
        }
    }

    fn client(&mut self) -> Result<reqwest::Client, ClientBuildError> {
        if let Some(client) = &self.client {
            return Ok(client.clone());
        }
        let client = self.client_config.build_client()?;
        self.client = Some(client.clone());
        Ok(client)
    }

    fn build(&mut self, probe: &ProbeConfig) -> Result<Arc<dyn Probe>, ClientBuildError> {
        let probe: Arc<dyn Probe> = match probe {
            ProbeConfig::Http { url, timeout } => {
                let http = HttpProbe::new(self.client()?, url.clone())
                    .with_retries(self.client_config.http.retries);
                with_timeout(Arc::new(http), *timeout)
            }
            ProbeConfig::Tcp { address, timeout } => {
                with_timeout(Arc::new(TcpProbe::new(address.clone())), *timeout)
            }
            ProbeConfig::Static { healthy } => Arc::new(StaticProbe::new(*healthy)),
        };
        Ok(probe)
    }
}

/// Create an engine and register every configured check.
///
/// Must be called from within a Tokio runtime.
pub fn build_engine(config: &AppConfig) -> Result<HealthEngine, StartupError> {
    let health = &config.health;
    let engine = HealthEngine::with_shutdown_grace(health.shutdown_grace);
    if !health.enabled {
        tracing::info!("Health checks disabled");
        return Ok(engine);
    }

    let mut probes = ProbeBuilder::new(&config.client);
    for check in &health.health_checks {
        let probe = probes.build(&check.probe)?;
        engine.register_check(check.definition.clone(), probe)?;
    }

    tracing::info!(
        responder = %health.name,
        checks = health.health_checks.len(),
        "Health engine started"
    );
    Ok(engine)
}
