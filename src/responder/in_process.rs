//! Responder that callers query directly, without a network hop.

use std::sync::Arc;

use crate::config::schema::ResponderConfig;
use crate::health::{HealthCheckType, HealthState};
use crate::responder::{respond, HealthResponderFactory, HealthResponse, HealthStatusProvider};

#[derive(Debug, Clone, Default)]
pub struct InProcessResponderFactory {
    config: ResponderConfig,
}

impl InProcessResponderFactory {
    pub fn new(config: ResponderConfig) -> Self {
        Self { config }
    }
}

impl HealthResponderFactory for InProcessResponderFactory {
    type Responder = InProcessResponder;

    fn bind(
        &self,
        name: &str,
        paths: &[String],
        provider: Arc<dyn HealthStatusProvider>,
    ) -> InProcessResponder {
        InProcessResponder {
            name: name.to_string(),
            paths: paths.to_vec(),
            provider,
            config: self.config.clone(),
        }
    }
}

/// Answers health queries for a fixed set of paths.
pub struct InProcessResponder {
    name: String,
    paths: Vec<String>,
    provider: Arc<dyn HealthStatusProvider>,
    config: ResponderConfig,
}

impl InProcessResponder {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Answer `path?query`. `None` when `path` is not bound.
    pub fn handle(&self, path: &str, query: Option<&str>) -> Option<HealthResponse> {
        if !self.paths.iter().any(|p| p == path) {
            return None;
        }
        Some(respond(self.provider.as_ref(), query, &self.config))
    }

    pub fn evaluate(&self, check_type: HealthCheckType) -> HealthState {
        self.provider.evaluate(check_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{HealthCheckDefinition, HealthEngine, Schedule, StaticProbe};
    use axum::http::StatusCode;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn answers_follow_check_health() {
        let engine = HealthEngine::new();
        let probe = Arc::new(StaticProbe::new(true));
        let def = HealthCheckDefinition::new("db", HealthCheckType::Alive)
            .critical(true)
            .schedule(Schedule::new(Duration::from_secs(1), Duration::from_secs(1)).with_attempts(2, 1));
        engine.register_check(def, probe.clone()).unwrap();

        let responder = InProcessResponderFactory::default().bind(
            "in-process",
            &["/health-check".to_string()],
            Arc::new(engine.aggregator()),
        );
        assert_eq!(responder.name(), "in-process");
        assert!(responder.handle("/other", None).is_none());

        let response = responder.handle("/health-check", Some("type=alive")).unwrap();
        assert!(response.is_healthy());
        assert_eq!(response.cache_control.as_deref(), Some("no-store"));

        probe.set_healthy(false);
        tokio::time::sleep(Duration::from_millis(2500)).await;
        let response = responder.handle("/health-check", Some("type=alive")).unwrap();
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.body["checks"]["db"]["healthy"], false);
        assert_eq!(responder.evaluate(HealthCheckType::Alive), HealthState::Unhealthy);

        probe.set_healthy(true);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(responder.evaluate(HealthCheckType::Alive), HealthState::Healthy);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn readiness_fails_while_draining() {
        let engine = HealthEngine::new();
        let responder = InProcessResponderFactory::default().bind(
            "in-process",
            &["/health-check".to_string()],
            Arc::new(engine.aggregator()),
        );
        assert!(responder.handle("/health-check", None).unwrap().is_healthy());

        engine.begin_shutdown();
        let response = responder.handle("/health-check", None).unwrap();
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.body["draining"], true);
        assert!(responder
            .handle("/health-check", Some("type=alive"))
            .unwrap()
            .is_healthy());
    }
}
