//! Health responders: expose aggregate health to callers.
//!
//! # Data Flow
//! ```text
//! GET <path>?type=ready&name=db
//!     → HealthQuery::parse
//!     → HealthStatusProvider (aggregator, in-memory only)
//!     → HealthResponse (200 | 503 | 400 | 404, JSON body)
//!     → http.rs (axum Router) or in_process.rs (direct call)
//! ```
//!
//! # Design Decisions
//! - Responders are produced by a factory bound to a name, paths and a provider
//! - Both responder kinds share `respond`, so their answers are identical
//! - Answering a query never runs a probe

pub mod http;
pub mod in_process;

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;

use crate::config::schema::ResponderConfig;
use crate::health::{HealthAggregator, HealthCheckType, HealthReport, HealthState};
use crate::observability::metrics;

pub use self::http::HttpResponderFactory;
pub use self::in_process::{InProcessResponder, InProcessResponderFactory};

/// Source of health answers for responders.
pub trait HealthStatusProvider: Send + Sync {
    fn evaluate(&self, check_type: HealthCheckType) -> HealthState;

    fn report(&self, check_type: HealthCheckType) -> HealthReport;

    /// `None` when none of `names` is known.
    fn report_named(&self, check_type: HealthCheckType, names: &[String]) -> Option<HealthReport>;
}

impl HealthStatusProvider for HealthAggregator {
    fn evaluate(&self, check_type: HealthCheckType) -> HealthState {
        HealthAggregator::evaluate(self, check_type)
    }

    fn report(&self, check_type: HealthCheckType) -> HealthReport {
        HealthAggregator::report(self, check_type)
    }

    fn report_named(&self, check_type: HealthCheckType, names: &[String]) -> Option<HealthReport> {
        HealthAggregator::report_named(self, check_type, names)
    }
}

/// Builds a responder serving `paths` from `provider`.
pub trait HealthResponderFactory {
    type Responder;

    fn bind(
        &self,
        name: &str,
        paths: &[String],
        provider: Arc<dyn HealthStatusProvider>,
    ) -> Self::Responder;
}

/// Parsed `?type=...&name=...` query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HealthQuery {
    pub check_type: HealthCheckType,
    pub names: Vec<String>,
}

impl HealthQuery {
    /// Parse a raw query string. `type` defaults to ready; `name` may repeat.
    pub fn parse(query: Option<&str>) -> Result<Self, String> {
        let mut parsed = HealthQuery::default();
        let Some(query) = query else {
            return Ok(parsed);
        };

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "type" => parsed.check_type = value.parse()?,
                "name" if !value.is_empty() => parsed.names.push(value.into_owned()),
                _ => {}
            }
        }
        Ok(parsed)
    }
}

/// What a responder answers, independent of transport.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthResponse {
    pub status: StatusCode,
    pub body: serde_json::Value,
    pub cache_control: Option<String>,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status == StatusCode::OK
    }
}

/// Answer one health query.
pub fn respond(
    provider: &dyn HealthStatusProvider,
    query: Option<&str>,
    config: &ResponderConfig,
) -> HealthResponse {
    let cache_control = config
        .cache_control_enabled
        .then(|| config.cache_control_value.clone());

    let query = match HealthQuery::parse(query) {
        Ok(query) => query,
        Err(message) => {
            metrics::record_request_status(StatusCode::BAD_REQUEST.as_u16());
            return HealthResponse {
                status: StatusCode::BAD_REQUEST,
                body: json!({ "error": message }),
                cache_control,
            };
        }
    };

    let report = if query.names.is_empty() {
        Some(provider.report(query.check_type))
    } else {
        provider.report_named(query.check_type, &query.names)
    };

    let Some(report) = report else {
        metrics::record_request_status(StatusCode::NOT_FOUND.as_u16());
        return HealthResponse {
            status: StatusCode::NOT_FOUND,
            body: json!({ "error": "no matching health checks", "names": query.names }),
            cache_control,
        };
    };

    let status = if report.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    metrics::record_response(report.check_type, report.state(), status.as_u16());

    HealthResponse {
        status,
        body: serde_json::to_value(&report).unwrap_or_else(|e| json!({ "error": e.to_string() })),
        cache_control,
    }
}
