//! Axum responder for the health endpoints.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{RawQuery, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use crate::config::schema::ResponderConfig;
use crate::responder::{respond, HealthResponderFactory, HealthResponse, HealthStatusProvider};

/// Produces an axum `Router` answering on every bound path.
#[derive(Debug, Clone, Default)]
pub struct HttpResponderFactory {
    config: ResponderConfig,
}

impl HttpResponderFactory {
    pub fn new(config: ResponderConfig) -> Self {
        Self { config }
    }
}

#[derive(Clone)]
struct ResponderState {
    name: Arc<str>,
    provider: Arc<dyn HealthStatusProvider>,
    config: Arc<ResponderConfig>,
}

impl HealthResponderFactory for HttpResponderFactory {
    type Responder = Router;

    fn bind(
        &self,
        name: &str,
        paths: &[String],
        provider: Arc<dyn HealthStatusProvider>,
    ) -> Router {
        let state = ResponderState {
            name: Arc::from(name),
            provider,
            config: Arc::new(self.config.clone()),
        };

        let mut seen = HashSet::new();
        let mut router = Router::new();
        for path in paths.iter().filter(|p| seen.insert(p.as_str())) {
            router = router.route(path, get(health_handler));
        }
        tracing::debug!(responder = %name, paths = ?paths, "Health responder bound");
        router.with_state(state)
    }
}

async fn health_handler(
    State(state): State<ResponderState>,
    RawQuery(query): RawQuery,
) -> Response {
    let response = respond(state.provider.as_ref(), query.as_deref(), &state.config);
    tracing::debug!(
        responder = %state.name,
        query = ?query,
        status = response.status.as_u16(),
        "Health query answered"
    );
    response.into_response()
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body)).into_response();
        if let Some(value) = self
            .cache_control
            .and_then(|v| HeaderValue::from_str(&v).ok())
        {
            response.headers_mut().insert(header::CACHE_CONTROL, value);
        }
        response
    }
}
