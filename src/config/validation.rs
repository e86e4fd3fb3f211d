//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check uniqueness (check names)
//! - Validate value ranges (intervals > 0, ports valid, retries bounded)
//! - Reject client settings the HTTP stack cannot honor
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::client::{AuthScheme, ClientConfig, MAX_RETRIES};
use crate::config::schema::{AppConfig, ProbeConfig};

/// One semantic problem in a config file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("{:?} is not a socket address", config.server.bind_address),
        ));
    }
    if config.server.request_timeout.is_zero() {
        errors.push(ValidationError::new("server.request_timeout", "must be greater than zero"));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("{:?} is not a socket address", config.observability.metrics_address),
        ));
    }

    validate_health(config, &mut errors);
    validate_client(&config.client, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_health(config: &AppConfig, errors: &mut Vec<ValidationError>) {
    let health = &config.health;

    if health.health_check_url_paths.is_empty() {
        errors.push(ValidationError::new(
            "health.health_check_url_paths",
            "at least one path is required",
        ));
    }
    for path in &health.health_check_url_paths {
        if !path.starts_with('/') {
            errors.push(ValidationError::new(
                "health.health_check_url_paths",
                format!("{path:?} must start with '/'"),
            ));
        }
    }
    if health.responder.cache_control_enabled && health.responder.cache_control_value.is_empty() {
        errors.push(ValidationError::new(
            "health.responder.cache_control_value",
            "must not be empty when cache control is enabled",
        ));
    }

    let mut seen = HashSet::new();
    for (i, check) in health.health_checks.iter().enumerate() {
        let field = format!("health.health_checks[{i}]");
        let definition = &check.definition;

        if let Err(e) = definition.validate() {
            errors.push(ValidationError::new(&field, e.to_string()));
        }
        if !definition.name.is_empty() && !seen.insert(definition.name.as_str()) {
            errors.push(ValidationError::new(
                &field,
                format!("duplicate check name {:?}", definition.name),
            ));
        }

        match &check.probe {
            ProbeConfig::Http { url, timeout } => {
                if let Err(e) = url::Url::parse(url) {
                    errors.push(ValidationError::new(
                        format!("{field}.probe.url"),
                        format!("{url:?}: {e}"),
                    ));
                }
                check_timeout(&field, *timeout, errors);
            }
            ProbeConfig::Tcp { address, timeout } => {
                if address.trim().is_empty() {
                    errors.push(ValidationError::new(
                        format!("{field}.probe.address"),
                        "must not be empty",
                    ));
                }
                check_timeout(&field, *timeout, errors);
            }
            ProbeConfig::Static { .. } => {}
        }
    }
}

fn check_timeout(
    field: &str,
    timeout: Option<std::time::Duration>,
    errors: &mut Vec<ValidationError>,
) {
    if timeout.is_some_and(|t| t.is_zero()) {
        errors.push(ValidationError::new(
            format!("{field}.probe.timeout"),
            "must be greater than zero",
        ));
    }
}

fn validate_client(client: &ClientConfig, errors: &mut Vec<ValidationError>) {
    let http = &client.http;

    if http.timeout.is_zero() {
        errors.push(ValidationError::new("client.timeout", "must be greater than zero"));
    }
    if http.connection_timeout.is_zero() {
        errors.push(ValidationError::new(
            "client.connection_timeout",
            "must be greater than zero",
        ));
    }
    if http.max_connections_per_route == 0 {
        errors.push(ValidationError::new(
            "client.max_connections_per_route",
            "must be greater than zero",
        ));
    }
    if http.retries > MAX_RETRIES {
        errors.push(ValidationError::new(
            "client.retries",
            format!("must be at most {MAX_RETRIES}"),
        ));
    }

    if let Some(proxy) = &http.proxy {
        if proxy.host.trim().is_empty() {
            errors.push(ValidationError::new("client.proxy.host", "must not be empty"));
        }
        if !matches!(proxy.scheme.to_ascii_lowercase().as_str(), "http" | "https") {
            errors.push(ValidationError::new(
                "client.proxy.scheme",
                format!("{:?} is not http or https", proxy.scheme),
            ));
        }
        if proxy.port != -1 && !(1..=65535).contains(&proxy.port) {
            errors.push(ValidationError::new(
                "client.proxy.port",
                format!("{} is out of range", proxy.port),
            ));
        }
        if let Some(auth) = &proxy.auth {
            if auth.username.is_empty() {
                errors.push(ValidationError::new("client.proxy.auth.username", "must not be empty"));
            }
            if auth.password.is_empty() {
                errors.push(ValidationError::new("client.proxy.auth.password", "must not be empty"));
            }
            if auth.auth_scheme == AuthScheme::Ntlm {
                errors.push(ValidationError::new(
                    "client.proxy.auth.auth_scheme",
                    "NTLM is not supported",
                ));
            }
        }
    }

    if let Some(tls) = &http.tls {
        if tls.min_version().is_err() {
            errors.push(ValidationError::new(
                "client.tls.protocol",
                format!("{:?} is not TLSv1.2 or TLSv1.3", tls.protocol),
            ));
        }
    }
}
