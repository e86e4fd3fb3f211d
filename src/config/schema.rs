//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the health
//! engine daemon. All types derive Serde traits for deserialization from
//! config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::client::ClientConfig;
use crate::health::HealthCheckDefinition;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener serving the health endpoints.
    pub server: ServerConfig,

    /// Health checks and the responder.
    pub health: HealthConfig,

    /// Outbound client used by HTTP probes.
    pub client: ClientConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Per-request timeout on the health endpoints.
    #[serde(with = "crate::config::duration")]
    pub request_timeout: Duration,

    /// Optional TLS configuration.
    pub tls: Option<ListenerTlsConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout: Duration::from_secs(10),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenerTlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Health subsystem configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Serve the health endpoints and run configured checks.
    pub enabled: bool,

    /// Responder name, used in logs.
    pub name: String,

    /// Paths the responder answers on.
    pub health_check_url_paths: Vec<String>,

    /// How long readiness reports unhealthy before checks are stopped.
    #[serde(with = "crate::config::duration")]
    pub shutdown_wait_period: Duration,

    /// How long in-flight probes may run once shutdown starts.
    #[serde(with = "crate::config::duration")]
    pub shutdown_grace: Duration,

    pub responder: ResponderConfig,

    pub health_checks: Vec<HealthCheckConfig>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            name: "health".to_string(),
            health_check_url_paths: vec!["/health-check".to_string()],
            shutdown_wait_period: Duration::ZERO,
            shutdown_grace: crate::health::DEFAULT_SHUTDOWN_GRACE,
            responder: ResponderConfig::default(),
            health_checks: Vec::new(),
        }
    }
}

/// HTTP response settings for the health endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ResponderConfig {
    pub cache_control_enabled: bool,
    pub cache_control_value: String,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            cache_control_enabled: true,
            cache_control_value: "no-store".to_string(),
        }
    }
}

/// A check declared in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HealthCheckConfig {
    #[serde(flatten)]
    pub definition: HealthCheckDefinition,

    /// The built-in probe this check runs.
    pub probe: ProbeConfig,
}

/// Built-in probe kinds available from config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProbeConfig {
    /// GET `url`, healthy on any 2xx.
    Http {
        url: String,
        #[serde(
            default,
            with = "crate::config::duration::option",
            skip_serializing_if = "Option::is_none"
        )]
        timeout: Option<Duration>,
    },

    /// Healthy when a TCP connection to `address` opens.
    Tcp {
        address: String,
        #[serde(
            default,
            with = "crate::config::duration::option",
            skip_serializing_if = "Option::is_none"
        )]
        timeout: Option<Duration>,
    },

    /// Fixed result, for smoke tests and placeholders.
    Static {
        #[serde(default = "default_true")]
        healthy: bool,
    },
}

fn default_true() -> bool {
    true
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
