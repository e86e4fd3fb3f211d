//! Error types for the health subsystem.

use std::time::Duration;

use thiserror::Error;

/// Registration and lifecycle errors. All of them are fatal for the
/// operation that raised them; nothing here is retried.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HealthError {
    #[error("health check {0:?} is already registered")]
    DuplicateCheck(String),

    #[error("invalid health check {name:?}: {reason}")]
    InvalidDefinition { name: String, reason: String },

    #[error("health engine is shut down")]
    ShutDown,
}

/// Why a single probe invocation did not succeed.
///
/// Every variant is recorded as a failure by the scheduler.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe reported unhealthy: {0}")]
    Unhealthy(String),

    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("probe panicked: {0}")]
    Panicked(String),
}

impl ProbeError {
    /// Short label used for the `outcome` metric dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeError::Unhealthy(_) => "unhealthy",
            ProbeError::Timeout(_) => "timeout",
            ProbeError::Io(_) => "io",
            ProbeError::Http(_) => "http",
            ProbeError::Status(_) => "status",
            ProbeError::Panicked(_) => "panic",
        }
    }
}
