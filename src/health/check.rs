//! Health check definitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::health::error::HealthError;
use crate::health::schedule::Schedule;

/// Which aggregate a check contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthCheckType {
    #[default]
    Ready,
    Alive,
}

impl fmt::Display for HealthCheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthCheckType::Ready => f.write_str("ready"),
            HealthCheckType::Alive => f.write_str("alive"),
        }
    }
}

impl FromStr for HealthCheckType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ready" => Ok(HealthCheckType::Ready),
            "alive" => Ok(HealthCheckType::Alive),
            other => Err(format!("unknown health check type {other:?}")),
        }
    }
}

/// Immutable description of one registered check.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckDefinition {
    /// Unique, non-empty identifier.
    pub name: String,

    #[serde(rename = "type")]
    pub check_type: HealthCheckType,

    /// Only critical checks can take the aggregate down.
    pub critical: bool,

    /// Health assumed until the first probe completes.
    pub initial_state: bool,

    pub schedule: Schedule,
}

impl Default for HealthCheckDefinition {
    fn default() -> Self {
        Self {
            name: String::new(),
            check_type: HealthCheckType::Ready,
            critical: false,
            initial_state: true,
            schedule: Schedule::default(),
        }
    }
}

impl HealthCheckDefinition {
    pub fn new(name: impl Into<String>, check_type: HealthCheckType) -> Self {
        Self {
            name: name.into(),
            check_type,
            ..Self::default()
        }
    }

    pub fn critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    pub fn initial_state(mut self, healthy: bool) -> Self {
        self.initial_state = healthy;
        self
    }

    pub fn schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn validate(&self) -> Result<(), HealthError> {
        if self.name.trim().is_empty() {
            return Err(HealthError::InvalidDefinition {
                name: self.name.clone(),
                reason: "name must not be empty".to_string(),
            });
        }
        self.schedule.validate(&self.name)
    }
}
