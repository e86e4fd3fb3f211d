//! Per-check timing and threshold parameters.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::health::error::HealthError;

/// When and how often a check runs, and how many consecutive results it
/// takes to flip its health.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Schedule {
    /// Delay before the first run. Falls back to `check_interval`.
    #[serde(with = "crate::config::duration::option", skip_serializing_if = "Option::is_none")]
    pub initial_delay: Option<Duration>,

    /// Delay between runs while the check is healthy.
    #[serde(with = "crate::config::duration")]
    pub check_interval: Duration,

    /// Delay between runs while the check is unhealthy.
    #[serde(with = "crate::config::duration")]
    pub downtime_interval: Duration,

    /// Consecutive failures before healthy turns unhealthy. 0 = first failure.
    pub failure_attempts: u32,

    /// Consecutive successes before unhealthy turns healthy. 0 = first success.
    pub success_attempts: u32,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            initial_delay: None,
            check_interval: Duration::from_secs(5),
            downtime_interval: Duration::from_secs(30),
            failure_attempts: 3,
            success_attempts: 2,
        }
    }
}

impl Schedule {
    pub fn new(check_interval: Duration, downtime_interval: Duration) -> Self {
        Self {
            check_interval,
            downtime_interval,
            ..Self::default()
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    pub fn with_attempts(mut self, failure_attempts: u32, success_attempts: u32) -> Self {
        self.failure_attempts = failure_attempts;
        self.success_attempts = success_attempts;
        self
    }

    /// Delay before the first run. Defaults to `check_interval`, not zero.
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay.unwrap_or(self.check_interval)
    }

    pub(crate) fn validate(&self, name: &str) -> Result<(), HealthError> {
        let invalid = |reason: &str| HealthError::InvalidDefinition {
            name: name.to_string(),
            reason: reason.to_string(),
        };
        if self.check_interval.is_zero() {
            return Err(invalid("check_interval must be greater than zero"));
        }
        if self.downtime_interval.is_zero() {
            return Err(invalid("downtime_interval must be greater than zero"));
        }
        Ok(())
    }
}
