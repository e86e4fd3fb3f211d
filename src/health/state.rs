//! Per-check health state machine.
//!
//! # States
//! - Healthy: the check counts towards a healthy aggregate
//! - Unhealthy: a critical check in this state fails its aggregate
//!
//! # State Transitions
//! ```text
//! Healthy → Unhealthy: consecutive failures >= failure_attempts
//! Unhealthy → Healthy: consecutive successes >= success_attempts
//! ```
//!
//! # Design Decisions
//! - Hysteresis prevents flapping
//! - Counters reset on state transition
//! - Owned by exactly one scheduler task; readers see `CheckSnapshot`s

use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::health::check::{HealthCheckDefinition, HealthCheckType};
use crate::health::schedule::Schedule;

/// Health of a single check or of an aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

impl HealthState {
    pub fn is_healthy(self) -> bool {
        self == HealthState::Healthy
    }
}

impl From<bool> for HealthState {
    fn from(healthy: bool) -> Self {
        if healthy {
            HealthState::Healthy
        } else {
            HealthState::Unhealthy
        }
    }
}

/// Result of one probe invocation, as seen by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl<E> From<&Result<(), E>> for Outcome {
    fn from(result: &Result<(), E>) -> Self {
        match result {
            Ok(()) => Outcome::Success,
            Err(_) => Outcome::Failure,
        }
    }
}

/// A state change produced by `CheckState::record`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: HealthState,
    pub to: HealthState,
}

/// Debounced health of one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckState {
    health: HealthState,
    consecutive_successes: u32,
    consecutive_failures: u32,
    failure_attempts: u32,
    success_attempts: u32,
}

impl CheckState {
    pub fn new(initial_state: bool, schedule: &Schedule) -> Self {
        Self {
            health: HealthState::from(initial_state),
            consecutive_successes: 0,
            consecutive_failures: 0,
            failure_attempts: schedule.failure_attempts,
            success_attempts: schedule.success_attempts,
        }
    }

    /// Rebuild the machine from its last published snapshot.
    pub(crate) fn resume(snapshot: &CheckSnapshot, schedule: &Schedule) -> Self {
        Self {
            health: snapshot.health,
            consecutive_successes: snapshot.consecutive_successes,
            consecutive_failures: snapshot.consecutive_failures,
            failure_attempts: schedule.failure_attempts,
            success_attempts: schedule.success_attempts,
        }
    }

    /// Apply one probe outcome. Returns the transition if one fired.
    pub fn record(&mut self, outcome: Outcome) -> Option<Transition> {
        let from = self.health;
        match outcome {
            Outcome::Success => {
                self.consecutive_failures = 0;
                self.consecutive_successes = self.consecutive_successes.saturating_add(1);

                if self.health == HealthState::Unhealthy
                    && self.consecutive_successes >= self.success_attempts
                {
                    self.health = HealthState::Healthy;
                    self.consecutive_successes = 0;
                }
            }
            Outcome::Failure => {
                self.consecutive_successes = 0;
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);

                if self.health == HealthState::Healthy
                    && self.consecutive_failures >= self.failure_attempts
                {
                    self.health = HealthState::Unhealthy;
                    self.consecutive_failures = 0;
                }
            }
        }

        (from != self.health).then_some(Transition {
            from,
            to: self.health,
        })
    }

    pub fn health(&self) -> HealthState {
        self.health
    }

    pub fn consecutive_successes(&self) -> u32 {
        self.consecutive_successes
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Cadence for the next run, chosen from the current (post-transition) health.
    pub fn next_delay(&self, schedule: &Schedule) -> Duration {
        match self.health {
            HealthState::Healthy => schedule.check_interval,
            HealthState::Unhealthy => schedule.downtime_interval,
        }
    }
}

/// Immutable view of a check, published after every evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckSnapshot {
    pub name: String,
    pub check_type: HealthCheckType,
    pub critical: bool,
    pub health: HealthState,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
    /// Duration of the most recent probe, if one has completed.
    pub last_duration: Option<Duration>,
    pub last_checked: Option<SystemTime>,
    pub last_error: Option<String>,
}

impl CheckSnapshot {
    /// Snapshot before the first probe has run.
    pub fn initial(definition: &HealthCheckDefinition) -> Self {
        Self {
            name: definition.name.clone(),
            check_type: definition.check_type,
            critical: definition.critical,
            health: HealthState::from(definition.initial_state),
            consecutive_successes: 0,
            consecutive_failures: 0,
            last_duration: None,
            last_checked: None,
            last_error: None,
        }
    }

    pub(crate) fn evaluated(
        definition: &HealthCheckDefinition,
        state: &CheckState,
        duration: Duration,
        error: Option<String>,
    ) -> Self {
        Self {
            health: state.health(),
            consecutive_successes: state.consecutive_successes(),
            consecutive_failures: state.consecutive_failures(),
            last_duration: Some(duration),
            last_checked: Some(SystemTime::now()),
            last_error: error,
            ..Self::initial(definition)
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.health.is_healthy()
    }
}
