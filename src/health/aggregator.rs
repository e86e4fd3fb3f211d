//! Aggregate health for readiness and liveness.
//!
//! # Rules
//! - Only critical checks of the requested type take part
//! - The aggregate is healthy iff none of them is unhealthy
//! - No participating checks means healthy
//! - A draining engine is never ready

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::health::check::HealthCheckType;
use crate::health::scheduler::Registry;
use crate::health::state::{CheckSnapshot, HealthState};

/// Combine snapshots into the aggregate health for `check_type`.
pub fn aggregate<'a, I>(snapshots: I, check_type: HealthCheckType) -> HealthState
where
    I: IntoIterator<Item = &'a CheckSnapshot>,
{
    let healthy = snapshots
        .into_iter()
        .filter(|s| s.check_type == check_type && s.critical)
        .all(CheckSnapshot::is_healthy);
    HealthState::from(healthy)
}

/// One check as it appears in a health response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub healthy: bool,
    pub critical: bool,
    #[serde(rename = "type")]
    pub check_type: HealthCheckType,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl From<&CheckSnapshot> for CheckReport {
    fn from(snapshot: &CheckSnapshot) -> Self {
        Self {
            healthy: snapshot.is_healthy(),
            critical: snapshot.critical,
            check_type: snapshot.check_type,
            consecutive_successes: snapshot.consecutive_successes,
            consecutive_failures: snapshot.consecutive_failures,
            last_duration_ms: snapshot
                .last_duration
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            last_error: snapshot.last_error.clone(),
        }
    }
}

/// Aggregate health plus the checks it was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    #[serde(rename = "type")]
    pub check_type: HealthCheckType,
    pub healthy: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub draining: bool,
    pub checks: BTreeMap<String, CheckReport>,
}

impl HealthReport {
    pub fn state(&self) -> HealthState {
        HealthState::from(self.healthy)
    }
}

/// Read-only view over an engine's registry.
///
/// Cloning is cheap; every clone sees the same checks.
#[derive(Clone)]
pub struct HealthAggregator {
    checks: Registry,
    draining: Arc<AtomicBool>,
}

impl HealthAggregator {
    pub(crate) fn new(checks: Registry, draining: Arc<AtomicBool>) -> Self {
        Self { checks, draining }
    }

    fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// Latest snapshot of every registered check.
    pub fn snapshots(&self) -> Vec<Arc<CheckSnapshot>> {
        self.checks
            .iter()
            .map(|check| check.snapshot.load_full())
            .collect()
    }

    pub fn evaluate(&self, check_type: HealthCheckType) -> HealthState {
        if check_type == HealthCheckType::Ready && self.is_draining() {
            return HealthState::Unhealthy;
        }
        let healthy = self.checks.iter().all(|check| {
            let definition = &check.definition;
            definition.check_type != check_type
                || !definition.critical
                || check.snapshot.load().is_healthy()
        });
        HealthState::from(healthy)
    }

    /// Aggregate and per-check breakdown for every check of `check_type`.
    pub fn report(&self, check_type: HealthCheckType) -> HealthReport {
        let snapshots: Vec<_> = self
            .snapshots()
            .into_iter()
            .filter(|s| s.check_type == check_type)
            .collect();
        let health = aggregate(snapshots.iter().map(|s| &**s), check_type);
        let draining = check_type == HealthCheckType::Ready && self.is_draining();
        self.build_report(check_type, health.is_healthy(), draining, &snapshots)
    }

    /// Report over the named checks only, whatever their type or
    /// criticality. Healthy iff every named check is healthy. Draining only
    /// fails the report when a named check is a readiness check.
    ///
    /// Returns `None` when none of `names` is registered.
    pub fn report_named(&self, check_type: HealthCheckType, names: &[String]) -> Option<HealthReport> {
        let snapshots: Vec<_> = names
            .iter()
            .filter_map(|name| self.checks.get(name).map(|c| c.snapshot.load_full()))
            .collect();
        if snapshots.is_empty() {
            return None;
        }
        let healthy = snapshots.iter().all(|s| s.is_healthy());
        let draining = self.is_draining()
            && snapshots.iter().any(|s| s.check_type == HealthCheckType::Ready);
        Some(self.build_report(check_type, healthy, draining, &snapshots))
    }

    fn build_report(
        &self,
        check_type: HealthCheckType,
        healthy: bool,
        draining: bool,
        snapshots: &[Arc<CheckSnapshot>],
    ) -> HealthReport {
        HealthReport {
            check_type,
            healthy: healthy && !draining,
            draining,
            checks: snapshots
                .iter()
                .map(|s| (s.name.clone(), CheckReport::from(s.as_ref())))
                .collect(),
        }
    }
}
