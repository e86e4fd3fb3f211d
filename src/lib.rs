//! Health check scheduling and readiness/liveness reporting.
//!
//! Register checks (a definition plus a probe) with a [`HealthEngine`]; each
//! runs on its own task at a cadence that speeds up while it is unhealthy.
//! Consecutive-result thresholds debounce transitions, and critical checks
//! decide the aggregate READY and ALIVE answers served by the responders.

pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod responder;

pub use config::schema::AppConfig;
pub use health::{
    HealthCheckDefinition, HealthCheckType, HealthEngine, HealthError, HealthState, Probe,
    ProbeError, Schedule,
};
pub use http::HealthServer;
pub use lifecycle::Shutdown;
pub use responder::{HealthResponderFactory, HealthStatusProvider};
