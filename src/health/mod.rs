//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (scheduler.rs):
//!     HealthCheckDefinition + Probe
//!     → validated, stored in the registry
//!     → one task per check
//!
//! Check task (scheduler.rs):
//!     sleep(initial_delay)
//!     → Probe::check (probe.rs)
//!     → CheckState::record (state.rs)
//!     → publish CheckSnapshot
//!     → sleep(check_interval | downtime_interval)
//!
//! Queries (aggregator.rs):
//!     snapshots → critical checks of one type → READY / ALIVE
//! ```
//!
//! # Design Decisions
//! - State transitions require consecutive successes/failures
//! - Cadence depends on current health: fast recovery probing, slow steady state
//! - Queries never run probes; they read the last published snapshots

pub mod aggregator;
pub mod check;
pub mod error;
pub mod probe;
pub mod schedule;
pub mod scheduler;
pub mod state;

pub use aggregator::{aggregate, CheckReport, HealthAggregator, HealthReport};
pub use check::{HealthCheckDefinition, HealthCheckType};
pub use error::{HealthError, ProbeError};
pub use probe::{FnProbe, HttpProbe, Probe, StaticProbe, TcpProbe};
pub use schedule::Schedule;
pub use scheduler::{HealthEngine, DEFAULT_SHUTDOWN_GRACE};
pub use state::{CheckSnapshot, CheckState, HealthState, Outcome, Transition};
