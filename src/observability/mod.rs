//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Scheduler and responder produce:
//!     → logging.rs (structured log events: transitions, restarts)
//!     → metrics.rs (probe counters, latency histograms, state gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON or pretty)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Metrics are cheap (atomic increments), safe to record per probe

pub mod logging;
pub mod metrics;
