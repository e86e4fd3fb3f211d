//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Probe invocation:
//!     → timeouts.rs (enforce the probe's time budget)
//!     → on timeout: ProbeError::Timeout, recorded as a failure
//!
//! Scheduler loop panic:
//!     → backoff.rs (jittered delay before the supervisor restarts the loop)
//! ```
//!
//! # Design Decisions
//! - Timeouts are composable wrappers, not baked into probes
//! - Restarts back off so a crash loop cannot spin the CPU

pub mod backoff;
pub mod timeouts;
