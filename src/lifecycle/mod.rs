//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build probes → Register checks → Start listener
//!
//! Shutdown (shutdown.rs + HealthEngine):
//!     Signal received → Drain (readiness 503) → Stop checks → Stop listener → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then checks, then the listener
//! - Ordered shutdown: readiness fails first so traffic moves away
//! - Check shutdown has a grace period: hung probes are aborted after it

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use startup::{build_engine, StartupError};
