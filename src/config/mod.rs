//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → lifecycle::startup builds the engine, probes and server from it
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Durations are human-readable strings (duration.rs)

pub mod client;
pub mod duration;
pub mod loader;
pub mod schema;
pub mod validation;

pub use client::{ClientBuildError, ClientConfig, HttpClientConfig};
pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{AppConfig, HealthCheckConfig, ProbeConfig};
pub use validation::ValidationError;
