//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, timeout and trace layers)
//!     → responder::http (health query → JSON response)
//!     → Send to client
//! ```

pub mod server;

pub use server::{HealthServer, ServerError};
