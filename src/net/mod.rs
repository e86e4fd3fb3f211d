//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! [server.tls] cert_path + key_path
//!     → tls.rs (load PEM material)
//!     → RustlsConfig
//!     → http::server binds with axum-server
//! ```
//!
//! # Design Decisions
//! - TLS is optional and handled transparently
//! - Missing certificate files fail startup, not the first handshake

pub mod tls;
