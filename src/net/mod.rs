//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → tls.rs (optional TLS termination via axum-server)
//!     → Hand off to the HTTP layer
//! ```

pub mod tls;

pub use tls::{install_crypto_provider, load_tls_config};
