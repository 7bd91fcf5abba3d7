//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! optional config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → cli.rs (flags and environment variables override file values)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → handed to the server, proxy builder and watcher at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; datasources are the only live state
//! - All fields have defaults to allow running with no file at all
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{read_config, ConfigError};
pub use schema::{
    DatasourceConfig, GatewayConfig, ListenerConfig, ObservabilityConfig, StaticFilesConfig,
    TimeoutConfig, TlsConfig, UpstreamConfig,
};
pub use validation::{validate_config, ValidationError};
