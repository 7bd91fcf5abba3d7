//! Dashboard datasource gateway.
//!
//! Discovers datasource descriptors published as labelled ConfigMaps and
//! proxies dashboard queries to them over TLS, trusting only the CA each
//! datasource ships (or the configured fallback bundle).

pub mod cli;
pub mod config;
pub mod datasources;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod resilience;

pub use config::GatewayConfig;
pub use datasources::{DatasourceRegistry, DatasourceWatcher};
pub use error::GatewayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use proxy::ProxyBuilder;
