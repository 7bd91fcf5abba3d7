//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check that TLS settings are complete
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::observability::logging::LOG_LEVELS;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid {field} '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("datasources.namespace must not be empty")]
    EmptyNamespace,

    #[error("datasources.{0} must not be empty")]
    EmptyKey(&'static str),

    #[error("unknown log level '{0}'")]
    UnknownLogLevel(String),

    #[error("listener TLS needs both a certificate and a private key")]
    IncompleteTls,
}

/// Validate a loaded configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.as_os_str().is_empty() || tls.key_path.as_os_str().is_empty() {
            errors.push(ValidationError::IncompleteTls);
        }
    }

    let ds = &config.datasources;
    if ds.namespace.trim().is_empty() {
        errors.push(ValidationError::EmptyNamespace);
    }
    if ds.config_key.trim().is_empty() {
        errors.push(ValidationError::EmptyKey("config_key"));
    }
    if ds.ca_key.trim().is_empty() {
        errors.push(ValidationError::EmptyKey("ca_key"));
    }

    let durations = [
        ("datasources.reconnect_backoff_secs", ds.reconnect_backoff_secs),
        ("datasources.resume_backoff_secs", ds.resume_backoff_secs),
        ("upstream.connect_timeout_secs", config.upstream.connect_timeout_secs),
        ("upstream.tls_handshake_timeout_secs", config.upstream.tls_handshake_timeout_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
    ];
    for (field, value) in durations {
        if value == 0 {
            errors.push(ValidationError::ZeroDuration(field));
        }
    }

    let level = config.observability.log_level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(config.observability.log_level.clone()));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
