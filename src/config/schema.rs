//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for the datasource gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Datasource discovery settings.
    pub datasources: DatasourceConfig,

    /// Upstream connection settings for datasource proxies.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Frontend asset serving.
    pub static_files: StaticFilesConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl GatewayConfig {
    /// Trust bundle used when a datasource carries no CA of its own.
    ///
    /// Defaults to the listener certificate, which in-cluster is issued by
    /// the same service CA as the datasource endpoints.
    pub fn fallback_ca_file(&self) -> Option<PathBuf> {
        self.datasources
            .service_ca_file
            .clone()
            .or_else(|| self.listener.tls.as_ref().map(|tls| tls.cert_path.clone()))
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:9004").
    pub bind_address: String,

    /// Optional TLS configuration. Plain HTTP when absent.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9004".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: PathBuf,

    /// Path to private key file (PEM).
    pub key_path: PathBuf,
}

/// Where datasources come from and how the watch behaves.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatasourceConfig {
    /// Namespace watched for datasource ConfigMaps.
    pub namespace: String,

    /// Label selector marking a ConfigMap as a dashboard datasource.
    pub label_selector: String,

    /// ConfigMap key holding the datasource document.
    pub config_key: String,

    /// ConfigMap key holding an optional PEM trust bundle.
    pub ca_key: String,

    /// Fallback trust bundle for datasources without their own CA.
    pub service_ca_file: Option<PathBuf>,

    /// Delay before retrying when a watch cannot be established.
    pub reconnect_backoff_secs: u64,

    /// Delay before re-watching after a stream ends.
    pub resume_backoff_secs: u64,
}

impl Default for DatasourceConfig {
    fn default() -> Self {
        Self {
            namespace: "console-dashboards".to_string(),
            label_selector: "console.openshift.io/dashboard-datasource=true".to_string(),
            config_key: "dashboard-datasource.yaml".to_string(),
            ca_key: "dashboard-datasource-ca".to_string(),
            service_ca_file: None,
            reconnect_backoff_secs: 300,
            resume_backoff_secs: 10,
        }
    }
}

/// Connection settings for proxied datasources.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// TCP connect timeout in seconds. Matches typical browser request limits.
    pub connect_timeout_secs: u64,

    /// TCP keep-alive probe interval in seconds.
    pub keepalive_secs: u64,

    /// TLS handshake timeout in seconds.
    pub tls_handshake_timeout_secs: u64,

    /// Idle pooled connections are closed after this many seconds.
    pub pool_idle_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 300,
            keepalive_secs: 30,
            tls_handshake_timeout_secs: 10,
            pool_idle_timeout_secs: 90,
        }
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed until response headers are sent, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 300 }
    }
}

/// Static frontend assets.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    /// Directory served for every path not handled by the API or proxy.
    pub path: PathBuf,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./web/dist"),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
