//! Command line flags.
//!
//! Every flag can also be set through its environment variable; an explicit
//! flag wins over the variable, and either wins over the config file.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{read_config, ConfigError, GatewayConfig, TlsConfig};
use crate::observability::logging::LOG_LEVELS;

#[derive(Debug, Parser)]
#[command(name = "datasource-gateway")]
#[command(about = "Dashboard datasource discovery and proxy gateway", long_about = None)]
pub struct Args {
    /// TOML config file; flags override its values
    #[arg(long, env = "GATEWAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Server port to listen on (default: 9004)
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Cert file path to enable TLS (disabled by default)
    #[arg(long, env = "CERT_FILE_PATH")]
    pub cert: Option<PathBuf>,

    /// Private key file path to enable TLS (disabled by default)
    #[arg(long, env = "PRIVATE_KEY_FILE_PATH")]
    pub key: Option<PathBuf>,

    /// Static files path to serve frontend (default: ./web/dist)
    #[arg(long, env = "STATIC_PATH")]
    pub static_path: Option<PathBuf>,

    /// Namespace to watch for custom datasources (default: console-dashboards)
    #[arg(long, env = "DASHBOARDS_NAMESPACE")]
    pub dashboards_namespace: Option<String>,

    /// CA bundle trusted for datasources without their own (default: the --cert file)
    #[arg(long, env = "SERVICE_CA_FILE")]
    pub service_ca_file: Option<PathBuf>,

    /// Log level (default: info)
    #[arg(long, env = "LOG_LEVEL")]
    pub loglevel: Option<String>,
}

impl Args {
    /// Load the config file, if any, and apply flag overrides.
    ///
    /// The result is not validated.
    pub fn into_config(self) -> Result<GatewayConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => GatewayConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }

    /// An unrecognized `--loglevel`, which is ignored in favour of the config.
    pub fn unknown_log_level(&self) -> Option<&str> {
        self.loglevel
            .as_deref()
            .filter(|level| !LOG_LEVELS.contains(&level.to_lowercase().as_str()))
    }

    fn apply(&self, config: &mut GatewayConfig) {
        if let Some(port) = self.port.filter(|p| *p != 0) {
            config.listener.bind_address = format!("0.0.0.0:{}", port);
        }

        match (non_empty(&self.cert), non_empty(&self.key)) {
            (Some(cert), Some(key)) => {
                config.listener.tls = Some(TlsConfig {
                    cert_path: cert.clone(),
                    key_path: key.clone(),
                });
            }
            // A lone certificate does not enable TLS but still serves as the fallback CA.
            (Some(cert), None) => {
                if config.datasources.service_ca_file.is_none() {
                    config.datasources.service_ca_file = Some(cert.clone());
                }
            }
            _ => {}
        }

        if let Some(path) = non_empty(&self.static_path) {
            config.static_files.path = path.clone();
        }
        if let Some(ns) = self.dashboards_namespace.as_ref().filter(|ns| !ns.is_empty()) {
            config.datasources.namespace = ns.clone();
        }
        if let Some(path) = non_empty(&self.service_ca_file) {
            config.datasources.service_ca_file = Some(path.clone());
        }
        if let Some(level) = &self.loglevel {
            if self.unknown_log_level().is_none() {
                config.observability.log_level = level.to_lowercase();
            }
        }
    }
}

fn non_empty(path: &Option<PathBuf>) -> Option<&PathBuf> {
    path.as_ref().filter(|p| !p.as_os_str().is_empty())
}
