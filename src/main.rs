//! Dashboard datasource gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!   ConfigMaps (label-selected)          Browser / console
//!            │                                  │
//!            ▼                                  ▼
//!   ┌──────────────────┐              ┌──────────────────┐
//!   │ DatasourceWatcher│              │   http::server   │
//!   │  (kube watch)    │              │ health/api/proxy │
//!   └────────┬─────────┘              └────────┬─────────┘
//!            │ upsert/set_trust/remove         │ get / resolve
//!            ▼                                  ▼
//!   ┌──────────────────────────────────────────────────────┐
//!   │        DatasourceRegistry (descriptor, CA, proxy)     │
//!   └──────────────────────────────────────────────────────┘
//!                                              │
//!                                              ▼
//!                                   ProxyBuilder → DatasourceProxy ──▶ upstream (TLS)
//! ```

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use datasource_gateway::cli::Args;
use datasource_gateway::config::{validate_config, ConfigError, GatewayConfig};
use datasource_gateway::datasources::{DatasourceRegistry, DatasourceWatcher, KubeConfigMapSource};
use datasource_gateway::lifecycle::{spawn_signal_handler, Shutdown};
use datasource_gateway::net::{install_crypto_provider, load_tls_config};
use datasource_gateway::observability::{logging, metrics};
use datasource_gateway::{GatewayError, HttpServer};

#[tokio::main]
async fn main() -> Result<(), GatewayError> {
    install_crypto_provider();

    let args = Args::parse();
    let unknown_level = args.unknown_log_level().map(str::to_string);
    let config = args.into_config()?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(&config.observability);
    if let Some(level) = unknown_level {
        tracing::error!(level = %level, "Log level not recognized, using {}", config.observability.log_level);
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        namespace = %config.datasources.namespace,
        static_path = %config.static_files.path.display(),
        tls = config.listener.tls.is_some(),
        "datasource-gateway v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr)?;
        }
    }

    let registry = Arc::new(DatasourceRegistry::new());
    let watcher = spawn_watcher(&config, registry.clone()).await;

    let shutdown = Shutdown::new();
    let signals = spawn_signal_handler(&shutdown);
    let shutdown_rx = shutdown.subscribe();

    let server = HttpServer::new(config.clone(), registry);
    let result = match &config.listener.tls {
        Some(tls) => {
            let rustls = load_tls_config(&tls.cert_path, &tls.key_path)
                .await
                .map_err(GatewayError::Tls)?;
            let listener = bind_std(&config.listener.bind_address)?;
            server.run_tls(listener, rustls, shutdown_rx).await
        }
        None => {
            let listener = TcpListener::bind(&config.listener.bind_address)
                .await
                .map_err(|source| GatewayError::Bind {
                    address: config.listener.bind_address.clone(),
                    source,
                })?;
            server.run(listener, shutdown_rx).await
        }
    };

    if let Some(watcher) = watcher {
        watcher.abort();
    }
    signals.abort();

    result.map_err(GatewayError::Server)?;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Start watching ConfigMaps, or keep serving without discovery if the
/// cluster is unreachable.
async fn spawn_watcher(
    config: &GatewayConfig,
    registry: Arc<DatasourceRegistry>,
) -> Option<tokio::task::JoinHandle<()>> {
    match KubeConfigMapSource::connect(&config.datasources).await {
        Ok(source) => {
            let watcher = DatasourceWatcher::new(source, registry, &config.datasources);
            Some(tokio::spawn(watcher.run()))
        }
        Err(e) => {
            tracing::error!(error = %e, "Cannot create Kubernetes client; datasources will not be discovered");
            None
        }
    }
}

fn bind_std(address: &str) -> Result<std::net::TcpListener, GatewayError> {
    std::net::TcpListener::bind(address).map_err(|source| GatewayError::Bind {
        address: address.to_string(),
        source,
    })
}
