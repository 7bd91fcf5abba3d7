//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with all handlers
//! - Serve static plugin assets for everything else
//! - Wire up middleware (timeout, request ID, tracing, metrics)
//! - Serve over plain TCP or TLS until shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{any, get},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::GatewayConfig;
use crate::datasources::DatasourceRegistry;
use crate::http::handlers;
use crate::http::middleware::{no_cache_entrypoint, track_requests};
use crate::http::request::{make_request_span, propagate_request_id_layer, set_request_id_layer};
use crate::lifecycle::shutdown;
use crate::proxy::ProxyBuilder;

/// Grace period for in-flight requests after shutdown is signalled.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<DatasourceRegistry>,
    pub builder: Arc<ProxyBuilder>,
}

/// HTTP server for the datasource gateway.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server serving datasources from `registry`.
    pub fn new(config: GatewayConfig, registry: Arc<DatasourceRegistry>) -> Self {
        let builder = Arc::new(ProxyBuilder::new(
            registry.clone(),
            config.fallback_ca_file(),
            config.upstream.clone(),
        ));
        let state = AppState { registry, builder };

        Self {
            router: Self::build_router(&config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/health", get(handlers::health))
            .route("/api/v1/datasources/", get(handlers::describe_without_name))
            .route("/api/v1/datasources/{name}", get(handlers::describe_datasource))
            .route("/proxy/{datasource}/", any(handlers::proxy_datasource))
            .route("/proxy/{datasource}/{*rest}", any(handlers::proxy_datasource))
            .fallback_service(ServeDir::new(&config.static_files.path))
            .with_state(state)
            .layer(middleware::from_fn(no_cache_entrypoint))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(middleware::from_fn(track_requests))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
            .layer(set_request_id_layer())
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve plain HTTP on `listener` until `shutdown_rx` fires.
    pub async fn run(self, listener: TcpListener, shutdown_rx: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::warn!("Not using TLS");
        tracing::info!(address = %addr, "Listening on http://{}", addr);

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::wait(shutdown_rx))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS on `listener` until `shutdown_rx` fires.
    pub async fn run_tls(
        self,
        listener: std::net::TcpListener,
        tls: RustlsConfig,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;
        tracing::info!(address = %addr, "Listening on https://{}", addr);

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            shutdown::wait(shutdown_rx).await;
            drain.graceful_shutdown(Some(DRAIN_TIMEOUT));
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum_server::from_tcp_rustls(listener, tls)
            .handle(handle)
            .serve(app)
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}
