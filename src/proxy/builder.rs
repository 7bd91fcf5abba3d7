//! Lazy construction and caching of datasource proxies.
//!
//! # Responsibilities
//! - Return the cached proxy for a datasource when one exists
//! - Otherwise assemble trust, resolve the target and build a new one
//! - Cache the result unless the datasource changed in the meantime
//!
//! # Design Decisions
//! - The registry lock is never held across the build
//! - Concurrent first requests may build twice; one of the results wins
//! - Without trust material there is no proxy, never an insecure one

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::UpstreamConfig;
use crate::datasources::registry::{DatasourceRegistry, Snapshot};
use crate::observability::metrics;
use crate::proxy::tls::TrustBundle;
use crate::proxy::upstream::DatasourceProxy;
use crate::proxy::ProxyBuildError;

/// Builds proxies on demand from registry state.
pub struct ProxyBuilder {
    registry: Arc<DatasourceRegistry>,
    fallback_ca_file: Option<PathBuf>,
    upstream: UpstreamConfig,
}

impl ProxyBuilder {
    pub fn new(
        registry: Arc<DatasourceRegistry>,
        fallback_ca_file: Option<PathBuf>,
        upstream: UpstreamConfig,
    ) -> Self {
        Self {
            registry,
            fallback_ca_file,
            upstream,
        }
    }

    /// Get a usable proxy for `name`, building and caching it if needed.
    ///
    /// Returns `None` when the datasource is unknown or cannot be proxied;
    /// the reason is logged.
    pub async fn resolve(&self, name: &str) -> Option<Arc<DatasourceProxy>> {
        if let Some(proxy) = self.registry.cached_proxy(name) {
            metrics::record_proxy_cache("hit");
            return Some(proxy);
        }

        let snapshot = self.registry.snapshot(name)?;
        metrics::record_proxy_cache("miss");

        match self.build(name, &snapshot).await {
            Ok(proxy) => {
                let proxy = Arc::new(proxy);
                if !self.registry.cache_if_current(name, snapshot.revision, proxy.clone()) {
                    tracing::debug!(datasource = %name, "Datasource changed during build; proxy not cached");
                }
                tracing::info!(datasource = %name, upstream = %proxy.upstream(), "Created datasource proxy");
                Some(proxy)
            }
            Err(e) => {
                metrics::record_proxy_build_failure(e.reason());
                tracing::error!(datasource = %name, error = %e, "Cannot create datasource proxy");
                None
            }
        }
    }

    async fn build(&self, name: &str, snapshot: &Snapshot) -> Result<DatasourceProxy, ProxyBuildError> {
        let pem = match snapshot.trust.as_deref().filter(|pem| !pem.trim().is_empty()) {
            Some(pem) => pem.to_string(),
            None => {
                tracing::debug!(datasource = %name, "No trust override; using fallback CA file");
                self.read_fallback().await?
            }
        };
        let trust = TrustBundle::from_pem(&pem)?;
        let upstream = snapshot.datasource.target_url()?;

        DatasourceProxy::new(name, upstream, &trust, &self.upstream)
    }

    async fn read_fallback(&self) -> Result<String, ProxyBuildError> {
        let path = self.fallback_ca_file.as_deref().ok_or(ProxyBuildError::NoTrustMaterial)?;
        read_pem(path).await
    }
}

async fn read_pem(path: &Path) -> Result<String, ProxyBuildError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ProxyBuildError::ReadFallback {
            path: path.to_path_buf(),
            source,
        })
}

impl std::fmt::Debug for ProxyBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyBuilder")
            .field("fallback_ca_file", &self.fallback_ca_file)
            .finish_non_exhaustive()
    }
}
