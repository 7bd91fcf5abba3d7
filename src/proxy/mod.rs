//! Datasource proxy subsystem.
//!
//! # Data Flow
//! ```text
//! /proxy/{name}/... request
//!     → builder.rs (cached proxy, or snapshot + build + cache)
//!     → tls.rs (trust override or fallback bundle → rustls config)
//!     → connector.rs (TCP dial, TLS handshake)
//!     → upstream.rs (URI rewrite, header hygiene, streamed forward)
//!     → headers.rs (response header filtering)
//! ```
//!
//! # Design Decisions
//! - Proxies are built lazily on first use, never by the watcher
//! - A build failure is logged and surfaces as 404 to the caller
//! - Each datasource gets its own connection pool and trust roots

pub mod builder;
pub mod connector;
pub mod headers;
pub mod tls;
pub mod upstream;

use std::path::PathBuf;

use thiserror::Error;

use crate::datasources::types::TargetError;

pub use builder::ProxyBuilder;
pub use tls::TrustBundle;
pub use upstream::DatasourceProxy;

/// Reasons a proxy cannot be built for a datasource.
#[derive(Debug, Error)]
pub enum ProxyBuildError {
    #[error("no trust override and no fallback CA file configured")]
    NoTrustMaterial,

    #[error("cannot read fallback CA file {path:?}: {source}")]
    ReadFallback {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("trust bundle is empty")]
    EmptyTrust,

    #[error("trust bundle contains no usable certificate")]
    NoCertificates,

    #[error(transparent)]
    Target(#[from] TargetError),

    #[error("cannot build TLS client configuration: {0}")]
    Tls(#[from] rustls::Error),
}

impl ProxyBuildError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            ProxyBuildError::NoTrustMaterial | ProxyBuildError::ReadFallback { .. } => "fallback_ca",
            ProxyBuildError::EmptyTrust | ProxyBuildError::NoCertificates => "trust_bundle",
            ProxyBuildError::Target(_) => "target",
            ProxyBuildError::Tls(_) => "tls",
        }
    }
}
