//! Upstream TLS trust.
//!
//! # Design Decisions
//! - Trust comes only from the datasource's own bundle or the fallback file;
//!   there is no "insecure" mode and no system root store
//! - Blocks that fail to parse are skipped, as long as one certificate is usable
//! - TLS 1.2 is the floor; rustls ships no legacy cipher suites

use std::sync::Arc;

use rustls::{ClientConfig, RootCertStore};
use rustls::crypto::ring;
use rustls::pki_types::CertificateDer;

use crate::proxy::ProxyBuildError;

/// A parsed set of trusted root certificates.
#[derive(Debug, Clone)]
pub struct TrustBundle {
    roots: Arc<RootCertStore>,
}

impl TrustBundle {
    /// Parse a PEM bundle. Fails if it holds no usable certificate.
    pub fn from_pem(pem: &str) -> Result<Self, ProxyBuildError> {
        if pem.trim().is_empty() {
            return Err(ProxyBuildError::EmptyTrust);
        }

        let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut pem.as_bytes())
            .filter_map(Result::ok)
            .collect();

        let mut roots = RootCertStore::empty();
        let (added, ignored) = roots.add_parsable_certificates(certs);
        if ignored > 0 {
            tracing::debug!(added, ignored, "Skipped unparsable certificates in trust bundle");
        }
        if added == 0 {
            return Err(ProxyBuildError::NoCertificates);
        }

        Ok(Self {
            roots: Arc::new(roots),
        })
    }

    /// Number of trusted roots.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Client configuration trusting exactly these roots.
    pub fn client_config(&self) -> Result<ClientConfig, rustls::Error> {
        let mut config = ClientConfig::builder_with_provider(Arc::new(ring::default_provider()))
            .with_protocol_versions(&[&rustls::version::TLS13, &rustls::version::TLS12])?
            .with_root_certificates(self.roots.clone())
            .with_no_client_auth();
        config.alpn_protocols = vec![b"http/1.1".to_vec()];
        Ok(config)
    }
}
