//! Listener TLS configuration and certificate loading.

use std::path::Path;
use std::sync::OnceLock;

use axum_server::tls_rustls::RustlsConfig;

/// Install `ring` as the process-wide rustls provider.
///
/// Both the listener and the kube client build rustls configs from the
/// default provider, which must be chosen before either is created.
pub fn install_crypto_provider() {
    static INSTALLED: OnceLock<()> = OnceLock::new();
    INSTALLED.get_or_init(|| {
        // Err means another provider won the race, which is fine.
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Load TLS configuration from certificate and key files.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, std::io::Error> {
    if !cert_path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Certificate file not found: {:?}", cert_path),
        ));
    }
    if !key_path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Private key file not found: {:?}", key_path),
        ));
    }

    install_crypto_provider();
    RustlsConfig::from_pem_file(cert_path, key_path).await
}
