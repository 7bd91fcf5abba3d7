//! Upstream connector.
//!
//! TCP connects are bounded by the (long) dial timeout and kept alive with
//! periodic probes; the TLS handshake on top gets its own short deadline.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::http::uri::Scheme;
use axum::http::Uri;
use hyper_rustls::MaybeHttpsStream;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use rustls::ClientConfig;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tower::Service;

use crate::config::UpstreamConfig;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Stream produced for one upstream connection.
pub type UpstreamStream = MaybeHttpsStream<TokioIo<TcpStream>>;

/// Dials datasource upstreams over TCP, then TLS for `https` targets.
#[derive(Clone)]
pub struct UpstreamConnector {
    http: HttpConnector,
    tls: TlsConnector,
    handshake_timeout: Duration,
}

impl UpstreamConnector {
    pub fn new(tls_config: ClientConfig, settings: &UpstreamConfig) -> Self {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_connect_timeout(Some(Duration::from_secs(settings.connect_timeout_secs)));
        http.set_keepalive(Some(Duration::from_secs(settings.keepalive_secs)));
        http.set_nodelay(true);

        Self {
            http,
            tls: TlsConnector::from(Arc::new(tls_config)),
            handshake_timeout: Duration::from_secs(settings.tls_handshake_timeout_secs),
        }
    }
}

impl Service<Uri> for UpstreamConnector {
    type Response = UpstreamStream;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<UpstreamStream, BoxError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.http.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let tls_host = if uri.scheme() == Some(&Scheme::HTTPS) {
            uri.host()
                .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_string())
        } else {
            None
        };
        let tcp = self.http.call(uri);
        let tls = self.tls.clone();
        let handshake_timeout = self.handshake_timeout;

        Box::pin(connect(tcp, tls_host, tls, handshake_timeout))
    }
}

async fn connect<F, E>(
    tcp: F,
    tls_host: Option<String>,
    tls: TlsConnector,
    handshake_timeout: Duration,
) -> Result<UpstreamStream, BoxError>
where
    F: Future<Output = Result<TokioIo<TcpStream>, E>>,
    E: Into<BoxError>,
{
    let tcp = tcp.await.map_err(Into::<BoxError>::into)?;
    match tls_host {
        None => Ok(MaybeHttpsStream::Http(tcp)),
        Some(host) => handshake(tls, host, tcp, handshake_timeout).await,
    }
}

async fn handshake(
    tls: TlsConnector,
    host: String,
    tcp: TokioIo<TcpStream>,
    timeout: Duration,
) -> Result<UpstreamStream, BoxError> {
    let server_name = ServerName::try_from(host)?;
    let stream = tokio::time::timeout(timeout, tls.connect(server_name, TokioIo::new(tcp)))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "TLS handshake timed out"))??;

    Ok(MaybeHttpsStream::Https(TokioIo::new(stream)))
}
