//! A reverse proxy bound to one datasource upstream.
//!
//! # Responsibilities
//! - Rewrite the inbound URI onto the upstream base URL
//! - Forward method, headers and body as a stream
//! - Relay the response as a stream, minus filtered headers
//!
//! # Design Decisions
//! - Bodies are never buffered; frames are written out as they arrive,
//!   so long-polling and streamed dashboard queries see data immediately
//! - Built once per descriptor/trust revision and shared via `Arc`

use std::net::IpAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::uri::InvalidUri;
use axum::http::{header, Request, Response, StatusCode, Uri, Version};
use axum::response::IntoResponse;
use hyper::body::Incoming;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use url::Url;

use crate::config::UpstreamConfig;
use crate::proxy::connector::UpstreamConnector;
use crate::proxy::headers::{append_forwarded_for, filter_response_headers, strip_hop_by_hop};
use crate::proxy::tls::TrustBundle;
use crate::proxy::ProxyBuildError;

/// Fully configured proxy handle for one datasource.
pub struct DatasourceProxy {
    name: String,
    upstream: Url,
    client: Client<UpstreamConnector, Body>,
}

impl DatasourceProxy {
    pub fn new(
        name: &str,
        upstream: Url,
        trust: &TrustBundle,
        settings: &UpstreamConfig,
    ) -> Result<Self, ProxyBuildError> {
        let connector = UpstreamConnector::new(trust.client_config()?, settings);
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(settings.pool_idle_timeout_secs))
            .build(connector);

        Ok(Self {
            name: name.to_string(),
            upstream,
            client,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn upstream(&self) -> &Url {
        &self.upstream
    }

    /// Map a request path (already stripped of the routing prefix) and query
    /// onto the upstream URL.
    pub fn upstream_uri(&self, path: &str, query: Option<&str>) -> Result<Uri, InvalidUri> {
        let mut target = format!(
            "{}://{}{}",
            self.upstream.scheme(),
            authority(&self.upstream),
            join_paths(self.upstream.path(), path)
        );

        let base_query = self.upstream.query().filter(|q| !q.is_empty());
        let request_query = query.filter(|q| !q.is_empty());
        match (base_query, request_query) {
            (Some(base), Some(extra)) => {
                target.push('?');
                target.push_str(base);
                target.push('&');
                target.push_str(extra);
            }
            (Some(q), None) | (None, Some(q)) => {
                target.push('?');
                target.push_str(q);
            }
            (None, None) => {}
        }

        Uri::try_from(target)
    }

    /// Forward `request` upstream, targeting `path` on the upstream.
    pub async fn forward(&self, request: Request<Body>, path: &str, client: Option<IpAddr>) -> Response<Body> {
        let (mut parts, body) = request.into_parts();

        parts.uri = match self.upstream_uri(path, parts.uri.query()) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::warn!(datasource = %self.name, path = %path, error = %e, "Cannot map request onto upstream");
                return (StatusCode::BAD_REQUEST, "invalid request path").into_response();
            }
        };

        strip_hop_by_hop(&mut parts.headers);
        // The client derives Host from the upstream URI.
        parts.headers.remove(header::HOST);
        if let Some(ip) = client {
            append_forwarded_for(&mut parts.headers, ip);
        }
        parts.version = Version::HTTP_11;

        tracing::debug!(datasource = %self.name, method = %parts.method, uri = %parts.uri, "Forwarding to datasource");

        match self.client.request(Request::from_parts(parts, body)).await {
            Ok(response) => relay(response),
            Err(e) => {
                tracing::error!(datasource = %self.name, upstream = %self.upstream, error = %e, "Upstream request failed");
                (StatusCode::BAD_GATEWAY, "upstream request failed").into_response()
            }
        }
    }
}

impl std::fmt::Debug for DatasourceProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasourceProxy")
            .field("name", &self.name)
            .field("upstream", &self.upstream.as_str())
            .finish()
    }
}

/// Stream an upstream response back without its filtered headers.
fn relay(response: Response<Incoming>) -> Response<Body> {
    let (mut parts, body) = response.into_parts();
    filter_response_headers(&mut parts.headers);
    Response::from_parts(parts, Body::new(body))
}

fn authority(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

/// Join two URL paths with exactly one slash between them.
fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) if !path.is_empty() => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}
