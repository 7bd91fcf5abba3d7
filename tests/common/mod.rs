//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use datasource_gateway::config::GatewayConfig;
use datasource_gateway::datasources::{Datasource, DatasourceMetadata, DatasourceRegistry};
use datasource_gateway::http::HttpServer;
use datasource_gateway::lifecycle::Shutdown;
use rcgen::{BasicConstraints, CertificateParams, IsCa, KeyPair};
use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

/// Requests seen by a mock backend, as raw request heads.
pub type Seen = Arc<Mutex<Vec<String>>>;

/// Descriptor pointing straight at `url`.
pub fn datasource(name: &str, url: &str) -> Datasource {
    let mut ds = Datasource {
        kind: "Datasource".into(),
        metadata: DatasourceMetadata {
            name: name.into(),
            namespace: "console-dashboards".into(),
        },
        ..Default::default()
    };
    ds.spec.plugin.kind = "PrometheusDatasource".into();
    ds.spec.plugin.spec.direct_url = Some(url.into());
    ds
}

/// Start a plain HTTP backend that records each request head and answers
/// with the request path as body, plus headers the gateway must strip.
pub async fn start_recording_backend() -> (SocketAddr, Seen) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen: Seen = Arc::default();

    let recorded = seen.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let recorded = recorded.clone();
            tokio::spawn(async move {
                respond(socket, recorded).await;
            });
        }
    });

    (addr, seen)
}

/// Start an HTTPS backend for `localhost` signed by a fresh CA.
///
/// Returns the address and the CA certificate in PEM form.
pub async fn start_tls_backend() -> (SocketAddr, String) {
    let ca_key = KeyPair::generate().unwrap();
    let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
    ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let ca_cert = ca_params.self_signed(&ca_key).unwrap();

    let leaf_key = KeyPair::generate().unwrap();
    let leaf_cert = CertificateParams::new(vec!["localhost".to_string()])
        .unwrap()
        .signed_by(&leaf_key, &ca_cert, &ca_key)
        .unwrap();

    let server_config = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .unwrap()
    .with_no_client_auth()
    .with_single_cert(
        vec![leaf_cert.der().clone()],
        PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(leaf_key.serialize_der())),
    )
    .unwrap();
    let acceptor = TlsAcceptor::from(Arc::new(server_config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                if let Ok(stream) = acceptor.accept(socket).await {
                    respond(stream, Seen::default()).await;
                }
            });
        }
    });

    (addr, ca_cert.pem())
}

async fn respond<S>(mut socket: S, seen: Seen)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }

    let head = String::from_utf8_lossy(&head).to_string();
    let path = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    seen.lock().unwrap().push(head);

    let response = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/plain\r\n\
         Content-Length: {}\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Keep-Alive: timeout=5\r\n\
         X-Upstream: mock\r\n\
         X-Backend-Hop: 1\r\n\
         Connection: close, X-Backend-Hop\r\n\r\n{}",
        path.len(),
        path
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Run a gateway on an ephemeral port. Keep the returned `Shutdown` alive
/// for as long as the gateway is needed.
pub async fn start_gateway(mut config: GatewayConfig, registry: Arc<DatasourceRegistry>) -> (SocketAddr, Shutdown) {
    config.listener.bind_address = "127.0.0.1:0".into();
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, registry);
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    (addr, shutdown)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
