//! Request handlers.
//!
//! # Routes
//! - `GET /health`: liveness
//! - `GET /api/v1/datasources/{name}`: the stored descriptor as JSON
//! - `ANY /proxy/{datasource}/...`: forwarded to the datasource upstream

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, Path, State},
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
};

use crate::datasources::is_dns_name;
use crate::http::request::request_id;
use crate::http::server::AppState;

const INVALID_NAME: &str = "invalid datasource name";

pub async fn health() -> &'static str {
    "ok"
}

/// `GET /api/v1/datasources/{name}`
pub async fn describe_datasource(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Response {
    if name.is_empty() || !is_dns_name(&name) {
        tracing::warn!(datasource = %name, "Invalid datasource name");
        return (StatusCode::BAD_REQUEST, INVALID_NAME).into_response();
    }

    let Some(datasource) = state.registry.get(&name) else {
        tracing::warn!(datasource = %name, "Datasource not found");
        return (StatusCode::NOT_FOUND, "datasource not found").into_response();
    };

    match serde_json::to_vec(&datasource) {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => {
            tracing::error!(datasource = %name, error = %e, "Cannot serialize datasource");
            (StatusCode::INTERNAL_SERVER_ERROR, "cannot marshal datasource info").into_response()
        }
    }
}

/// `/api/v1/datasources/` with no name.
pub async fn describe_without_name() -> Response {
    tracing::warn!("Datasource name was not provided");
    (StatusCode::BAD_REQUEST, INVALID_NAME).into_response()
}

/// `ANY /proxy/{datasource}/...`
pub async fn proxy_datasource(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    request: Request<Body>,
) -> Response {
    let name = params.get("datasource").map(String::as_str).unwrap_or_default();

    if name.is_empty() {
        tracing::warn!("Cannot proxy request, datasource name was not provided");
        return (
            StatusCode::BAD_REQUEST,
            "cannot proxy request, datasource name was not provided",
        )
            .into_response();
    }
    if !is_dns_name(name) {
        tracing::warn!(datasource = %name, "Invalid datasource name");
        return (StatusCode::BAD_REQUEST, INVALID_NAME).into_response();
    }

    let Some(proxy) = state.builder.resolve(name).await else {
        tracing::error!(datasource = %name, "Cannot proxy request, invalid datasource proxy");
        return (
            StatusCode::NOT_FOUND,
            "cannot proxy request, invalid datasource proxy",
        )
            .into_response();
    };

    let Some(path) = strip_proxy_prefix(request.uri().path()).map(str::to_string) else {
        tracing::warn!(datasource = %name, path = %request.uri().path(), "Request path is not under /proxy/");
        return (StatusCode::NOT_FOUND, "cannot proxy request, invalid path").into_response();
    };
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    tracing::debug!(
        request_id = %request_id(request.headers()),
        datasource = %name,
        path = %path,
        "Proxying request"
    );

    proxy.forward(request, &path, client).await
}

/// Drop the `/proxy/{name}` segments from the raw request path.
///
/// The name segment is cut structurally, so a percent-encoded name never
/// leaks into the upstream path. An empty remainder becomes `/`.
pub fn strip_proxy_prefix(path: &str) -> Option<&str> {
    let after = path.strip_prefix("/proxy/")?;
    match after.find('/') {
        Some(idx) => Some(&after[idx..]),
        None => Some("/"),
    }
}
