//! Header hygiene for proxied traffic.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers from requests before they go upstream
//! - Strip hop-by-hop and CORS headers from upstream responses
//! - Append the client address to X-Forwarded-For
//!
//! # Design Decisions
//! - CORS is the gateway's decision, never the datasource's
//! - Some of these headers are forbidden in HTTP/2 and break browsers
//!   when relayed

use std::net::IpAddr;

use axum::http::header::{self, HeaderMap, HeaderValue};

/// Response headers an upstream may not pass through the gateway.
pub const FILTERED_RESPONSE_HEADERS: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "access-control-allow-headers",
    "access-control-allow-methods",
    "access-control-allow-origin",
    "access-control-expose-headers",
];

/// Hop-by-hop request headers (RFC 9110 §7.6.1 plus legacy names).
const HOP_BY_HOP_REQUEST_HEADERS: [&str; 9] = [
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Remove the headers listed in [`FILTERED_RESPONSE_HEADERS`] and any
/// named in the upstream's `Connection` header.
pub fn filter_response_headers(headers: &mut HeaderMap) {
    remove_connection_listed(headers);
    for name in FILTERED_RESPONSE_HEADERS {
        headers.remove(name);
    }
}

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    remove_connection_listed(headers);
    for name in HOP_BY_HOP_REQUEST_HEADERS {
        headers.remove(name);
    }
}

fn remove_connection_listed(headers: &mut HeaderMap) {
    let listed: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    for name in listed {
        headers.remove(name.as_str());
    }
}

/// Append `client` to any existing X-Forwarded-For chain.
pub fn append_forwarded_for(headers: &mut HeaderMap, client: IpAddr) {
    let chain = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.trim().is_empty() => format!("{}, {}", existing, client),
        _ => client.to_string(),
    };

    if let Ok(value) = HeaderValue::from_str(&chain) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_response_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("connection", HeaderValue::from_static("keep-alive"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("proxy-connection", HeaderValue::from_static("keep-alive"));
        headers.insert("transfer-encoding", HeaderValue::from_static("chunked"));
        headers.insert("upgrade", HeaderValue::from_static("h2c"));
        headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
        headers.insert("access-control-allow-methods", HeaderValue::from_static("GET"));
        headers.insert("access-control-allow-headers", HeaderValue::from_static("x-custom"));
        headers.insert("access-control-expose-headers", HeaderValue::from_static("x-custom"));
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        headers.insert("access-control-max-age", HeaderValue::from_static("600"));

        filter_response_headers(&mut headers);

        assert_eq!(headers.len(), 2);
        assert!(headers.contains_key("content-type"));
        assert!(headers.contains_key("access-control-max-age"));
    }

    #[test]
    fn test_filter_response_headers_honours_connection_list() {
        let mut headers = HeaderMap::new();
        headers.insert("connection", HeaderValue::from_static("close, X-Backend-Hop"));
        headers.insert("x-backend-hop", HeaderValue::from_static("1"));
        headers.insert("content-type", HeaderValue::from_static("text/plain"));

        filter_response_headers(&mut headers);

        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key("content-type"));
    }

    #[test]
    fn test_strip_hop_by_hop_honours_connection_list() {
        let mut headers = HeaderMap::new();
        headers.insert("connection", HeaderValue::from_static("close, X-Session-Hint"));
        headers.insert("x-session-hint", HeaderValue::from_static("abc"));
        headers.insert("te", HeaderValue::from_static("trailers"));
        headers.insert("authorization", HeaderValue::from_static("Bearer token"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key("authorization"));
    }

    #[test]
    fn test_forwarded_for_chain() {
        let mut headers = HeaderMap::new();
        append_forwarded_for(&mut headers, "10.0.0.1".parse().unwrap());
        assert_eq!(headers[X_FORWARDED_FOR], "10.0.0.1");

        append_forwarded_for(&mut headers, "10.0.0.2".parse().unwrap());
        assert_eq!(headers[X_FORWARDED_FOR], "10.0.0.1, 10.0.0.2");
    }
}
