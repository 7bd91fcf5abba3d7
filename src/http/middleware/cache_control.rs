//! Cache headers for the plugin entry point.
//!
//! The console loads `plugin-entry.js` to discover the plugin's current
//! chunks, so it must never be served from a cache.

use axum::{
    body::Body,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::Response,
};

const ENTRYPOINT_PREFIX: &str = "/plugin-entry.js";

pub async fn no_cache_entrypoint(req: Request<Body>, next: Next) -> Response {
    let entrypoint = req.uri().path().starts_with(ENTRYPOINT_PREFIX);
    let mut response = next.run(req).await;

    if entrypoint {
        let headers = response.headers_mut();
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        );
        headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    }
    response
}
