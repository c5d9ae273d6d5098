//! Response-shaping middleware applied to every route.

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::Response,
};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

static VERSION_HEADER: HeaderName = HeaderName::from_static("x-hlsgate-version");

/// Permissive CORS: any origin, any request header, `GET`/`HEAD`/`OPTIONS`,
/// preflight cached for a day.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(Duration::from_secs(86400))
}

/// Answer `OPTIONS` on any path with `204 No Content`.
///
/// Must sit outside [`cors_layer`], which short-circuits `OPTIONS` with a
/// `200` carrying the CORS headers; only the status is changed here.
pub async fn preflight_no_content(req: Request, next: Next) -> Response {
    let is_options = req.method() == Method::OPTIONS;
    let mut response = next.run(req).await;
    if is_options {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }
    response
}

/// Stamp every response with the running gateway version.
pub async fn version_header(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    response.headers_mut().insert(
        VERSION_HEADER.clone(),
        HeaderValue::from_static(env!("CARGO_PKG_VERSION")),
    );
    response
}
