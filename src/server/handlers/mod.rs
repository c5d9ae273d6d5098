pub mod health;
pub mod proxy;
pub mod single;

use crate::config::Config;
use axum::http::{HeaderMap, Uri, header};
use url::form_urlencoded;

/// Decode a raw query string into ordered `(key, value)` pairs.
pub(crate) fn query_pairs(query: Option<&str>) -> Vec<(String, String)> {
    query
        .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

/// First non-empty value for `key`.
pub(crate) fn first_param<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, v)| k == key && !v.trim().is_empty())
        .map(|(_, v)| v.as_str())
}

/// The origin clients use to reach this gateway, e.g. `http://gw:10000`.
///
/// `PUBLIC_BASE_URL` wins. Otherwise the `Host` header (or the request
/// authority for HTTP/2) over plain `http`. `X-Forwarded-Proto` and
/// `X-Forwarded-Host` are only honoured with `trust_proxy_headers` set.
pub(crate) fn gateway_origin(config: &Config, headers: &HeaderMap, uri: &Uri) -> String {
    if let Some(base) = &config.public_base_url {
        return base.clone();
    }

    let forwarded = |name: &'static str| {
        config
            .trust_proxy_headers
            .then(|| first_header_value(headers, name))
            .flatten()
    };

    let proto = forwarded("x-forwarded-proto").unwrap_or("http");
    let host = forwarded("x-forwarded-host")
        .or_else(|| first_header_value(headers, header::HOST.as_str()))
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .unwrap_or("localhost");

    format!("{}://{}", proto, host)
}

fn first_header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
