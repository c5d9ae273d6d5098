use crate::{
    error::{GatewayError, Result},
    forward::{ForwardingContext, forward_headers},
    hls::{PLAYLIST_CONTENT_TYPE, is_playlist, rewrite_playlist},
    metrics,
    server::{
        handlers::{first_param, gateway_origin, query_pairs},
        state::AppState,
        url_validation::parse_target,
    },
};
use axum::{
    body::Body,
    extract::{RawQuery, State},
    http::{HeaderMap, HeaderValue, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use futures_util::TryStreamExt;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Fetch `u` upstream and either rewrite it as a playlist or stream it back.
///
/// Serves both `/proxy` and `/proxy.m3u8`; the path suffix does not change
/// behavior.
pub async fn serve_proxy(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let start = Instant::now();

    let response = match proxy(&state, query.as_deref(), &uri, &headers).await {
        Ok(response) => response,
        Err(e) => {
            if e.is_upstream() {
                metrics::record_upstream_error();
            }
            e.into_response()
        }
    };

    metrics::record_request("proxy", response.status().as_u16());
    metrics::record_duration("proxy", start);
    response
}

async fn proxy(
    state: &AppState,
    query: Option<&str>,
    uri: &Uri,
    inbound: &HeaderMap,
) -> Result<Response> {
    let pairs = query_pairs(query);
    let raw_target = first_param(&pairs, "u").ok_or(GatewayError::MissingTarget)?;
    let target = parse_target(raw_target, state.config.block_private_targets)?;
    let ctx = ForwardingContext::from_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));

    let upstream_headers = forward_headers(inbound, &target, &ctx, &state.config.forwarding);
    info!("Proxying {}", target);

    let upstream = state
        .http_client
        .get(target.as_str())
        .headers(upstream_headers)
        .send()
        .await
        .map_err(GatewayError::UpstreamFetch)?;

    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if is_playlist(content_type.as_deref(), &target) {
        let status = upstream.status();
        let text = upstream.text().await.map_err(GatewayError::UpstreamBody)?;
        let origin = gateway_origin(&state.config, inbound, uri);
        let rewritten = rewrite_playlist(&text, &target, &origin, &ctx);

        metrics::record_playlist_rewrite();
        debug!(
            "Rewrote playlist {} (upstream status {}, {} -> {} bytes)",
            target,
            status,
            text.len(),
            rewritten.len()
        );

        return Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, PLAYLIST_CONTENT_TYPE),
                (header::CACHE_CONTROL, "no-store"),
            ],
            rewritten,
        )
            .into_response());
    }

    let status = upstream.status();
    let mut response_headers = HeaderMap::new();
    for name in [
        header::CONTENT_TYPE,
        header::CONTENT_LENGTH,
        header::ACCEPT_RANGES,
        header::CONTENT_RANGE,
    ] {
        if let Some(value) = upstream.headers().get(&name) {
            response_headers.insert(name, value.clone());
        }
    }
    response_headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    debug!(
        "Streaming {} ({}, {})",
        target,
        status,
        content_type.as_deref().unwrap_or("no content type")
    );

    let stream_target = target.to_string();
    let body = Body::from_stream(upstream.bytes_stream().inspect_err(move |e| {
        warn!("Upstream stream from {} aborted: {}", stream_target, e);
    }));

    Ok((status, response_headers, body).into_response())
}
