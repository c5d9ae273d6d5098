use crate::{
    forward::ForwardingContext,
    gateway::{GatewayVariant, build_gateway_url, decode_target},
    metrics,
    server::{
        handlers::{first_param, gateway_origin, query_pairs},
        state::AppState,
    },
};
use axum::{
    extract::{RawQuery, State},
    http::{HeaderMap, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use tracing::debug;

const DEFAULT_CHANNEL_NAME: &str = "Channel";

/// Generate a one-entry M3U that points a player at the gateway.
///
/// No upstream request is made; `u` is only checked for presence.
pub async fn serve_single(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let pairs = query_pairs(query.as_deref());

    let Some(raw_target) = first_param(&pairs, "u") else {
        metrics::record_request("single", 400);
        return (
            StatusCode::BAD_REQUEST,
            [(header::CONTENT_TYPE, "application/x-mpegurl")],
            "# missing param: u\n",
        )
            .into_response();
    };

    let target = decode_target(raw_target.trim());
    let name = channel_name(first_param(&pairs, "name"));
    let ctx = ForwardingContext::from_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));

    let origin = gateway_origin(&state.config, &headers, &uri);
    let gateway_url = build_gateway_url(&origin, &target, &ctx, GatewayVariant::Playlist);
    debug!("Generated single-channel playlist {:?} -> {}", name, gateway_url);

    let disposition = format!(
        "inline; filename=\"{}.m3u\"",
        urlencoding::encode(&name)
    );
    let body = format!("#EXTM3U\n#EXTINF:-1,{}\n{}\n", name, gateway_url);

    metrics::record_request("single", 200);
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/x-mpegurl; charset=utf-8".to_string()),
            (header::CACHE_CONTROL, "no-store".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}

/// Display name for the `#EXTINF` line; line breaks would corrupt the file.
fn channel_name(raw: Option<&str>) -> String {
    let name: String = raw
        .unwrap_or(DEFAULT_CHANNEL_NAME)
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect();

    match name.trim() {
        "" => DEFAULT_CHANNEL_NAME.to_string(),
        trimmed => trimmed.to_string(),
    }
}
