//! Gateway URL construction and reference resolution.

use crate::forward::ForwardingContext;
use std::borrow::Cow;
use tracing::debug;
use url::{Url, form_urlencoded};

/// Which gateway endpoint a rewritten reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayVariant {
    /// `/proxy.m3u8`, for references that may be playlists themselves.
    /// The suffix only helps players that branch on the extension.
    Playlist,
    /// `/proxy`, for binary resources (keys, init segments).
    Passthrough,
}

impl GatewayVariant {
    pub fn path(self) -> &'static str {
        match self {
            GatewayVariant::Playlist => "/proxy.m3u8",
            GatewayVariant::Passthrough => "/proxy",
        }
    }
}

/// Resolve `reference` against `base` using WHATWG URL rules.
///
/// Returns `reference` unchanged when it cannot be resolved, so a single
/// malformed playlist line never aborts a rewrite.
pub fn resolve(reference: &str, base: &Url) -> String {
    match base.join(reference) {
        Ok(url) => url.to_string(),
        Err(e) => {
            debug!("Leaving unresolvable reference {:?} as is: {}", reference, e);
            reference.to_string()
        }
    }
}

/// Build a gateway URL that reproduces a fetch of `target` with `ctx`.
///
/// Query order: `u`, the fixed forwarding keys, then `h_*` keys in the order
/// the client sent them.
pub fn build_gateway_url(
    gateway_origin: &str,
    target: &str,
    ctx: &ForwardingContext,
    variant: GatewayVariant,
) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair("u", target);
    for (key, value) in ctx.query_pairs() {
        query.append_pair(key, value);
    }

    format!(
        "{}{}?{}",
        gateway_origin.trim_end_matches('/'),
        variant.path(),
        query.finish()
    )
}

/// Undo one extra layer of percent-encoding on a `u` value.
///
/// The value has already been query-decoded once. If it still looks encoded
/// (a literal `%25XX` escape, or an encoded `http%3A`/`https%3A` scheme) it is
/// decoded exactly once more. A target that legitimately contains `%25XX`
/// is decoded as well; that ambiguity is accepted.
pub fn decode_target(raw: &str) -> Cow<'_, str> {
    if !looks_double_encoded(raw) {
        return Cow::Borrowed(raw);
    }

    match urlencoding::decode(raw) {
        Ok(decoded) => {
            debug!("Decoded over-encoded target {} -> {}", raw, decoded);
            decoded
        }
        Err(_) => Cow::Borrowed(raw),
    }
}

fn looks_double_encoded(value: &str) -> bool {
    let lower = value.trim_start().to_ascii_lowercase();
    if lower.starts_with("http%3a") || lower.starts_with("https%3a") {
        return true;
    }

    value
        .as_bytes()
        .windows(5)
        .any(|w| w.starts_with(b"%25") && w[3].is_ascii_hexdigit() && w[4].is_ascii_hexdigit())
}
