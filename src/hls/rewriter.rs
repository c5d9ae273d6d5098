//! Line-level HLS playlist rewriting.
//!
//! Every media reference and every `#EXT-X-KEY` / `#EXT-X-MAP` URI is
//! replaced by a gateway URL carrying the same forwarding context, so the
//! player fetches everything back through the gateway. Works on raw lines
//! instead of a parsed playlist: unknown tags, attribute order and blank
//! lines all survive untouched.

use crate::forward::ForwardingContext;
use crate::gateway::{GatewayVariant, build_gateway_url, resolve};
use std::borrow::Cow;
use tracing::debug;
use url::Url;

/// Directives whose `URI` attribute points at a binary resource.
const URI_DIRECTIVES: [&str; 2] = ["#EXT-X-KEY:", "#EXT-X-MAP:"];

/// Rewrite a playlist so all references route through `gateway_origin`.
///
/// Lines are split on `\n` with an optional preceding `\r` and joined back
/// with `\n`; a trailing newline in the input is kept. Pure and
/// deterministic for identical inputs.
pub fn rewrite_playlist(
    text: &str,
    base: &Url,
    gateway_origin: &str,
    ctx: &ForwardingContext,
) -> String {
    let mut result = String::with_capacity(text.len() * 2);

    for (idx, raw) in text.split('\n').enumerate() {
        if idx > 0 {
            result.push('\n');
        }
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        result.push_str(&rewrite_line(line, base, gateway_origin, ctx));
    }

    result
}

fn rewrite_line<'a>(
    line: &'a str,
    base: &Url,
    gateway_origin: &str,
    ctx: &ForwardingContext,
) -> Cow<'a, str> {
    if is_uri_directive(line) {
        let Some((uri, value_start, value_end)) = extract_quoted_uri(line) else {
            return Cow::Borrowed(line);
        };

        let gateway_url = build_gateway_url(
            gateway_origin,
            &resolve(uri, base),
            ctx,
            GatewayVariant::Passthrough,
        );
        debug!("Rewrote directive URI {} -> {}", uri, gateway_url);

        let mut rewritten = String::with_capacity(line.len() + gateway_url.len());
        rewritten.push_str(&line[..value_start]);
        rewritten.push_str(&gateway_url);
        rewritten.push_str(&line[value_end..]);
        return Cow::Owned(rewritten);
    }

    let trimmed = line.trim();
    if trimmed.is_empty() || line.starts_with('#') {
        return Cow::Borrowed(line);
    }

    Cow::Owned(build_gateway_url(
        gateway_origin,
        &resolve(trimmed, base),
        ctx,
        GatewayVariant::Playlist,
    ))
}

fn is_uri_directive(line: &str) -> bool {
    URI_DIRECTIVES.iter().any(|tag| {
        line.len() >= tag.len()
            && line.as_bytes()[..tag.len()].eq_ignore_ascii_case(tag.as_bytes())
    })
}

/// Find the quoted value of a `URI="..."` attribute.
///
/// The attribute name is matched case-insensitively and must start an
/// attribute (preceded by `:`, `,` or a space). Returns the value and the
/// byte range it occupies inside `line`, excluding the quotes. Empty values
/// count as absent.
pub fn extract_quoted_uri(line: &str) -> Option<(&str, usize, usize)> {
    const MARKER: &[u8] = b"URI=\"";
    let bytes = line.as_bytes();
    let mut from = 0;

    while let Some(offset) = bytes[from..]
        .windows(MARKER.len())
        .position(|w| w.eq_ignore_ascii_case(MARKER))
    {
        let marker_pos = from + offset;
        let starts_attribute =
            marker_pos > 0 && matches!(bytes[marker_pos - 1], b':' | b',' | b' ');

        if starts_attribute {
            let value_start = marker_pos + MARKER.len();
            let value_len = line[value_start..].find('"')?;
            if value_len == 0 {
                return None;
            }
            let value_end = value_start + value_len;
            return Some((&line[value_start..value_end], value_start, value_end));
        }

        from = marker_pos + 1;
    }

    None
}
