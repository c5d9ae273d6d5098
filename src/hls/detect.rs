//! Decide whether an upstream response is an HLS playlist.

use url::Url;

/// Content type of every playlist the gateway serves.
pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl; charset=utf-8";

/// Media types that identify an HLS playlist outright.
const HLS_MEDIA_TYPES: [&str; 2] = ["application/vnd.apple.mpegurl", "application/x-mpegurl"];

/// Media types CDNs commonly put on playlists they do not label properly.
/// These defer to the URL extension instead of deciding on their own.
const GENERIC_MEDIA_TYPES: [&str; 5] = [
    "application/octet-stream",
    "binary/octet-stream",
    "text/plain",
    "audio/mpegurl",
    "audio/x-mpegurl",
];

/// Returns `true` when the response should be rewritten as a playlist.
///
/// An HLS content type always wins. A specific non-HLS content type (for
/// example `video/mp2t`) is authoritative even if the path ends in `.m3u8`.
/// Without a content type, or with a generic one, the target path decides.
pub fn is_playlist(content_type: Option<&str>, target: &Url) -> bool {
    let essence = content_type.map(media_type_essence).unwrap_or_default();

    if HLS_MEDIA_TYPES.contains(&essence.as_str()) {
        return true;
    }

    if essence.is_empty() || GENERIC_MEDIA_TYPES.contains(&essence.as_str()) {
        return has_playlist_extension(target);
    }

    false
}

/// `.m3u8` path check; the query string is not part of the path.
pub fn has_playlist_extension(target: &Url) -> bool {
    target.path().to_ascii_lowercase().ends_with(".m3u8")
}

/// `Application/X-MpegURL; charset=UTF-8` -> `application/x-mpegurl`
fn media_type_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
