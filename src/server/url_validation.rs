use crate::error::GatewayError;
use crate::gateway::decode_target;
use std::net::{Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

/// Turn the raw `u` parameter into a fetchable target URL.
///
/// Applies the double-encoding heuristic once, then requires an absolute
/// `http://` or `https://` URL with a host. With `block_private` set, IP
/// literals in loopback, private or link-local ranges are rejected too.
///
/// # Errors
/// Returns [`GatewayError::MissingTarget`] for an empty value and
/// [`GatewayError::InvalidTarget`] for anything that cannot be fetched.
pub fn parse_target(raw: &str, block_private: bool) -> Result<Url, GatewayError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(GatewayError::MissingTarget);
    }

    let decoded = decode_target(raw);
    let target = Url::parse(&decoded)
        .map_err(|e| GatewayError::InvalidTarget(format!("{}: {}", e, decoded)))?;

    validate_target_url(&target, block_private)?;
    Ok(target)
}

/// Validate that a target URL is something the gateway may fetch.
///
/// **IP literals** are checked against blocked ranges only when
/// `block_private` is set. **Hostnames** are accepted without DNS
/// resolution; DNS rebinding is a known limitation.
pub fn validate_target_url(url: &Url, block_private: bool) -> Result<(), GatewayError> {
    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(GatewayError::InvalidTarget(format!(
                "scheme '{scheme}' not allowed, only http/https"
            )));
        }
    }

    let host = url
        .host()
        .ok_or_else(|| GatewayError::InvalidTarget(format!("no host in URL: {url}")))?;

    if !block_private {
        return Ok(());
    }

    match host {
        Host::Ipv4(ip) if is_blocked_ipv4(ip) => Err(GatewayError::InvalidTarget(format!(
            "private or reserved IPv4 address not allowed: {ip}"
        ))),
        Host::Ipv6(ip) if is_blocked_ipv6(ip) => Err(GatewayError::InvalidTarget(format!(
            "private or reserved IPv6 address not allowed: {ip}"
        ))),
        _ => Ok(()),
    }
}

/// Returns `true` for IPv4 addresses in private or reserved ranges.
///
/// Blocked ranges:
/// - `0.0.0.0/8`      "this" network (RFC 1122)
/// - `10.0.0.0/8`     RFC 1918 private
/// - `127.0.0.0/8`    loopback
/// - `169.254.0.0/16` link-local / cloud metadata
/// - `172.16.0.0/12`  RFC 1918 private
/// - `192.168.0.0/16` RFC 1918 private
fn is_blocked_ipv4(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    let (a, b) = (octets[0], octets[1]);

    a == 0
        || a == 10
        || a == 127
        || (a == 169 && b == 254)
        || (a == 172 && (16..=31).contains(&b))
        || (a == 192 && b == 168)
}

/// Returns `true` for IPv6 loopback, unspecified, link-local (`fe80::/10`)
/// and unique-local (`fc00::/7`) addresses.
fn is_blocked_ipv6(ip: Ipv6Addr) -> bool {
    let s = ip.segments();

    ip.is_loopback()
        || ip.is_unspecified()
        || (s[0] & 0xffc0) == 0xfe80
        || (s[0] & 0xfe00) == 0xfc00
}
