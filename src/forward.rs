//! Forwarding context and upstream header synthesis.
//!
//! A [`ForwardingContext`] is the set of header-affecting query parameters a
//! client attaches to a gateway URL (`ua`, `ref`, `origin`, `cookie`, `xff`,
//! `xip` and any `h_<header>` key). It is carried verbatim through every
//! rewritten playlist reference and turned into outbound headers by
//! [`forward_headers`].

use axum::http::{
    HeaderMap, HeaderName, HeaderValue,
    header::{
        ACCEPT, ACCEPT_LANGUAGE, CONNECTION, CONTENT_LENGTH, COOKIE, HOST, ORIGIN, RANGE,
        REFERER, TRANSFER_ENCODING, USER_AGENT,
    },
};
use std::collections::HashMap;
use tracing::debug;
use url::Url;

/// Fixed forwarding keys in their canonical serialization order.
pub const FIXED_KEYS: [&str; 6] = ["ua", "ref", "origin", "cookie", "xff", "xip"];

/// Prefix marking an arbitrary extra upstream header (`h_x_token` -> `x-token`).
pub const HEADER_KEY_PREFIX: &str = "h_";

/// Default `Accept-Language` sent upstream when the client supplies none.
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// User-Agent used by the built-in host overrides.
pub const OKHTTP_MOD_UA: &str = "okHttp/Mod-1.1.0";

/// Request-scoped forwarding parameters parsed from a gateway query string.
///
/// Empty values are treated as absent. A repeated key keeps the position of
/// its first occurrence and the value of its last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardingContext {
    fixed: [Option<String>; FIXED_KEYS.len()],
    extra: Vec<(String, String)>,
}

impl ForwardingContext {
    /// Build a context from decoded query pairs, ignoring unrelated keys.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut ctx = Self::default();
        for (key, value) in pairs {
            ctx.set(key.as_ref(), value.as_ref());
        }
        ctx
    }

    /// Parse a raw (still percent-encoded) query string.
    pub fn from_query(query: &str) -> Self {
        Self::from_pairs(url::form_urlencoded::parse(query.as_bytes()))
    }

    fn set(&mut self, key: &str, value: &str) {
        if value.is_empty() {
            return;
        }

        if let Some(idx) = FIXED_KEYS.iter().position(|k| *k == key) {
            self.fixed[idx] = Some(value.to_string());
            return;
        }

        if key.len() > HEADER_KEY_PREFIX.len() && key.starts_with(HEADER_KEY_PREFIX) {
            match self.extra.iter_mut().find(|(k, _)| k == key) {
                Some(entry) => entry.1 = value.to_string(),
                None => self.extra.push((key.to_string(), value.to_string())),
            }
        }
    }

    /// Look up a fixed key or a full `h_*` key.
    #[cfg(test)]
    fn get(&self, key: &str) -> Option<&str> {
        if let Some(idx) = FIXED_KEYS.iter().position(|k| *k == key) {
            return self.fixed[idx].as_deref();
        }
        self.extra
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn ua(&self) -> Option<&str> {
        self.fixed[0].as_deref()
    }

    pub fn referer(&self) -> Option<&str> {
        self.fixed[1].as_deref()
    }

    pub fn origin(&self) -> Option<&str> {
        self.fixed[2].as_deref()
    }

    pub fn cookie(&self) -> Option<&str> {
        self.fixed[3].as_deref()
    }

    pub fn xff(&self) -> Option<&str> {
        self.fixed[4].as_deref()
    }

    pub fn xip(&self) -> Option<&str> {
        self.fixed[5].as_deref()
    }

    /// All parameters in canonical order: fixed keys, then `h_*` keys in
    /// encounter order.
    pub fn query_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        FIXED_KEYS
            .iter()
            .zip(self.fixed.iter())
            .filter_map(|(k, v)| v.as_deref().map(|v| (*k, v)))
            .chain(self.extra.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// `h_*` entries as `(header-name, value)`, underscores mapped to hyphens.
    pub fn extra_headers(&self) -> impl Iterator<Item = (String, &str)> {
        self.extra
            .iter()
            .map(|(k, v)| (header_name_for_key(k), v.as_str()))
    }
}

/// Headers an `h_*` key may never set; the HTTP client owns them.
fn is_reserved(name: &HeaderName) -> bool {
    *name == HOST || *name == CONTENT_LENGTH || *name == TRANSFER_ENCODING
}

/// `h_x_client_id` -> `x-client-id`
fn header_name_for_key(key: &str) -> String {
    key[HEADER_KEY_PREFIX.len()..].replace('_', "-")
}

/// Host-to-User-Agent defaults applied when a client gives no User-Agent.
///
/// Keys are lowercased hosts, optionally with an explicit `:port`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserAgentOverrides {
    by_host: HashMap<String, String>,
}

impl UserAgentOverrides {
    /// The table shipped with the gateway.
    pub fn builtin() -> Self {
        let mut table = Self::default();
        table.insert("sub.ottiptv.cc", OKHTTP_MOD_UA);
        table.insert("mursor.ottiptv.cc", OKHTTP_MOD_UA);
        table
    }

    /// Parse a JSON object of `{"host": "user agent"}` entries.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let raw: HashMap<String, String> = serde_json::from_str(json)?;
        let mut table = Self::default();
        for (host, ua) in raw {
            table.insert(&host, &ua);
        }
        Ok(table)
    }

    pub fn insert(&mut self, host: &str, user_agent: &str) {
        self.by_host
            .insert(host.trim().to_ascii_lowercase(), user_agent.to_string());
    }

    /// Merge `other` into this table; entries in `other` win.
    pub fn extend(&mut self, other: UserAgentOverrides) {
        self.by_host.extend(other.by_host);
    }

    pub fn len(&self) -> usize {
        self.by_host.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_host.is_empty()
    }

    /// Find the override for `target`, trying `host:port` before the bare host.
    pub fn lookup(&self, target: &Url) -> Option<&str> {
        let host = target.host_str()?.to_ascii_lowercase();

        if let Some(port) = target.port()
            && let Some(ua) = self.by_host.get(&format!("{}:{}", host, port))
        {
            return Some(ua.as_str());
        }

        self.by_host.get(&host).map(String::as_str)
    }
}

/// Operator configuration consumed by [`forward_headers`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardingPolicy {
    pub default_accept_language: String,
    pub user_agents: UserAgentOverrides,
}

impl Default for ForwardingPolicy {
    fn default() -> Self {
        Self {
            default_accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            user_agents: UserAgentOverrides::builtin(),
        }
    }
}

/// Build the header set sent to the upstream for `target`.
///
/// Precedence, lowest first: generic defaults (`Accept`, `Connection`,
/// `Accept-Language`), the inbound `Range`, `h_*` headers, then the fixed
/// keys. A fixed key therefore wins over an `h_*` key naming the same header.
/// The host override table only applies when the client supplied no
/// User-Agent at all, through `ua` or `h_user-agent`.
pub fn forward_headers(
    inbound: &HeaderMap,
    target: &Url,
    ctx: &ForwardingContext,
    policy: &ForwardingPolicy,
) -> HeaderMap {
    let mut headers = HeaderMap::new();

    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    insert_value(
        &mut headers,
        ACCEPT_LANGUAGE,
        &policy.default_accept_language,
    );

    if let Some(range) = inbound.get(RANGE) {
        headers.insert(RANGE, range.clone());
    }

    for (name, value) in ctx.extra_headers() {
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            debug!("Skipping invalid forwarded header name: {}", name);
            continue;
        };
        if is_reserved(&name) {
            debug!("Skipping reserved forwarded header: {}", name);
            continue;
        }
        insert_value(&mut headers, name, value);
    }

    let fixed = [
        (ctx.ua(), USER_AGENT),
        (ctx.referer(), REFERER),
        (ctx.origin(), ORIGIN),
        (ctx.cookie(), COOKIE),
        (ctx.xff(), HeaderName::from_static("x-forwarded-for")),
        (ctx.xip(), HeaderName::from_static("x-real-ip")),
    ];
    for (value, name) in fixed {
        if let Some(value) = value {
            insert_value(&mut headers, name, value);
        }
    }

    if ctx.ua().is_none()
        && !headers.contains_key(USER_AGENT)
        && let Some(ua) = policy.user_agents.lookup(target)
    {
        debug!("Applying host User-Agent override for {}", target);
        insert_value(&mut headers, USER_AGENT, ua);
    }

    headers
}

fn insert_value(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => debug!("Skipping header {} with invalid value", name),
    }
}
