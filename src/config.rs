use crate::forward::{DEFAULT_ACCEPT_LANGUAGE, ForwardingPolicy, UserAgentOverrides};
use std::env;
use std::time::Duration;

/// Default listening port
pub const DEFAULT_PORT: u16 = 10000;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    /// Fixed origin used in rewritten URLs. When unset, derived per request
    /// from the forwarded/Host headers.
    pub public_base_url: Option<String>,
    /// Directory served for the landing page and other static assets
    pub static_dir: String,
    /// Upstream header policy (default Accept-Language, host UA overrides)
    pub forwarding: ForwardingPolicy,
    /// Deadline for establishing the upstream connection
    pub upstream_connect_timeout: Duration,
    /// Deadline for each upstream read
    pub upstream_read_timeout: Duration,
    /// Maximum number of upstream redirects followed
    pub max_redirects: usize,
    /// Reject targets that are loopback/private IP literals
    pub block_private_targets: bool,
    /// Per-IP requests per minute (0 disables rate limiting)
    pub rate_limit_rpm: u32,
    /// Honour `X-Forwarded-*` headers from a fronting reverse proxy
    pub trust_proxy_headers: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            public_base_url: None,
            static_dir: "public".to_string(),
            forwarding: ForwardingPolicy::default(),
            upstream_connect_timeout: Duration::from_secs(10),
            upstream_read_timeout: Duration::from_secs(30),
            max_redirects: 10,
            block_private_targets: false,
            rate_limit_rpm: 0,
            trust_proxy_headers: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    /// Every variable is optional; malformed values fail startup.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let defaults = Config::default();

        let port = match env::var("PORT") {
            Ok(v) => v.parse::<u16>().map_err(|e| format!("invalid PORT {:?}: {}", v, e))?,
            Err(_) => defaults.port,
        };

        // Trailing slash would double up in "{origin}/proxy"
        let public_base_url = env::var("PUBLIC_BASE_URL")
            .ok()
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty());

        let static_dir = env::var("STATIC_DIR").unwrap_or(defaults.static_dir);

        let default_accept_language = env::var("DEFAULT_ACCEPT_LANGUAGE")
            .unwrap_or_else(|_| DEFAULT_ACCEPT_LANGUAGE.to_string());

        // Built-in host overrides, then the file, then the inline JSON
        let mut user_agents = UserAgentOverrides::builtin();
        if let Ok(path) = env::var("UA_OVERRIDES_FILE") {
            let json = std::fs::read_to_string(&path)
                .map_err(|e| format!("failed to read UA_OVERRIDES_FILE {}: {}", path, e))?;
            user_agents.extend(
                UserAgentOverrides::from_json(&json)
                    .map_err(|e| format!("invalid JSON in UA_OVERRIDES_FILE {}: {}", path, e))?,
            );
        }
        if let Ok(json) = env::var("UA_OVERRIDES") {
            user_agents.extend(
                UserAgentOverrides::from_json(&json)
                    .map_err(|e| format!("invalid JSON in UA_OVERRIDES: {}", e))?,
            );
        }

        let upstream_connect_timeout =
            secs_var("UPSTREAM_CONNECT_TIMEOUT_SECS", defaults.upstream_connect_timeout)?;
        let upstream_read_timeout =
            secs_var("UPSTREAM_READ_TIMEOUT_SECS", defaults.upstream_read_timeout)?;

        let max_redirects = match env::var("MAX_REDIRECTS") {
            Ok(v) => v
                .parse::<usize>()
                .map_err(|e| format!("invalid MAX_REDIRECTS {:?}: {}", v, e))?,
            Err(_) => defaults.max_redirects,
        };

        let block_private_targets =
            flag_var("BLOCK_PRIVATE_TARGETS", defaults.block_private_targets);
        let trust_proxy_headers = flag_var("TRUST_PROXY_HEADERS", defaults.trust_proxy_headers);

        let rate_limit_rpm = match env::var("RATE_LIMIT_RPM") {
            Ok(v) => v
                .parse::<u32>()
                .map_err(|e| format!("invalid RATE_LIMIT_RPM {:?}: {}", v, e))?,
            Err(_) => defaults.rate_limit_rpm,
        };

        Ok(Config {
            port,
            public_base_url,
            static_dir,
            forwarding: ForwardingPolicy {
                default_accept_language,
                user_agents,
            },
            upstream_connect_timeout,
            upstream_read_timeout,
            max_redirects,
            block_private_targets,
            rate_limit_rpm,
            trust_proxy_headers,
        })
    }
}

fn secs_var(name: &str, default: Duration) -> Result<Duration, Box<dyn std::error::Error>> {
    match env::var(name) {
        Ok(v) => {
            let secs: u64 = v
                .parse()
                .map_err(|e| format!("invalid {} {:?}: {}", name, v, e))?;
            Ok(Duration::from_secs(secs))
        }
        Err(_) => Ok(default),
    }
}

fn flag_var(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}
