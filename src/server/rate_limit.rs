//! Per-client request budget.
//!
//! Clients are identified by their TCP peer address. `X-Forwarded-For` is
//! only consulted when the gateway is configured to trust a fronting proxy,
//! since any client can put an arbitrary value there.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::state::AppState;

/// Bucket for requests whose peer address is unknown (no `ConnectInfo`).
const UNKNOWN_CLIENT: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

#[derive(Clone, Copy, Debug)]
struct Window {
    opened: Instant,
    used: u32,
}

/// Fixed-window limiter keyed by client IP.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    windows: Arc<DashMap<IpAddr, Window>>,
    budget: u32,
    period: Duration,
}

impl RateLimiter {
    /// Allow `budget` requests per client per minute.
    pub fn per_minute(budget: u32) -> Self {
        Self::with_period(budget, Duration::from_secs(60))
    }

    fn with_period(budget: u32, period: Duration) -> Self {
        Self {
            windows: Arc::new(DashMap::new()),
            budget,
            period,
        }
    }

    /// Count a request from `client`; `false` once its budget is spent.
    fn admit(&self, client: IpAddr) -> bool {
        let now = Instant::now();
        let mut window = self.windows.entry(client).or_insert(Window {
            opened: now,
            used: 0,
        });

        if now.duration_since(window.opened) >= self.period {
            *window = Window {
                opened: now,
                used: 0,
            };
        }

        window.used = window.used.saturating_add(1);
        window.used <= self.budget
    }

    /// Drop windows that have already expired.
    pub fn prune(&self) {
        let period = self.period;
        self.windows.retain(|_, w| w.opened.elapsed() < period);
    }

    /// Prune once per period on the current Tokio runtime.
    pub fn spawn_pruner(&self) {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(limiter.period);
            loop {
                ticker.tick().await;
                limiter.prune();
                debug!("Rate limiter tracking {} clients", limiter.windows.len());
            }
        });
    }
}

/// The address a request is charged to.
///
/// With `trust_forwarded`, the first parseable `X-Forwarded-For` entry wins;
/// otherwise only the peer address counts.
fn client_ip(req: &Request, trust_forwarded: bool) -> IpAddr {
    if trust_forwarded
        && let Some(ip) = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok())
    {
        return ip;
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(UNKNOWN_CLIENT)
}

/// Axum middleware: answer 429 once a client exceeds its budget.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let Some(limiter) = &state.rate_limiter else {
        return next.run(req).await;
    };

    let client = client_ip(&req, state.config.trust_proxy_headers);
    if !limiter.admit(client) {
        warn!("Rate limit exceeded for {}", client);
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded\n").into_response();
    }

    next.run(req).await
}
