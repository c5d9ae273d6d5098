use crate::{config::Config, metrics, server::rate_limit::RateLimiter};
use metrics_exporter_prometheus::PrometheusHandle;
use reqwest::{Client, redirect};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Shared HTTP client for upstream fetches (connection pooling, deadlines)
    pub http_client: Client,
    /// Per-IP rate limiter (None = disabled)
    pub rate_limiter: Option<RateLimiter>,
    /// Renders the `/metrics` endpoint
    pub metrics: PrometheusHandle,
    /// Server start time, for the health endpoint
    pub started_at: Instant,
}

impl AppState {
    /// Create a new AppState with the given configuration
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .connect_timeout(config.upstream_connect_timeout)
            .read_timeout(config.upstream_read_timeout)
            .redirect(redirect::Policy::limited(config.max_redirects))
            .build()?;

        let rate_limiter =
            (config.rate_limit_rpm > 0).then(|| RateLimiter::per_minute(config.rate_limit_rpm));

        Ok(Self {
            config: Arc::new(config),
            http_client,
            rate_limiter,
            metrics: metrics::handle(),
            started_at: Instant::now(),
        })
    }
}
