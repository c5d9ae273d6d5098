pub mod handlers;
pub mod middleware;
pub mod rate_limit;
pub mod state;
pub mod url_validation;

use crate::config::Config;
use axum::{Router, middleware::from_fn, middleware::from_fn_with_state, routing::get};
use state::AppState;
use tower_http::services::ServeDir;
use tracing::{error, info};

/// Build the gateway router with all routes and middleware.
///
/// Must be called from within a Tokio runtime: the rate limiter's cleanup
/// task is spawned here when rate limiting is enabled.
pub async fn build_router(config: Config) -> Result<Router, reqwest::Error> {
    let static_dir = config.static_dir.clone();
    let state = AppState::new(config)?;

    if let Some(limiter) = &state.rate_limiter {
        limiter.spawn_pruner();
    }

    let router = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::health::serve_metrics))
        .route("/single.m3u", get(handlers::single::serve_single))
        .route("/proxy", get(handlers::proxy::serve_proxy))
        .route("/proxy.m3u8", get(handlers::proxy::serve_proxy))
        .fallback_service(ServeDir::new(static_dir))
        .layer(from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_middleware,
        ))
        .layer(middleware::cors_layer())
        .layer(from_fn(middleware::version_header))
        .layer(from_fn(middleware::preflight_no_content))
        .with_state(state);

    Ok(router)
}

/// Start the Axum HTTP server
pub async fn start(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("0.0.0.0:{}", config.port);

    match &config.public_base_url {
        Some(base) => info!("Rewriting playlists against {}", base),
        None => info!("Rewriting playlists against the request Host"),
    }
    if config.trust_proxy_headers {
        info!("Trusting X-Forwarded-* headers from a fronting proxy");
    }
    if config.rate_limit_rpm > 0 {
        info!("Rate limiting enabled: {} requests/minute per IP", config.rate_limit_rpm);
    }

    let app = build_router(config).await?;

    let listener = match tokio::net::TcpListener::bind(addr.as_str()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    info!("Gateway listening on http://{}", addr);

    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
