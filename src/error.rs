use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{debug, error};

/// Errors that terminate a gateway request.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The `u` query parameter is absent or empty
    #[error("missing param: u")]
    MissingTarget,

    /// The `u` query parameter is not a fetchable absolute URL
    #[error("invalid param: u ({0})")]
    InvalidTarget(String),

    /// Connecting to or sending the request to the upstream failed
    #[error("{0}")]
    UpstreamFetch(#[source] reqwest::Error),

    /// The upstream answered but its body could not be read
    #[error("{0}")]
    UpstreamBody(#[source] reqwest::Error),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::MissingTarget | GatewayError::InvalidTarget(_) => {
                StatusCode::BAD_REQUEST
            }
            GatewayError::UpstreamFetch(_) | GatewayError::UpstreamBody(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }

    /// Whether this error was caused by the upstream rather than the client.
    pub fn is_upstream(&self) -> bool {
        self.status_code() == StatusCode::BAD_GATEWAY
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if self.is_upstream() {
            error!("proxy error: {}", describe(&self));
            let body = format!("Bad Gateway: {}", describe(&self));
            return (status, body).into_response();
        }

        debug!("Rejected client request: {}", self);
        (status, self.to_string()).into_response()
    }
}

/// Render an error together with its source chain.
///
/// reqwest's top-level message ("error sending request for url ...") hides
/// the actual cause (DNS, refused connection, TLS) in its sources.
fn describe(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

pub type Result<T> = std::result::Result<T, GatewayError>;
