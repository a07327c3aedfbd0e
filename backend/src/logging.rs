use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber. `RUST_LOG` wins over `default_level`.
pub fn init(default_level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Middleware that logs every HTTP request. Gate refusals and server errors
/// are raised to WARN so they stand out in the admin audit trail.
pub async fn request_logger(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let duration_ms = start.elapsed().as_millis();

    match status {
        401 | 403 | 500..=599 => tracing::warn!(
            method = %method,
            path = %path,
            status = %status,
            duration_ms = %duration_ms,
            "HTTP request"
        ),
        _ => tracing::info!(
            method = %method,
            path = %path,
            status = %status,
            duration_ms = %duration_ms,
            "HTTP request"
        ),
    }

    response
}
