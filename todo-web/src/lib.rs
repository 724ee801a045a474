//! TODO tool server
//!
//! HTTP front end for the TODO tools: a JSON-RPC endpoint at `/mcp` and a
//! small REST surface under `/api`, both behind bearer-token or API-key
//! authentication and per-route authorization.

pub mod auth;
pub mod handlers;
pub mod routes;
pub mod security;
pub mod server;
pub mod state;

// Re-export main types
pub use server::{TodoServer, TodoServerBuilder};
pub use state::AppState;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    middleware, Router,
};
use security::{rate_limit_middleware, security_headers_middleware, RateLimitConfig, RateLimiter};
use std::sync::Arc;
use std::time::Duration;
use todo_core::TodoError;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::warn;

/// Create the main application router
pub fn create_app(state: AppState) -> Router {
    let server = &state.config.server;

    let origins: Vec<HeaderValue> = server
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_credentials(true)
        .allow_headers([
            AUTHORIZATION,
            ACCEPT,
            CONTENT_TYPE,
            HeaderName::from_static(auth::API_KEY_HEADER),
        ]);

    let limiter = Arc::new(RateLimiter::new(RateLimitConfig::from(server)));
    let timeout = Duration::from_secs(server.request_timeout_secs);
    let body_limit = server.body_limit_bytes;

    Router::new()
        .nest("/api", routes::api_routes(&state))
        .merge(routes::mcp_routes())
        // Innermost first
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TimeoutLayer::new(timeout))
        .layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Error types for the web server
#[derive(thiserror::Error, Debug)]
pub enum WebError {
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    #[error(transparent)]
    Service(TodoError),
}

/// Result type for web operations
pub type WebResult<T> = Result<T, WebError>;
