//! Security middleware: response hardening headers and per-client rate limiting

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::{
    collections::HashMap,
    net::{IpAddr, SocketAddr},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use todo_core::ServerConfig;
use tracing::{debug, warn};

/// Rate limiting configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests allowed per window; 0 disables the limiter
    pub max_requests: u32,
    pub window: Duration,
    /// Honour `X-Forwarded-For` when identifying the client
    pub trust_proxy: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(15 * 60),
            trust_proxy: false,
        }
    }
}

impl From<&ServerConfig> for RateLimitConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            max_requests: config.rate_limit_requests,
            window: Duration::from_secs(config.rate_limit_window_secs),
            trust_proxy: config.trust_proxy,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window request counter keyed by client address
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<Option<IpAddr>, Window>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Record a request and report whether it is within the limit
    pub fn check(&self, client: Option<IpAddr>) -> bool {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: Option<IpAddr>, now: Instant) -> bool {
        if self.config.max_requests == 0 {
            return true;
        }

        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());

        // Drop windows that have run out so the map stays bounded by active clients
        let span = self.config.window;
        windows.retain(|_, w| now.duration_since(w.started) < span);

        let window = windows.entry(client).or_insert(Window {
            started: now,
            count: 0,
        });

        if window.count >= self.config.max_requests {
            return false;
        }

        window.count += 1;
        debug!(count = window.count, "Request counted against rate limit");
        true
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_ip(&request, limiter.config().trust_proxy);

    if !limiter.check(client) {
        warn!("Rate limit exceeded");
        let retry_after = limiter.config().window.as_secs();
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "Too many requests from this IP",
                "retryAfter": retry_after,
            })),
        )
            .into_response();
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        return response;
    }

    next.run(request).await
}

/// Security headers middleware
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(
            "default-src 'self'; style-src 'self' 'unsafe-inline'; script-src 'self'; img-src 'self' data: https:",
        ),
    );
    headers.insert(
        header::STRICT_TRANSPORT_SECURITY,
        HeaderValue::from_static("max-age=31536000; includeSubDomains; preload"),
    );
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN"));
    headers.insert(header::REFERRER_POLICY, HeaderValue::from_static("no-referrer"));

    response
}

/// Client address: the socket peer, or the first `X-Forwarded-For` hop when
/// the proxy is trusted
fn client_ip(request: &Request, trust_proxy: bool) -> Option<IpAddr> {
    let forwarded = trust_proxy
        .then(|| {
            request
                .headers()
                .get("x-forwarded-for")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.split(',').next())
                .and_then(|first| first.trim().parse().ok())
        })
        .flatten();

    forwarded.or_else(|| {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max_requests,
            window: Duration::from_secs(60),
            trust_proxy: false,
        })
    }

    #[test]
    fn test_limit_per_client() {
        let limiter = limiter(2);
        let now = Instant::now();
        let a: Option<IpAddr> = "10.0.0.1".parse().ok();
        let b: Option<IpAddr> = "10.0.0.2".parse().ok();

        assert!(limiter.check_at(a, now));
        assert!(limiter.check_at(a, now));
        assert!(!limiter.check_at(a, now));
        assert!(limiter.check_at(b, now));
    }

    #[test]
    fn test_window_resets() {
        let limiter = limiter(1);
        let start = Instant::now();

        assert!(limiter.check_at(None, start));
        assert!(!limiter.check_at(None, start + Duration::from_secs(30)));
        assert!(limiter.check_at(None, start + Duration::from_secs(61)));
    }

    #[test]
    fn test_zero_disables() {
        let limiter = limiter(0);
        for _ in 0..1000 {
            assert!(limiter.check(None));
        }
    }

    fn request_from(peer: &str, forwarded: &str) -> Request {
        let mut request = axum::http::Request::builder()
            .uri("/")
            .header("x-forwarded-for", forwarded)
            .body(axum::body::Body::empty())
            .unwrap();
        let peer: SocketAddr = peer.parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(peer));
        request
    }

    #[test]
    fn test_forwarded_header_ignored_by_default() {
        let request = request_from("192.0.2.7:5000", "10.0.0.1");
        assert_eq!(client_ip(&request, false), "192.0.2.7".parse().ok());
    }

    #[test]
    fn test_forwarded_header_used_behind_trusted_proxy() {
        let request = request_from("192.0.2.7:5000", "10.0.0.1, 172.16.0.1");
        assert_eq!(client_ip(&request, true), "10.0.0.1".parse().ok());

        let garbage = request_from("192.0.2.7:5000", "not-an-ip");
        assert_eq!(client_ip(&garbage, true), "192.0.2.7".parse().ok());
    }
}
