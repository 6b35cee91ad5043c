// session-server/src/middleware/rate_limiter.rs
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    Error, HttpResponse, ResponseError,
};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// Session creation limits
const MAX_REQUESTS_PER_WINDOW: usize = 5;
const RATE_LIMIT_WINDOW_SECONDS: u64 = 60;

// Custom error for rate limiting
#[derive(Debug)]
struct RateLimitExceeded;

impl fmt::Display for RateLimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rate limit exceeded")
    }
}

impl ResponseError for RateLimitExceeded {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::TooManyRequests()
            .append_header((header::RETRY_AFTER, RATE_LIMIT_WINDOW_SECONDS.to_string()))
            .body("Rate limit exceeded. Please try again later.")
    }
}

/// Per-IP sliding-window limiter for session creation. Matching is by
/// exact path so per-session operations under the same prefix are not
/// throttled.
#[derive(Debug, Clone, Default)]
pub struct RateLimiter {
    paths: Vec<String>,
    max_requests: usize,
    window: Duration,
    store: Arc<Mutex<HashMap<String, Vec<Instant>>>>,
}

impl RateLimiter {
    pub fn new(paths: Vec<String>) -> Self {
        Self {
            paths,
            max_requests: MAX_REQUESTS_PER_WINDOW,
            window: Duration::from_secs(RATE_LIMIT_WINDOW_SECONDS),
            store: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_limit(mut self, max_requests: usize, window: Duration) -> Self {
        self.max_requests = max_requests;
        self.window = window;
        self
    }

    fn is_rate_limited(&self, ip: &str) -> bool {
        let mut store = self.store.lock().unwrap();
        let now = Instant::now();

        let hits = store.entry(ip.to_string()).or_default();
        hits.retain(|time| now.duration_since(*time) < self.window);

        if hits.len() >= self.max_requests {
            true
        } else {
            hits.push(now);
            false
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimiter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RateLimiterMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimiterMiddleware {
            service,
            limiter: self.clone(),
        }))
    }
}

pub struct RateLimiterMiddleware<S> {
    service: S,
    limiter: RateLimiter,
}

impl<S, B> Service<ServiceRequest> for RateLimiterMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<ServiceResponse<B>, Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let path = req.path().to_string();
        let should_rate_limit = self.limiter.paths.iter().any(|p| path == *p);

        if should_rate_limit {
            let ip = req
                .connection_info()
                .realip_remote_addr()
                .unwrap_or("unknown")
                .to_string();

            if self.limiter.is_rate_limited(&ip) {
                tracing::warn!("Rate limit exceeded for IP: {}", ip);

                return Box::pin(async { Err(RateLimitExceeded.into()) });
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move { fut.await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_the_configured_burst_then_rejects() {
        let limiter = RateLimiter::new(vec!["/api/session".to_string()])
            .with_limit(3, Duration::from_secs(60));

        for _ in 0..3 {
            assert!(!limiter.is_rate_limited("10.0.0.1"));
        }
        assert!(limiter.is_rate_limited("10.0.0.1"));
    }

    #[test]
    fn limits_are_tracked_per_ip() {
        let limiter = RateLimiter::new(vec!["/api/session".to_string()])
            .with_limit(1, Duration::from_secs(60));

        assert!(!limiter.is_rate_limited("10.0.0.1"));
        assert!(limiter.is_rate_limited("10.0.0.1"));
        assert!(!limiter.is_rate_limited("10.0.0.2"));
    }
}
