//! Per-client rate limiting.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::http::response::{error_response, ErrorBody};
use crate::observability::metrics;

/// Buckets kept before idle (refilled) ones are dropped.
const PRUNE_THRESHOLD: usize = 10_000;

/// A simple token bucket.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_update: now,
        }
    }

    fn refill(&mut self, capacity: f64, refill_rate: f64, now: Instant) {
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;
    }

    /// Take one token, or return how long until one is available.
    fn try_acquire(&mut self, capacity: f64, refill_rate: f64, now: Instant) -> Result<(), Duration> {
        self.refill(capacity, refill_rate, now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            Err(Duration::from_secs_f64((1.0 - self.tokens) / refill_rate))
        }
    }
}

/// Request budget of `max_requests` per `window_secs` for every client.
///
/// The bucket holds up to a full window's worth of requests and refills
/// continuously, so a client that used its budget regains one request every
/// `window / max_requests`.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    capacity: f64,
    refill_rate: f64,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let capacity = f64::from(config.max_requests);
        Self {
            buckets: Mutex::new(HashMap::new()),
            capacity,
            refill_rate: capacity / config.window_secs as f64,
        }
    }

    /// Charge one request to `client`.
    pub fn check(&self, client: &str) -> Result<(), Duration> {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);

        if buckets.len() >= PRUNE_THRESHOLD && !buckets.contains_key(client) {
            let (capacity, rate) = (self.capacity, self.refill_rate);
            buckets.retain(|_, bucket| {
                bucket.refill(capacity, rate, now);
                bucket.tokens < capacity
            });
        }

        buckets
            .entry(client.to_string())
            .or_insert_with(|| TokenBucket::new(self.capacity, now))
            .try_acquire(self.capacity, self.refill_rate, now)
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Reject clients over their budget with 429 and a JSON error body.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    match limiter.check(&client) {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            tracing::warn!(client = %client, path = %request.uri().path(), "Rate limit exceeded");
            metrics::record_rate_limited();

            let mut response = error_response(
                StatusCode::TOO_MANY_REQUESTS,
                ErrorBody {
                    error: "Too Many Requests".to_string(),
                    message: "Too many requests from this IP, please try again later.".to_string(),
                    detail: None,
                },
            );
            let secs = retry_after.as_secs_f64().ceil().max(1.0) as u64;
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
            response
        }
    }
}
