use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;
use uuid::Uuid;

use crate::config::RateLimitConfig;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
const ANONYMOUS_CLIENT: &str = "anonymous";

/// Adds the browser hardening headers to every response.
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_FRAME_OPTIONS,
        HeaderValue::from_static("SAMEORIGIN"),
    );
    headers.insert(
        header::X_XSS_PROTECTION,
        HeaderValue::from_static("1; mode=block"),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    response
}

/// Keeps an inbound `X-Request-ID` or mints one, and mirrors it on the response.
pub async fn request_id(mut request: Request, next: Next) -> Response {
    let header_name = HeaderName::from_static(REQUEST_ID_HEADER);
    let value = match request.headers().get(&header_name) {
        Some(existing) => existing.clone(),
        None => match HeaderValue::from_str(&Uuid::new_v4().to_string()) {
            Ok(generated) => generated,
            Err(_) => return next.run(request).await,
        },
    };

    request.headers_mut().insert(header_name.clone(), value.clone());
    request.extensions_mut().insert(value.clone());

    let mut response = next.run(request).await;
    response.headers_mut().insert(header_name, value);
    response
}

struct RateInfo {
    window_start: Instant,
    count: u32,
}

struct Counters {
    entries: HashMap<String, RateInfo>,
    last_sweep: Instant,
}

pub enum RateDecision {
    Allowed,
    Limited { retry_after: Duration },
}

/// Fixed-window request counter per client key.
pub struct RateLimiter {
    config: RateLimitConfig,
    counters: Mutex<Counters>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            counters: Mutex::new(Counters {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        let window = self.config.window;

        // Idle clients are dropped at most once per window.
        if now.saturating_duration_since(counters.last_sweep) >= window {
            counters
                .entries
                .retain(|_, info| now.saturating_duration_since(info.window_start) < window);
            counters.last_sweep = now;
        }

        let entry = counters.entries.entry(key.to_string()).or_insert(RateInfo {
            window_start: now,
            count: 0,
        });
        if now.saturating_duration_since(entry.window_start) >= window {
            entry.window_start = now;
            entry.count = 0;
        }
        if entry.count >= self.config.max_requests {
            let elapsed = now.saturating_duration_since(entry.window_start);
            return RateDecision::Limited {
                retry_after: window.saturating_sub(elapsed),
            };
        }
        entry.count += 1;
        RateDecision::Allowed
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }
}

fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| ANONYMOUS_CLIENT.to_string())
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request);
    match limiter.check(&key) {
        RateDecision::Allowed => next.run(request).await,
        RateDecision::Limited { retry_after } => {
            warn!(client = %key, "rate limit exceeded");
            let seconds = retry_after.as_secs().max(1);
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, seconds.to_string())],
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max_requests,
            window: Duration::from_secs(window_secs),
        })
    }

    #[test]
    fn allows_up_to_max_then_limits() {
        let limiter = limiter(2, 60);
        let now = Instant::now();
        assert!(matches!(limiter.check_at("a", now), RateDecision::Allowed));
        assert!(matches!(limiter.check_at("a", now), RateDecision::Allowed));
        match limiter.check_at("a", now + Duration::from_secs(10)) {
            RateDecision::Limited { retry_after } => {
                assert_eq!(retry_after, Duration::from_secs(50))
            }
            RateDecision::Allowed => panic!("third request should be limited"),
        }
    }

    #[test]
    fn keys_are_independent() {
        let limiter = limiter(1, 60);
        let now = Instant::now();
        assert!(matches!(limiter.check_at("a", now), RateDecision::Allowed));
        assert!(matches!(limiter.check_at("b", now), RateDecision::Allowed));
        assert!(matches!(
            limiter.check_at("a", now),
            RateDecision::Limited { .. }
        ));
    }

    #[test]
    fn idle_clients_are_swept_once_per_window() {
        let limiter = limiter(5, 60);
        let start = Instant::now();
        limiter.check_at("a", start);
        limiter.check_at("b", start + Duration::from_secs(30));

        // First request past a full window sweeps; only "a" has gone idle.
        limiter.check_at("c", start + Duration::from_secs(70));
        assert_eq!(limiter.tracked_clients(), 2);

        // "b" is stale by now, but the next sweep is not due yet.
        limiter.check_at("d", start + Duration::from_secs(100));
        assert_eq!(limiter.tracked_clients(), 3);

        limiter.check_at("e", start + Duration::from_secs(131));
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn window_resets() {
        let limiter = limiter(1, 60);
        let now = Instant::now();
        assert!(matches!(limiter.check_at("a", now), RateDecision::Allowed));
        assert!(matches!(
            limiter.check_at("a", now + Duration::from_secs(61)),
            RateDecision::Allowed
        ));
    }
}
