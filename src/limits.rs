use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

/// Fixed-window request counter keyed by client address. State lives in
/// process memory, so it resets on restart and is not shared across
/// instances.
#[derive(Clone)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    state: Arc<Mutex<LimiterState>>,
}

struct LimiterState {
    entries: HashMap<String, WindowEntry>,
    last_sweep: Instant,
}

struct WindowEntry {
    count: u32,
    window_start: Instant,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Arc::new(Mutex::new(LimiterState {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            })),
        }
    }

    /// Records an attempt for `key` and reports whether it is still within
    /// the window. At most once per window the whole map is swept, dropping
    /// expired entries so the key set cannot grow without bound.
    pub async fn check(&self, key: &str) -> bool {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        if now.duration_since(state.last_sweep) >= self.window {
            let window = self.window;
            state
                .entries
                .retain(|_, e| now.duration_since(e.window_start) < window);
            state.last_sweep = now;
        }

        let entry = state.entries.entry(key.to_string()).or_insert(WindowEntry {
            count: 0,
            window_start: now,
        });

        if now.duration_since(entry.window_start) >= self.window {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count >= self.max_requests {
            return false;
        }

        entry.count += 1;
        true
    }
}

/// Key requests by the forwarded client address when behind a proxy,
/// falling back to the peer address.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".into())
}

/// Blanket per-client throttle applied to the whole API.
pub async fn throttle(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0);
    let key = client_key(req.headers(), peer);
    if !state.general_limiter.check(&key).await {
        warn!(client = %key, "request rate limit exceeded");
        return Err(ApiError::RateLimited);
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_up_to_the_limit_and_rejects_the_next() {
        let limiter = RateLimiter::new(5, Duration::from_secs(900));
        for _ in 0..5 {
            assert!(limiter.check("10.0.0.1").await);
        }
        assert!(!limiter.check("10.0.0.1").await);
        // Still rejected on repeat
        assert!(!limiter.check("10.0.0.1").await);
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("10.0.0.1").await);
        assert!(!limiter.check("10.0.0.1").await);
        assert!(limiter.check("10.0.0.2").await);
    }

    #[tokio::test]
    async fn window_expiry_resets_the_count() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));
        assert!(limiter.check("10.0.0.1").await);
        assert!(!limiter.check("10.0.0.1").await);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(limiter.check("10.0.0.1").await);
    }

    #[tokio::test]
    async fn expired_entries_are_swept_out_of_the_map() {
        let limiter = RateLimiter::new(1, Duration::from_millis(10));
        for i in 0..100 {
            assert!(limiter.check(&format!("10.0.{i}.1")).await);
        }
        assert_eq!(limiter.state.lock().await.entries.len(), 100);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(limiter.check("10.0.200.1").await);
        assert_eq!(limiter.state.lock().await.entries.len(), 1);
    }

    #[test]
    fn client_key_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        let peer: SocketAddr = "192.168.1.2:4444".parse().unwrap();
        assert_eq!(client_key(&headers, Some(peer)), "203.0.113.7");
    }

    #[test]
    fn client_key_falls_back_to_peer_then_unknown() {
        let headers = HeaderMap::new();
        let peer: SocketAddr = "192.168.1.2:4444".parse().unwrap();
        assert_eq!(client_key(&headers, Some(peer)), "192.168.1.2");
        assert_eq!(client_key(&headers, None), "unknown");
    }
}
