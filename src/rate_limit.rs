// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fixed-window rate limiting per client fingerprint.
//!
//! A fingerprint is `ip|user-agent`. Windows live in a bounded LRU so a flood
//! of distinct fingerprints cannot grow memory without limit; an evicted
//! client simply starts a fresh window.

use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::http::{header::USER_AGENT, HeaderMap};
use lru::LruCache;

/// Fingerprints tracked at once.
const DEFAULT_CAPACITY: usize = 10_000;

struct Window {
    started_at: Instant,
    count: u32,
}

/// Endpoint a request is counted against. Each has its own window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitScope {
    Preclaim,
    Approval,
}

impl RateLimitScope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Preclaim => "preclaim",
            Self::Approval => "approval",
        }
    }

    /// Limiter key for `fingerprint` within this scope.
    pub fn key(self, fingerprint: &str) -> String {
        format!("{}|{fingerprint}", self.as_str())
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed { remaining: u32 },
    Limited { retry_after_secs: u64 },
}

pub struct FixedWindowLimiter {
    windows: Mutex<LruCache<String, Window>>,
    max_requests: u32,
    window: Duration,
}

impl FixedWindowLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self::with_capacity(max_requests, window, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(max_requests: u32, window: Duration, capacity: usize) -> Self {
        Self {
            windows: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            max_requests,
            window,
        }
    }

    /// Count one request from `fingerprint` at `now`.
    pub fn check(&self, fingerprint: &str, now: Instant) -> RateLimitDecision {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        let window = windows.get_or_insert_mut(fingerprint.to_string(), || Window {
            started_at: now,
            count: 0,
        });
        if now.saturating_duration_since(window.started_at) >= self.window {
            window.started_at = now;
            window.count = 0;
        }

        if window.count >= self.max_requests {
            let reset_at = window.started_at + self.window;
            let wait = reset_at.saturating_duration_since(now);
            // Round up so clients never retry a moment too early
            let retry_after_secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
            return RateLimitDecision::Limited {
                retry_after_secs: retry_after_secs.max(1),
            };
        }

        window.count += 1;
        RateLimitDecision::Allowed {
            remaining: self.max_requests - window.count,
        }
    }
}

/// Build the `ip|user-agent` fingerprint of a request.
///
/// The first `X-Forwarded-For` hop wins, then `X-Real-IP`, then the socket
/// peer address.
pub fn client_fingerprint(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let ip = forwarded
        .or(real_ip)
        .map(str::to_string)
        .or_else(|| peer.map(|p| p.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string());
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    format!("{ip}|{user_agent}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn allows_up_to_limit_then_limits() {
        let limiter = FixedWindowLimiter::new(5, Duration::from_secs(60));
        let start = Instant::now();

        for i in 0..5u32 {
            assert_eq!(
                limiter.check("a", start),
                RateLimitDecision::Allowed { remaining: 4 - i }
            );
        }
        assert_eq!(
            limiter.check("a", start + Duration::from_secs(10)),
            RateLimitDecision::Limited {
                retry_after_secs: 50
            }
        );
        // Other clients are unaffected
        assert!(matches!(
            limiter.check("b", start),
            RateLimitDecision::Allowed { .. }
        ));
    }

    #[test]
    fn window_resets() {
        let limiter = FixedWindowLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();

        assert!(matches!(limiter.check("a", start), RateLimitDecision::Allowed { .. }));
        assert!(matches!(limiter.check("a", start), RateLimitDecision::Limited { .. }));
        assert!(matches!(
            limiter.check("a", start + Duration::from_secs(60)),
            RateLimitDecision::Allowed { .. }
        ));
    }

    #[test]
    fn scopes_keep_separate_windows() {
        let limiter = FixedWindowLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();
        let fp = "1.2.3.4|ua";

        assert!(matches!(
            limiter.check(&RateLimitScope::Preclaim.key(fp), start),
            RateLimitDecision::Allowed { .. }
        ));
        assert!(matches!(
            limiter.check(&RateLimitScope::Approval.key(fp), start),
            RateLimitDecision::Allowed { .. }
        ));
        assert!(matches!(
            limiter.check(&RateLimitScope::Preclaim.key(fp), start),
            RateLimitDecision::Limited { .. }
        ));
    }

    #[test]
    fn fingerprint_prefers_forwarded_ip() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("curl/8"));
        let peer: SocketAddr = "10.0.0.1:4000".parse().unwrap();

        assert_eq!(client_fingerprint(&headers, Some(peer)), "10.0.0.1|curl/8");

        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4, 10.0.0.1"));
        assert_eq!(client_fingerprint(&headers, Some(peer)), "1.2.3.4|curl/8");

        assert_eq!(client_fingerprint(&HeaderMap::new(), None), "unknown|unknown");
    }
}
