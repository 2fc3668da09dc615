//! Per-client fixed-window rate limiter.
//!
//! Each client identifier gets a counter and a window start. Requests
//! inside a live window increment the counter; the first request after
//! the window has elapsed resets both. Windows are not sliding: a
//! burst at the end of one window and another at the start of the next
//! can briefly exceed the nominal rate, which is an accepted property
//! of the fixed-window scheme.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

struct ClientWindow {
    count: u32,
    window_start: Instant,
}

/// Rate limiter shared across request handlers.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    clients: Mutex<HashMap<String, ClientWindow>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Record one request from `client_id`. Returns `true` when the
    /// request is within the client's budget for the current window.
    pub fn check(&self, client_id: &str) -> bool {
        let mut clients = self.clients.lock().expect("rate limiter lock poisoned");
        let now = Instant::now();

        let window = clients
            .entry(client_id.to_string())
            .or_insert_with(|| ClientWindow {
                count: 0,
                window_start: now,
            });

        if now.duration_since(window.window_start) >= self.window {
            window.count = 0;
            window.window_start = now;
        }

        if window.count >= self.max_requests {
            debug!(client = client_id, "rate limit exceeded");
            return false;
        }

        window.count += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_limit() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.check("a"));
        assert!(limiter.check("a"));
        assert!(limiter.check("a"));
    }

    #[test]
    fn test_rejects_over_limit() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.check("a"));
        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));
        assert!(!limiter.check("a"));
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));
        assert!(limiter.check("b"));
    }

    #[test]
    fn test_window_resets_after_expiry() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));
        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));
        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.check("a"));
    }

    #[test]
    fn test_rejected_requests_do_not_consume_budget() {
        let limiter = RateLimiter::new(2, Duration::from_millis(50));
        assert!(limiter.check("a"));
        assert!(limiter.check("a"));
        assert!(!limiter.check("a"));
        std::thread::sleep(Duration::from_millis(60));
        // Fresh window: full budget available again.
        assert!(limiter.check("a"));
        assert!(limiter.check("a"));
    }
}
