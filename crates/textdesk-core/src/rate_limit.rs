//! Per-sender fixed-window rate limiting
//!
//! Each sender gets a counter that restarts whenever more than one window
//! length has passed since the window began. The `max_requests`-th request
//! inside a window is still permitted; the next one is refused. There is no
//! penalty beyond refusing the current message.

use crate::config::RouterSettings;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

/// Counter state for one sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    /// Requests seen in the current window.
    pub count: u32,
    /// When the current window began.
    pub window_start: DateTime<Utc>,
}

impl RateWindow {
    fn is_expired(&self, now: DateTime<Utc>, window: TimeDelta) -> bool {
        now - self.window_start > window
    }
}

/// Result of a rate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    /// Whether this request may proceed.
    pub permitted: bool,
    /// Requests counted in the current window, including this one.
    pub count: u32,
}

/// Fixed-window request counter keyed by sender.
pub struct RateLimiter {
    window: TimeDelta,
    max_requests: u32,
    windows: Mutex<HashMap<String, RateWindow>>,
}

impl RateLimiter {
    /// Create a limiter allowing `max_requests` per `window`.
    #[must_use]
    pub fn new(window: TimeDelta, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Create a limiter from router settings.
    #[must_use]
    pub fn from_settings(settings: &RouterSettings) -> Self {
        Self::new(settings.rate_limit_window(), settings.rate_limit_max_requests)
    }

    /// Count a request from `sender` at `now` and decide whether it may pass.
    pub async fn check(&self, sender: &str, now: DateTime<Utc>) -> RateDecision {
        let mut windows = self.windows.lock().await;
        let record = windows
            .entry(sender.to_string())
            .and_modify(|w| {
                if w.is_expired(now, self.window) {
                    *w = RateWindow {
                        count: 1,
                        window_start: now,
                    };
                } else {
                    w.count = w.count.saturating_add(1);
                }
            })
            .or_insert(RateWindow {
                count: 1,
                window_start: now,
            });

        let decision = RateDecision {
            permitted: record.count <= self.max_requests,
            count: record.count,
        };
        if !decision.permitted {
            debug!(sender = %sender, count = record.count, "Rate limit exceeded");
        }
        decision
    }

    /// Drop every window that has already expired at `now`.
    ///
    /// Returns the number of evicted windows.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, w| !w.is_expired(now, self.window));
        before - windows.len()
    }

    /// Current window for `sender`, if any.
    pub async fn window(&self, sender: &str) -> Option<RateWindow> {
        self.windows.lock().await.get(sender).copied()
    }

    /// Number of tracked senders.
    pub async fn tracked(&self) -> usize {
        self.windows.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).expect("valid timestamp")
    }

    #[tokio::test]
    async fn test_nth_request_permitted_next_denied() {
        let limiter = RateLimiter::new(TimeDelta::seconds(60), 4);
        let now = t0();

        for i in 1..=4 {
            let decision = limiter.check("+1555", now + TimeDelta::seconds(i)).await;
            assert!(decision.permitted, "request {i} should pass");
            assert_eq!(decision.count, u32::try_from(i).expect("small"));
        }

        let fifth = limiter.check("+1555", now + TimeDelta::seconds(5)).await;
        assert!(!fifth.permitted);
        assert_eq!(fifth.count, 5);
    }

    #[tokio::test]
    async fn test_window_boundary_is_exclusive() {
        let limiter = RateLimiter::new(TimeDelta::seconds(60), 1);
        let now = t0();

        assert!(limiter.check("+1555", now).await.permitted);
        // Exactly one window later is still the same window
        assert!(!limiter.check("+1555", now + TimeDelta::seconds(60)).await.permitted);
        // Strictly more than one window later starts a fresh one
        let fresh = limiter
            .check("+1555", now + TimeDelta::milliseconds(60_001))
            .await;
        assert!(fresh.permitted);
        assert_eq!(fresh.count, 1);
    }

    #[tokio::test]
    async fn test_senders_are_independent() {
        let limiter = RateLimiter::new(TimeDelta::seconds(60), 1);
        let now = t0();

        assert!(limiter.check("+111", now).await.permitted);
        assert!(!limiter.check("+111", now).await.permitted);
        assert!(limiter.check("+222", now).await.permitted);
    }

    #[tokio::test]
    async fn test_sweep_drops_only_expired_windows() {
        let limiter = RateLimiter::new(TimeDelta::seconds(60), 4);
        let now = t0();

        limiter.check("+old", now).await;
        limiter.check("+new", now + TimeDelta::seconds(30)).await;

        let evicted = limiter.sweep_expired(now + TimeDelta::seconds(61)).await;
        assert_eq!(evicted, 1);
        assert!(limiter.window("+old").await.is_none());
        assert!(limiter.window("+new").await.is_some());
        assert_eq!(limiter.tracked().await, 1);
    }

    proptest! {
        /// Within a single window exactly `max` requests pass.
        #[test]
        fn permits_exactly_max_within_window(max in 1u32..20, extra in 0u32..20) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .build()
                .expect("runtime");
            let permitted = rt.block_on(async {
                let limiter = RateLimiter::new(TimeDelta::seconds(60), max);
                let mut permitted = 0;
                for _ in 0..(max + extra) {
                    if limiter.check("+1555", t0()).await.permitted {
                        permitted += 1;
                    }
                }
                permitted
            });
            prop_assert_eq!(permitted, max);
        }
    }
}
