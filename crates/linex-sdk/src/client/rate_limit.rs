//! Client-side pacing for Messaging API endpoints.
//!
//! LINE publishes a request budget per endpoint group. [`RateLimit`] keeps a
//! fixed window per group and delays a call that would exceed the budget
//! until the window ends, so the platform never has to answer 429.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

struct Window {
    started: Option<Instant>,
    calls: u32,
}

/// A budget of `calls` requests per `per`.
///
/// # Examples
///
/// ```
/// use linex_sdk::client::RateLimit;
/// use std::time::Duration;
///
/// let limit = RateLimit::new(60, Duration::from_secs(3600));
/// assert_eq!(limit.calls(), 60);
/// ```
#[derive(Clone)]
pub struct RateLimit {
    calls: u32,
    per: Duration,
    window: Arc<Mutex<Window>>,
}

impl RateLimit {
    /// Create a budget. A budget of zero calls is treated as one.
    pub fn new(calls: u32, per: Duration) -> Self {
        Self {
            calls: calls.max(1),
            per,
            window: Arc::new(Mutex::new(Window {
                started: None,
                calls: 0,
            })),
        }
    }

    /// 1,000 requests per minute: setting and reading the webhook endpoint.
    pub fn webhook_endpoint() -> Self {
        Self::new(1_000, Duration::from_secs(60))
    }

    /// 60 requests per hour: webhook endpoint tests, statistics, broadcasts.
    pub fn stats_and_broadcast() -> Self {
        Self::new(60, Duration::from_secs(60 * 60))
    }

    /// 2,000 requests per second: every other endpoint.
    pub fn other() -> Self {
        Self::new(2_000, Duration::from_secs(1))
    }

    /// Requests allowed per window.
    pub fn calls(&self) -> u32 {
        self.calls
    }

    /// Window length.
    pub fn per(&self) -> Duration {
        self.per
    }

    /// Wait until a request fits in the budget, then count it.
    pub async fn acquire(&self) {
        let mut window = self.window.lock().await;
        let now = Instant::now();

        let started = match window.started {
            Some(started) if now.duration_since(started) < self.per => started,
            _ => {
                window.started = Some(now);
                window.calls = 0;
                now
            }
        };

        if window.calls >= self.calls {
            let resume = started + self.per;
            debug!(
                calls = self.calls,
                wait_ms = resume.saturating_duration_since(now).as_millis() as u64,
                "Rate limit reached; delaying request"
            );
            // Callers queue on the lock while this one sleeps.
            tokio::time::sleep_until(resume).await;
            window.started = Some(Instant::now());
            window.calls = 0;
        }

        window.calls += 1;
    }
}

impl std::fmt::Debug for RateLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimit")
            .field("calls", &self.calls)
            .field("per", &self.per)
            .finish_non_exhaustive()
    }
}

/// The budgets a [`LineClient`](super::LineClient) paces its calls with.
#[derive(Debug, Clone)]
pub struct RateLimits {
    pub webhook_endpoint: RateLimit,
    pub webhook_test: RateLimit,
    pub other: RateLimit,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            webhook_endpoint: RateLimit::webhook_endpoint(),
            webhook_test: RateLimit::stats_and_broadcast(),
            other: RateLimit::other(),
        }
    }
}

#[cfg(test)]
#[path = "rate_limit_tests.rs"]
mod tests;
