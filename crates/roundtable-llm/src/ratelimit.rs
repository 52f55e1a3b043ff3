//! Per-provider rate limiting
//!
//! Local admission control over a rolling window: each provider gets a
//! requests-per-window and tokens-per-window budget, and a call is admitted
//! only when both fit. Window boundaries roll forward lazily on each check;
//! there are no background timers.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

/// Default window length in seconds
pub const DEFAULT_WINDOW_SECS: i64 = 60;

/// Throughput budget for one provider
#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    /// Requests admitted per window
    pub requests_per_window: u32,
    /// Tokens admitted per window
    pub tokens_per_window: u64,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            requests_per_window: 60,
            tokens_per_window: 100_000,
        }
    }
}

/// Counters for the current window of one provider
#[derive(Debug)]
struct WindowState {
    window_start: DateTime<Utc>,
    requests: u32,
    tokens: u64,
}

impl WindowState {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            window_start: now,
            requests: 0,
            tokens: 0,
        }
    }
}

/// Thread-safe per-provider rate limiter.
///
/// The check and the counter increment happen under one lock, so two
/// concurrent calls can never both pass against the same remaining budget.
#[derive(Debug)]
pub struct RateLimiter {
    limits: HashMap<String, RateLimit>,
    window: Duration,
    states: Mutex<HashMap<String, WindowState>>,
}

impl RateLimiter {
    /// Create a limiter with per-provider budgets and the default 60s window.
    #[must_use]
    pub fn new(limits: HashMap<String, RateLimit>) -> Self {
        Self::with_window(limits, DEFAULT_WINDOW_SECS)
    }

    /// Create a limiter with a custom window length in seconds.
    #[must_use]
    pub fn with_window(limits: HashMap<String, RateLimit>, window_secs: i64) -> Self {
        Self {
            limits,
            window: Duration::seconds(window_secs),
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Check whether a call with `estimated_tokens` fits in the provider's
    /// current window, and if so count it.
    ///
    /// Returns `false` when either the request or the token budget would be
    /// exceeded; the caller must treat that as `RateLimitExceeded` and move
    /// to the next fallback candidate.
    pub async fn allow(&self, provider: &str, estimated_tokens: u64) -> bool {
        self.allow_at(provider, estimated_tokens, Utc::now()).await
    }

    /// Clock-injected variant of [`allow`](Self::allow); `now` drives lazy
    /// window rollover.
    pub async fn allow_at(
        &self,
        provider: &str,
        estimated_tokens: u64,
        now: DateTime<Utc>,
    ) -> bool {
        let limit = self.limits.get(provider).copied().unwrap_or_default();

        let mut states = self.states.lock().await;
        let state = states
            .entry(provider.to_string())
            .or_insert_with(|| WindowState::new(now));

        // Lazy rollover: reset counters once the window has elapsed
        if now - state.window_start >= self.window {
            *state = WindowState::new(now);
        }

        if state.requests + 1 > limit.requests_per_window
            || state.tokens + estimated_tokens > limit.tokens_per_window
        {
            debug!(
                provider = provider,
                requests = state.requests,
                tokens = state.tokens,
                "Rate limit window exhausted"
            );
            return false;
        }

        state.requests += 1;
        state.tokens += estimated_tokens;
        true
    }

    /// Current request count in the provider's window (for stats/tests).
    pub async fn requests_in_window(&self, provider: &str) -> u32 {
        let states = self.states.lock().await;
        states.get(provider).map_or(0, |s| s.requests)
    }
}
