//! Error types for roundtable-llm

use thiserror::Error;

/// Spend ceiling that rejected a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostPeriod {
    /// Single-request ceiling
    PerRequest,
    /// Daily ceiling (UTC midnight rollover)
    Daily,
    /// Weekly ceiling (ISO week rollover)
    Weekly,
    /// Monthly ceiling (calendar month rollover)
    Monthly,
}

impl CostPeriod {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PerRequest => "per-request",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

impl std::fmt::Display for CostPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gateway error type
#[derive(Debug, Error)]
pub enum Error {
    /// Provider could not be reached (network or auth failure)
    #[error("provider unavailable: {provider}: {message}")]
    ProviderUnavailable {
        /// Provider name
        provider: String,
        /// Detail, sanitized by the provider client
        message: String,
    },

    /// API rejected the request (malformed payload, bad model name)
    #[error("api error: {0}")]
    Api(String),

    /// Local admission control denied the call for this window
    #[error("rate limit exceeded for provider {0}")]
    RateLimitExceeded(String),

    /// A spend ceiling would be exceeded
    #[error("cost limit exceeded: {period} ceiling of ${ceiling:.2}")]
    CostLimitExceeded {
        /// Which ceiling rejected the reservation
        period: CostPeriod,
        /// The configured ceiling in USD
        ceiling: f64,
    },

    /// Invalid response payload from a provider
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Call exceeded its bounded timeout
    #[error("timeout after {0}ms")]
    Timeout(u64),
}

impl Error {
    /// Whether the same candidate should be retried with backoff.
    ///
    /// Timeouts, connection failures and 5xx-class responses are transient;
    /// everything else moves the fallback chain to the next candidate.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::ProviderUnavailable { .. })
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::Timeout(30_000).is_transient());
        assert!(Error::ProviderUnavailable {
            provider: "openai".to_string(),
            message: "connection reset".to_string(),
        }
        .is_transient());

        assert!(!Error::Api("bad model".to_string()).is_transient());
        assert!(!Error::RateLimitExceeded("openai".to_string()).is_transient());
        assert!(!Error::CostLimitExceeded {
            period: CostPeriod::Daily,
            ceiling: 50.0,
        }
        .is_transient());
    }

    #[test]
    fn test_cost_period_as_str() {
        assert_eq!(CostPeriod::PerRequest.as_str(), "per-request");
        assert_eq!(CostPeriod::Monthly.as_str(), "monthly");
    }

    #[test]
    fn test_cost_limit_message_names_period() {
        let message = Error::CostLimitExceeded {
            period: CostPeriod::Daily,
            ceiling: 50.0,
        }
        .to_string();
        assert_eq!(message, "cost limit exceeded: daily ceiling of $50.00");
        assert_eq!(CostPeriod::Weekly.to_string(), "weekly");
    }
}
