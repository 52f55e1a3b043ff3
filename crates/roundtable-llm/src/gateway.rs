//! Provider-routing gateway
//!
//! Single entry point for every model call. The gateway resolves a fallback
//! chain of candidate models, serves repeats from the response cache, gates
//! each paid call behind the rate limiter and the cost ledger, retries
//! transient failures with exponential backoff, and falls back to a
//! deterministic offline result when every candidate is exhausted.

use crate::cache::{CacheStats, ResponseCache};
use crate::error::{CostPeriod, Error};
use crate::ledger::{CostCeilings, CostLedger};
use crate::pricing::PricingTable;
use crate::provider::{provider_for_model, LlmProvider, ModelCallRequest, ModelCallResult};
use crate::ratelimit::{RateLimit, RateLimiter};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Default fallback chain, tried in order after any preferred models
pub const DEFAULT_FALLBACK_CHAIN: &[&str] = &[
    "gpt-4o",
    "claude-3-5-sonnet-20240620",
    "gemini-pro",
    "gpt-4-turbo",
];

// ============================================================================
// Configuration
// ============================================================================

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Global fallback chain, appended after caller-preferred models
    pub fallback_chain: Vec<String>,
    /// Attempts per candidate model before moving on (transient errors only)
    pub max_attempts: u32,
    /// Multiplier applied to the backoff delay after each failed attempt
    pub backoff_factor: f64,
    /// Base backoff delay in milliseconds
    pub backoff_base_ms: u64,
    /// Per-call timeout in seconds
    pub request_timeout_secs: u64,
    /// Response cache TTL in seconds
    pub cache_ttl_secs: i64,
    /// Response cache capacity; 0 disables caching
    pub cache_max_entries: usize,
    /// Per-provider throughput budgets
    pub rate_limits: HashMap<String, RateLimit>,
    /// Spend ceilings
    pub cost_ceilings: CostCeilings,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let mut rate_limits = HashMap::new();
        rate_limits.insert(
            "openai".to_string(),
            RateLimit {
                requests_per_window: 60,
                tokens_per_window: 100_000,
            },
        );
        rate_limits.insert(
            "anthropic".to_string(),
            RateLimit {
                requests_per_window: 50,
                tokens_per_window: 80_000,
            },
        );
        rate_limits.insert(
            "gemini".to_string(),
            RateLimit {
                requests_per_window: 60,
                tokens_per_window: 120_000,
            },
        );

        Self {
            fallback_chain: DEFAULT_FALLBACK_CHAIN
                .iter()
                .map(|m| (*m).to_string())
                .collect(),
            max_attempts: 3,
            backoff_factor: 1.5,
            backoff_base_ms: 1_000,
            request_timeout_secs: 30,
            cache_ttl_secs: 7 * 24 * 60 * 60,
            cache_max_entries: 1_000,
            rate_limits,
            cost_ceilings: CostCeilings::default(),
        }
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Counters accumulated across the gateway's lifetime
#[derive(Debug, Clone, Default)]
pub struct GatewayStats {
    /// Total calls received, including cache hits and degraded results
    pub total_calls: u64,
    /// Calls served from the response cache
    pub cache_hits: u64,
    /// Calls that fell back to the offline degraded result
    pub degraded_calls: u64,
    /// Successful paid calls per provider
    pub provider_success: HashMap<String, u64>,
    /// Failed paid calls per provider (after all attempts)
    pub provider_failure: HashMap<String, u64>,
    /// Last observed outcome per provider: true after a success, false
    /// after an exhausted candidate
    pub provider_health: HashMap<String, bool>,
    /// Summed latency of successful paid calls
    pub total_latency_ms: u64,
    /// Total committed spend in USD
    pub total_cost: f64,
}

impl GatewayStats {
    /// Mean latency of successful paid calls, zero before any succeed.
    #[must_use]
    pub fn average_latency_ms(&self) -> u64 {
        let successes: u64 = self.provider_success.values().sum();
        if successes == 0 {
            0
        } else {
            self.total_latency_ms / successes
        }
    }
}

// ============================================================================
// Gateway
// ============================================================================

/// The LLM gateway
pub struct LlmGateway {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    limiter: RateLimiter,
    ledger: CostLedger,
    cache: ResponseCache,
    pricing: PricingTable,
    config: GatewayConfig,
    stats: Mutex<GatewayStats>,
}

impl LlmGateway {
    /// Create a gateway with no providers registered yet.
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            providers: HashMap::new(),
            limiter: RateLimiter::new(config.rate_limits.clone()),
            ledger: CostLedger::new(config.cost_ceilings),
            cache: ResponseCache::new(config.cache_ttl_secs, config.cache_max_entries),
            pricing: PricingTable::new(),
            config,
            stats: Mutex::new(GatewayStats::default()),
        }
    }

    /// Register a provider under its own name. Replaces any previous
    /// registration for that name.
    pub fn register_provider(&mut self, provider: Arc<dyn LlmProvider>) {
        let name = provider.name().to_string();
        info!(provider = %name, "Registered LLM provider");
        self.providers.insert(name, provider);
    }

    /// Names of currently registered providers.
    #[must_use]
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    /// Build the candidate chain for one call: preferred models first, then
    /// the global fallback chain, first occurrence wins on duplicates.
    fn candidate_chain(&self, preferred: &[String]) -> Vec<String> {
        let mut chain = Vec::new();
        for model in preferred.iter().chain(self.config.fallback_chain.iter()) {
            if !chain.contains(model) {
                chain.push(model.clone());
            }
        }
        chain
    }

    /// Issue a model call through the fallback chain.
    ///
    /// `preferred` models are tried before the global chain. The request's
    /// own model field selects the cache key; cache hits never reach a
    /// provider. This method never returns an error for provider trouble:
    /// when every candidate fails it returns a degraded offline result.
    #[instrument(skip_all, fields(model = %request.model))]
    pub async fn call(
        &self,
        request: &ModelCallRequest,
        preferred: &[String],
    ) -> ModelCallResult {
        {
            let mut stats = self.stats.lock().await;
            stats.total_calls += 1;
        }

        let fingerprint = request.fingerprint();
        if let Some(hit) = self.cache.get(&fingerprint).await {
            debug!(model = %request.model, "Response cache hit");
            let mut stats = self.stats.lock().await;
            stats.cache_hits += 1;
            return hit;
        }

        let chain = self.candidate_chain(preferred);
        for model in &chain {
            match self.try_candidate(request, model).await {
                CandidateOutcome::Served(result) => {
                    if self.config.cache_max_entries > 0 {
                        self.cache.put(fingerprint, result.clone()).await;
                    }
                    return result;
                }
                CandidateOutcome::NextCandidate => continue,
                CandidateOutcome::Abort => break,
            }
        }

        warn!(model = %request.model, "All candidates exhausted, serving degraded result");
        let mut stats = self.stats.lock().await;
        stats.degraded_calls += 1;
        degraded_result(request)
    }

    /// Try one candidate model: admission, reservation, then the attempt
    /// loop with backoff on transient errors.
    async fn try_candidate(&self, request: &ModelCallRequest, model: &str) -> CandidateOutcome {
        let Some(provider_name) = provider_for_model(model) else {
            debug!(model = %model, "No provider family for model, skipping");
            return CandidateOutcome::NextCandidate;
        };
        let Some(provider) = self.providers.get(provider_name) else {
            debug!(model = %model, provider = %provider_name, "Provider not registered, skipping");
            return CandidateOutcome::NextCandidate;
        };

        let candidate = ModelCallRequest {
            model: model.to_string(),
            ..request.clone()
        };
        let estimated_tokens = candidate.estimated_tokens();

        if !self
            .limiter
            .allow(provider_name, u64::from(estimated_tokens))
            .await
        {
            let denied = Error::RateLimitExceeded(provider_name.to_string());
            debug!(model = %model, error = %denied, "Skipping candidate");
            return CandidateOutcome::NextCandidate;
        }

        let prompt_tokens = (candidate.prompt.len() / 4) as u32;
        let estimated_cost = self
            .pricing
            .estimate_cost(model, prompt_tokens, candidate.max_tokens);
        let ticket = match self.ledger.reserve(estimated_cost).await {
            Ok(ticket) => ticket,
            Err(Error::CostLimitExceeded {
                period: CostPeriod::PerRequest,
                ceiling,
            }) => {
                // No candidate can satisfy this either once a single
                // request is over the per-request ceiling
                warn!(ceiling = ceiling, "Request exceeds per-request cost ceiling");
                return CandidateOutcome::Abort;
            }
            Err(e) => {
                warn!(model = %model, error = %e, "Cost reservation rejected, skipping candidate");
                return CandidateOutcome::NextCandidate;
            }
        };

        let timeout = Duration::from_secs(self.config.request_timeout_secs);
        for attempt in 0..self.config.max_attempts {
            let started = Instant::now();
            let outcome = tokio::time::timeout(timeout, provider.complete(&candidate)).await;
            let latency_ms = started.elapsed().as_millis() as u64;

            let error = match outcome {
                Ok(Ok(response)) => {
                    let (tokens_used, cost) = match &response.usage {
                        Some(usage) => (
                            usage.total_tokens,
                            self.pricing.estimate_cost(
                                model,
                                usage.prompt_tokens,
                                usage.completion_tokens,
                            ),
                        ),
                        None => (estimated_tokens, estimated_cost),
                    };
                    self.ledger.commit(ticket, cost).await;

                    let mut stats = self.stats.lock().await;
                    *stats
                        .provider_success
                        .entry(provider_name.to_string())
                        .or_insert(0) += 1;
                    stats
                        .provider_health
                        .insert(provider_name.to_string(), true);
                    stats.total_latency_ms += latency_ms;
                    stats.total_cost += cost;

                    info!(
                        provider = %provider_name,
                        model = %response.model,
                        tokens = tokens_used,
                        latency_ms = latency_ms,
                        "Model call served"
                    );
                    return CandidateOutcome::Served(ModelCallResult {
                        content: response.content,
                        provider: provider_name.to_string(),
                        model: response.model,
                        tokens_used,
                        cost,
                        latency_ms,
                        degraded: false,
                        cached: false,
                    });
                }
                Ok(Err(e)) => e,
                Err(_) => Error::Timeout(timeout.as_millis() as u64),
            };

            if !error.is_transient() || attempt + 1 == self.config.max_attempts {
                warn!(
                    provider = %provider_name,
                    model = %model,
                    attempt = attempt + 1,
                    error = %error,
                    "Candidate failed"
                );
                self.ledger.release(ticket).await;
                let mut stats = self.stats.lock().await;
                *stats
                    .provider_failure
                    .entry(provider_name.to_string())
                    .or_insert(0) += 1;
                stats
                    .provider_health
                    .insert(provider_name.to_string(), false);
                return CandidateOutcome::NextCandidate;
            }

            let delay_ms =
                (self.config.backoff_base_ms as f64 * self.config.backoff_factor.powi(attempt as i32)) as u64;
            debug!(
                provider = %provider_name,
                attempt = attempt + 1,
                delay_ms = delay_ms,
                "Transient failure, backing off before retry"
            );
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        // Unreachable: the loop always returns on its last attempt
        self.ledger.release(ticket).await;
        CandidateOutcome::NextCandidate
    }

    /// Snapshot of the gateway counters.
    pub async fn stats(&self) -> GatewayStats {
        self.stats.lock().await.clone()
    }

    /// Health per registered provider. Providers with no observed paid
    /// call yet count as healthy.
    pub async fn provider_health(&self) -> HashMap<String, bool> {
        let stats = self.stats.lock().await;
        self.providers
            .keys()
            .map(|name| {
                let healthy = stats.provider_health.get(name).copied().unwrap_or(true);
                (name.clone(), healthy)
            })
            .collect()
    }

    /// Snapshot of the response cache counters.
    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Committed spend in the current day, week and month.
    pub async fn committed_spend(&self) -> (f64, f64, f64) {
        self.ledger.committed().await
    }
}

enum CandidateOutcome {
    Served(ModelCallResult),
    NextCandidate,
    Abort,
}

/// Deterministic offline result used when no provider can serve a call.
fn degraded_result(request: &ModelCallRequest) -> ModelCallResult {
    ModelCallResult {
        content: format!(
            "[offline] No language model provider is currently reachable. \
             The request for model '{}' could not be served; this placeholder \
             preserves the collaboration flow until connectivity returns.",
            request.model
        ),
        provider: "offline".to_string(),
        model: "offline".to_string(),
        tokens_used: 0,
        cost: 0.0,
        latency_ms: 0,
        degraded: true,
        cached: false,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockProvider;

    fn test_config() -> GatewayConfig {
        let mut config = GatewayConfig {
            fallback_chain: vec!["mock-model".to_string()],
            backoff_base_ms: 1,
            ..GatewayConfig::default()
        };
        config.rate_limits.insert(
            "mock".to_string(),
            RateLimit {
                requests_per_window: 100,
                tokens_per_window: 1_000_000,
            },
        );
        config
    }

    fn gateway_with_mock(config: GatewayConfig) -> (LlmGateway, Arc<MockProvider>) {
        let provider = Arc::new(MockProvider::new());
        let mut gateway = LlmGateway::new(config);
        gateway.register_provider(provider.clone());
        (gateway, provider)
    }

    #[tokio::test]
    async fn test_serves_from_registered_provider() {
        let (gateway, provider) = gateway_with_mock(test_config());
        provider.enqueue_response("the answer").await;

        let request = ModelCallRequest::new("mock-model", "question");
        let result = gateway.call(&request, &[]).await;

        assert_eq!(result.content, "the answer");
        assert_eq!(result.provider, "mock");
        assert!(!result.degraded);
        assert!(!result.cached);
    }

    #[tokio::test]
    async fn test_cache_prevents_second_invocation() {
        let (gateway, provider) = gateway_with_mock(test_config());
        provider.enqueue_response("cached answer").await;

        let request = ModelCallRequest::new("mock-model", "same question");
        let first = gateway.call(&request, &[]).await;
        let second = gateway.call(&request, &[]).await;

        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(second.content, "cached answer");
        assert_eq!(provider.call_count(), 1);

        let stats = gateway.stats().await;
        assert_eq!(stats.total_calls, 2);
        assert_eq!(stats.cache_hits, 1);
    }

    #[tokio::test]
    async fn test_falls_through_chain_on_failure() {
        let mut config = test_config();
        config.fallback_chain = vec!["mock-a".to_string(), "mock-b".to_string()];
        let (gateway, provider) = gateway_with_mock(config);

        provider
            .enqueue_error(Error::Api("bad request".to_string()))
            .await;
        provider.enqueue_response("second candidate").await;

        let request = ModelCallRequest::new("mock-a", "question");
        let result = gateway.call(&request, &[]).await;

        assert_eq!(result.content, "second candidate");
        assert_eq!(result.model, "mock-b");
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_retries_transient_errors_up_to_cap() {
        let (gateway, provider) = gateway_with_mock(test_config());
        provider
            .enqueue_error(Error::ProviderUnavailable {
                provider: "mock".to_string(),
                message: "overloaded".to_string(),
            })
            .await;
        provider.enqueue_error(Error::Timeout(30_000)).await;
        provider.enqueue_response("third try").await;

        let request = ModelCallRequest::new("mock-model", "question");
        let result = gateway.call(&request, &[]).await;

        assert_eq!(result.content, "third try");
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_degraded_when_all_attempts_transient() {
        let (gateway, provider) = gateway_with_mock(test_config());
        for _ in 0..3 {
            provider
                .enqueue_error(Error::ProviderUnavailable {
                    provider: "mock".to_string(),
                    message: "down".to_string(),
                })
                .await;
        }

        let request = ModelCallRequest::new("mock-model", "question");
        let result = gateway.call(&request, &[]).await;

        assert!(result.degraded);
        assert_eq!(result.provider, "offline");
        assert_eq!(provider.call_count(), 3);

        let stats = gateway.stats().await;
        assert_eq!(stats.degraded_calls, 1);
    }

    #[tokio::test]
    async fn test_degraded_results_are_not_cached() {
        let (gateway, provider) = gateway_with_mock(test_config());
        for _ in 0..3 {
            provider.enqueue_error(Error::Timeout(1)).await;
        }

        let request = ModelCallRequest::new("mock-model", "question");
        let first = gateway.call(&request, &[]).await;
        assert!(first.degraded);

        // Provider is back, queue is empty so the mock echoes
        let second = gateway.call(&request, &[]).await;
        assert!(!second.degraded);
        assert!(!second.cached);
    }

    #[tokio::test]
    async fn test_non_transient_error_does_not_retry() {
        let (gateway, provider) = gateway_with_mock(test_config());
        provider
            .enqueue_error(Error::Api("invalid key shape".to_string()))
            .await;

        let request = ModelCallRequest::new("mock-model", "question");
        let result = gateway.call(&request, &[]).await;

        assert!(result.degraded);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_rate_limited_candidate_is_skipped_without_invocation() {
        let mut config = test_config();
        config.rate_limits.insert(
            "mock".to_string(),
            RateLimit {
                requests_per_window: 0,
                tokens_per_window: 0,
            },
        );
        let (gateway, provider) = gateway_with_mock(config);

        let request = ModelCallRequest::new("mock-model", "question");
        let result = gateway.call(&request, &[]).await;

        assert!(result.degraded);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_per_request_ceiling_short_circuits_chain() {
        let mut config = test_config();
        config.fallback_chain = vec!["mock-a".to_string(), "mock-b".to_string()];
        config.cost_ceilings = CostCeilings {
            per_request: 0.0,
            ..CostCeilings::default()
        };
        let (gateway, provider) = gateway_with_mock(config);

        let request = ModelCallRequest::new("mock-a", "question");
        let result = gateway.call(&request, &[]).await;

        assert!(result.degraded);
        // The chain aborts on the first candidate instead of probing the rest
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_preferred_models_precede_fallback_chain() {
        let config = test_config();
        let gateway = LlmGateway::new(config);
        let chain = gateway.candidate_chain(&["mock-fast".to_string(), "mock-model".to_string()]);
        assert_eq!(chain, vec!["mock-fast", "mock-model"]);
    }

    #[tokio::test]
    async fn test_unknown_model_family_is_skipped() {
        let mut config = test_config();
        config.fallback_chain = vec!["llama3.2".to_string(), "mock-model".to_string()];
        let (gateway, provider) = gateway_with_mock(config);
        provider.enqueue_response("served").await;

        let request = ModelCallRequest::new("llama3.2", "question");
        let result = gateway.call(&request, &[]).await;

        assert_eq!(result.content, "served");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_provider_health_tracks_last_outcome() {
        let (gateway, provider) = gateway_with_mock(test_config());
        // No calls yet: registered providers count as healthy
        assert_eq!(gateway.provider_health().await.get("mock"), Some(&true));

        provider.enqueue_error(Error::Api("broken".to_string())).await;
        gateway
            .call(&ModelCallRequest::new("mock-model", "first"), &[])
            .await;
        assert_eq!(gateway.provider_health().await.get("mock"), Some(&false));

        // A later success clears the mark
        gateway
            .call(&ModelCallRequest::new("mock-model", "second"), &[])
            .await;
        assert_eq!(gateway.provider_health().await.get("mock"), Some(&true));

        let stats = gateway.stats().await;
        assert_eq!(stats.provider_success.get("mock"), Some(&1));
        assert_eq!(stats.provider_failure.get("mock"), Some(&1));
    }

    #[tokio::test]
    async fn test_average_latency_needs_a_success() {
        let stats = GatewayStats::default();
        assert_eq!(stats.average_latency_ms(), 0);
    }

    #[tokio::test]
    async fn test_successful_call_commits_cost() {
        let (gateway, provider) = gateway_with_mock(test_config());
        provider.enqueue_response("answer").await;

        let request = ModelCallRequest::new("mock-model", "question");
        gateway.call(&request, &[]).await;

        let (daily, _, _) = gateway.committed_spend().await;
        assert!(daily > 0.0);
    }
}
