//! Hub configuration
//!
//! A single immutable [`HubConfig`] built once at startup, either from
//! defaults or from environment variables. There are no ambient globals;
//! the orchestrator receives its configuration by value.

use crate::persona::{AgentId, ModelPreferences};
use roundtable_llm::{CostCeilings, GatewayConfig, RateLimit};
use std::collections::HashMap;
use tracing::debug;

/// Read an f64 env var, keeping `default` on absence or parse failure.
fn env_f64(name: &str, default: f64) -> f64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Immutable configuration for the collaboration hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// OpenAI API key, if configured
    pub openai_api_key: Option<String>,
    /// Anthropic API key, if configured
    pub anthropic_api_key: Option<String>,
    /// Gemini API key, if configured
    pub gemini_api_key: Option<String>,
    /// Gateway configuration (chain, limits, ceilings, cache, retries)
    pub gateway: GatewayConfig,
    /// Per-agent model preference overrides
    pub agent_preferences: HashMap<AgentId, ModelPreferences>,
}

impl Default for HubConfig {
    fn default() -> Self {
        let agent_preferences = AgentId::ALL
            .iter()
            .map(|id| (*id, id.default_preferences()))
            .collect();

        Self {
            openai_api_key: None,
            anthropic_api_key: None,
            gemini_api_key: None,
            gateway: GatewayConfig::default(),
            agent_preferences,
        }
    }
}

impl HubConfig {
    /// Build configuration from the environment.
    ///
    /// API keys come from `OPENAI_API_KEY`, `ANTHROPIC_API_KEY` and
    /// `GOOGLE_API_KEY` (or `GEMINI_API_KEY`). Spend ceilings can be
    /// overridden with `LLM_REQUEST_LIMIT`, `LLM_DAILY_LIMIT`,
    /// `LLM_WEEKLY_LIMIT` and `LLM_MONTHLY_LIMIT`. Everything else keeps
    /// its default.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.openai_api_key = env_opt("OPENAI_API_KEY");
        config.anthropic_api_key = env_opt("ANTHROPIC_API_KEY");
        config.gemini_api_key = env_opt("GOOGLE_API_KEY").or_else(|| env_opt("GEMINI_API_KEY"));

        config.gateway.cost_ceilings = CostCeilings {
            per_request: env_f64("LLM_REQUEST_LIMIT", 5.0),
            daily: env_f64("LLM_DAILY_LIMIT", 50.0),
            weekly: env_f64("LLM_WEEKLY_LIMIT", 300.0),
            monthly: env_f64("LLM_MONTHLY_LIMIT", 1000.0),
        };

        debug!(
            openai = config.openai_api_key.is_some(),
            anthropic = config.anthropic_api_key.is_some(),
            gemini = config.gemini_api_key.is_some(),
            "Hub configuration loaded"
        );
        config
    }

    /// Preferences for one agent, falling back to the roster default when
    /// no override is configured.
    #[must_use]
    pub fn preferences_for(&self, id: AgentId) -> ModelPreferences {
        self.agent_preferences
            .get(&id)
            .cloned()
            .unwrap_or_else(|| id.default_preferences())
    }

    /// Override the preferences of one agent.
    pub fn set_preferences(&mut self, id: AgentId, preferences: ModelPreferences) {
        self.agent_preferences.insert(id, preferences);
    }

    /// Providers that have an API key configured.
    #[must_use]
    pub fn configured_providers(&self) -> Vec<&'static str> {
        let mut providers = Vec::new();
        if self.openai_api_key.is_some() {
            providers.push("openai");
        }
        if self.anthropic_api_key.is_some() {
            providers.push("anthropic");
        }
        if self.gemini_api_key.is_some() {
            providers.push("gemini");
        }
        providers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roundtable_llm::DEFAULT_FALLBACK_CHAIN;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = HubConfig::default();

        assert_eq!(config.gateway.fallback_chain, DEFAULT_FALLBACK_CHAIN);
        assert_eq!(config.gateway.cache_ttl_secs, 7 * 24 * 60 * 60);
        assert_eq!(config.gateway.cache_max_entries, 1_000);
        assert_eq!(config.gateway.max_attempts, 3);
        assert!((config.gateway.backoff_factor - 1.5).abs() < f64::EPSILON);
        assert_eq!(config.gateway.request_timeout_secs, 30);

        let ceilings = config.gateway.cost_ceilings;
        assert!((ceilings.per_request - 5.0).abs() < f64::EPSILON);
        assert!((ceilings.daily - 50.0).abs() < f64::EPSILON);
        assert!((ceilings.weekly - 300.0).abs() < f64::EPSILON);
        assert!((ceilings.monthly - 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_default_rate_limits() {
        let config = HubConfig::default();
        let limits = &config.gateway.rate_limits;

        let openai = limits.get("openai").copied().unwrap_or_default();
        assert_eq!(openai.requests_per_window, 60);
        assert_eq!(openai.tokens_per_window, 100_000);

        let anthropic = limits.get("anthropic").copied().unwrap_or_default();
        assert_eq!(anthropic.requests_per_window, 50);
        assert_eq!(anthropic.tokens_per_window, 80_000);

        let gemini = limits.get("gemini").copied().unwrap_or_default();
        assert_eq!(gemini.requests_per_window, 60);
        assert_eq!(gemini.tokens_per_window, 120_000);
    }

    #[test]
    fn test_every_agent_has_preferences() {
        let config = HubConfig::default();
        for id in AgentId::ALL {
            let preferences = config.preferences_for(id);
            assert!(!preferences.primary.is_empty());
        }
    }

    #[test]
    fn test_preference_override() {
        let mut config = HubConfig::default();
        config.set_preferences(
            AgentId::Cto,
            ModelPreferences::new("gemini-pro", "gpt-4o", 0.1, 512),
        );
        assert_eq!(config.preferences_for(AgentId::Cto).primary, "gemini-pro");
        // Other agents keep their defaults
        assert_eq!(
            config.preferences_for(AgentId::SoftwareArchitect).primary,
            "claude-3-5-sonnet-20240620"
        );
    }
}
