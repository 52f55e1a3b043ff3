//! Provider abstraction and call types
//!
//! Defines the provider-agnostic request/result types and the trait every
//! concrete LLM backend implements. The gateway only ever talks to
//! [`LlmProvider`], never to a specific HTTP client.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================================================
// Core Types
// ============================================================================

/// Token usage reported by a provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens
    pub prompt_tokens: u32,
    /// Completion tokens
    pub completion_tokens: u32,
    /// Total tokens
    pub total_tokens: u32,
}

/// Provider-agnostic model call request
#[derive(Debug, Clone)]
pub struct ModelCallRequest {
    /// Model to use (provider-specific name)
    pub model: String,
    /// Full prompt text, including any persona framing
    pub prompt: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum tokens to generate
    pub max_tokens: u32,
}

impl ModelCallRequest {
    /// Create a new request
    #[must_use]
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            temperature: 0.7,
            max_tokens: 2048,
        }
    }

    /// Set temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set max tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Deterministic cache/dedup key over every input that changes the
    /// output distribution: prompt, model, temperature and max tokens.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.prompt.as_bytes());
        hasher.update([0]);
        hasher.update(self.model.as_bytes());
        hasher.update([0]);
        hasher.update(self.temperature.to_bits().to_le_bytes());
        hasher.update(self.max_tokens.to_le_bytes());
        let digest = hasher.finalize();
        let mut out = String::with_capacity(64);
        for byte in digest {
            out.push_str(&format!("{:02x}", byte));
        }
        out
    }

    /// Rough token estimate used for rate-limit admission and cost
    /// reservation before the provider reports real usage.
    #[must_use]
    pub fn estimated_tokens(&self) -> u32 {
        let prompt_tokens = (self.prompt.len() / 4) as u32;
        prompt_tokens + self.max_tokens
    }
}

/// Raw completion returned by a provider client
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// Generated content
    pub content: String,
    /// Token usage, if the provider reported it
    pub usage: Option<TokenUsage>,
    /// Model that actually served the call
    pub model: String,
}

/// Final result handed back to callers of the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCallResult {
    /// Generated content
    pub content: String,
    /// Provider that served the call ("offline" for degraded results)
    pub provider: String,
    /// Model that served the call
    pub model: String,
    /// Tokens consumed (0 for cached or degraded results)
    pub tokens_used: u32,
    /// Estimated cost in USD
    pub cost: f64,
    /// Wall-clock latency of the winning call
    pub latency_ms: u64,
    /// True when no provider could serve the call and the deterministic
    /// offline fallback was used instead
    pub degraded: bool,
    /// True when served from the response cache
    pub cached: bool,
}

impl ModelCallResult {
    /// Mark a copy of this result as served from cache.
    #[must_use]
    pub fn as_cached(mut self) -> Self {
        self.cached = true;
        self
    }
}

// ============================================================================
// Provider Trait
// ============================================================================

/// Trait for LLM providers
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &str;

    /// Get available models
    fn available_models(&self) -> Vec<String>;

    /// Get the default model
    fn default_model(&self) -> &str;

    /// Complete a single prompt
    async fn complete(&self, request: &ModelCallRequest) -> Result<ProviderResponse>;
}

/// Map a model name to the provider family that serves it.
///
/// Returns `None` for unknown model families; the gateway skips those
/// candidates rather than guessing.
#[must_use]
pub fn provider_for_model(model: &str) -> Option<&'static str> {
    if model.starts_with("gpt") || model.starts_with("o1") {
        Some("openai")
    } else if model.starts_with("claude") {
        Some("anthropic")
    } else if model.starts_with("gemini") {
        Some("gemini")
    } else if model.starts_with("mock") {
        Some("mock")
    } else {
        None
    }
}

// ============================================================================
// Tests
// ============================================================================
