//! Roundtable LLM - Provider Gateway
//!
//! This crate provides LLM integration for Roundtable:
//! - Gateway: fallback-chain routing, caching, rate limiting, cost ceilings
//! - Provider: the provider trait and provider-agnostic call types
//! - OpenAI: GPT-4 family (gpt-4o, gpt-4-turbo, gpt-4)
//! - Anthropic: Claude 3 family (3.5 Sonnet, Haiku)
//! - Gemini: Google Gemini family (gemini-pro, 1.5 Flash)
//! - Ledger: reservation-based spend ceilings (per request, daily, weekly, monthly)
//! - Cache: fingerprint-keyed response cache with TTL and FIFO eviction

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod pricing;
pub mod provider;
pub mod providers;
pub mod ratelimit;
pub mod util;

pub use cache::{CacheStats, ResponseCache};
pub use error::{CostPeriod, Error, Result};
pub use gateway::{GatewayConfig, GatewayStats, LlmGateway, DEFAULT_FALLBACK_CHAIN};
pub use ledger::{CostCeilings, CostLedger, Ticket};
pub use pricing::{ModelPricing, PricingTable};
pub use provider::{
    provider_for_model, LlmProvider, ModelCallRequest, ModelCallResult, ProviderResponse,
    TokenUsage,
};
pub use ratelimit::{RateLimit, RateLimiter, DEFAULT_WINDOW_SECS};

// Re-export provider types
pub use providers::{
    AnthropicConfig, AnthropicProvider, GeminiConfig, GeminiProvider, MockProvider, OpenAiConfig,
    OpenAiProvider,
};
