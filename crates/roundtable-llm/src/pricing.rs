//! Model pricing and cost estimation
//!
//! Per-model USD pricing used for ledger reservations and for the cost
//! attached to every [`crate::provider::ModelCallResult`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default cost per 1M input tokens (USD) for unknown models
const DEFAULT_INPUT_COST_PER_MILLION: f64 = 5.0;

/// Default cost per 1M output tokens (USD) for unknown models
const DEFAULT_OUTPUT_COST_PER_MILLION: f64 = 15.0;

/// Pricing information for a model (per 1M tokens)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Model name
    pub model: String,
    /// Provider name
    pub provider: String,
    /// Cost per 1M input tokens (USD)
    pub input_cost_per_million: f64,
    /// Cost per 1M output tokens (USD)
    pub output_cost_per_million: f64,
}

impl ModelPricing {
    /// Calculate cost for given token counts
    #[must_use]
    pub fn calculate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        let input_cost = (input_tokens as f64 / 1_000_000.0) * self.input_cost_per_million;
        let output_cost = (output_tokens as f64 / 1_000_000.0) * self.output_cost_per_million;
        input_cost + output_cost
    }
}

/// Pricing table keyed by model name
#[derive(Debug, Clone)]
pub struct PricingTable {
    models: HashMap<String, ModelPricing>,
}

impl PricingTable {
    /// Build the default table covering every model the roster's
    /// preference chains can reach.
    #[must_use]
    pub fn new() -> Self {
        let mut models = HashMap::new();
        for (model, provider, input, output) in [
            ("gpt-4o", "openai", 2.50, 10.00),
            ("gpt-4-turbo", "openai", 10.00, 30.00),
            ("gpt-4", "openai", 30.00, 60.00),
            ("claude-3-5-sonnet-20240620", "anthropic", 3.00, 15.00),
            ("claude-3-haiku-20240307", "anthropic", 0.25, 1.25),
            ("gemini-pro", "gemini", 1.25, 5.00),
        ] {
            models.insert(
                model.to_string(),
                ModelPricing {
                    model: model.to_string(),
                    provider: provider.to_string(),
                    input_cost_per_million: input,
                    output_cost_per_million: output,
                },
            );
        }
        Self { models }
    }

    /// Get pricing for a model
    #[must_use]
    pub fn get(&self, model: &str) -> Option<&ModelPricing> {
        self.models.get(model)
    }

    /// Override or add pricing for a model
    pub fn insert(&mut self, pricing: ModelPricing) {
        self.models.insert(pricing.model.clone(), pricing);
    }

    /// Estimate cost for a call, falling back to conservative defaults for
    /// models missing from the table.
    #[must_use]
    pub fn estimate_cost(&self, model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
        if let Some(pricing) = self.models.get(model) {
            pricing.calculate_cost(input_tokens, output_tokens)
        } else {
            (input_tokens as f64 / 1_000_000.0) * DEFAULT_INPUT_COST_PER_MILLION
                + (output_tokens as f64 / 1_000_000.0) * DEFAULT_OUTPUT_COST_PER_MILLION
        }
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_cost() {
        let pricing = ModelPricing {
            model: "test-model".to_string(),
            provider: "test".to_string(),
            input_cost_per_million: 10.0,
            output_cost_per_million: 20.0,
        };

        let cost = pricing.calculate_cost(1_000_000, 1_000_000);
        assert!((cost - 30.0).abs() < 0.001);

        let cost = pricing.calculate_cost(1_000, 1_000);
        assert!((cost - 0.03).abs() < 0.001);
    }

    #[test]
    fn test_default_table_has_chain_models() {
        let table = PricingTable::new();
        assert!(table.get("gpt-4o").is_some());
        assert!(table.get("claude-3-5-sonnet-20240620").is_some());
        assert!(table.get("gemini-pro").is_some());
        assert!(table.get("gpt-4-turbo").is_some());
    }

    #[test]
    fn test_unknown_model_uses_defaults() {
        let table = PricingTable::new();
        let cost = table.estimate_cost("unknown-model", 1_000_000, 1_000_000);
        assert!((cost - 20.0).abs() < 0.001);
    }

    #[test]
    fn test_insert_override() {
        let mut table = PricingTable::new();
        table.insert(ModelPricing {
            model: "gpt-4o".to_string(),
            provider: "openai".to_string(),
            input_cost_per_million: 1.0,
            output_cost_per_million: 1.0,
        });
        let cost = table.estimate_cost("gpt-4o", 1_000_000, 0);
        assert!((cost - 1.0).abs() < 0.001);
    }
}
