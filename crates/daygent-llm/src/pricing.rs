//! Model pricing and the cost model
//!
//! Static per-model token pricing covering both supported providers, plus the
//! calculator the proxy uses to price a completed call. Pricing is a snapshot:
//! the proxy computes cost once at record-write time, so later table updates
//! never rewrite history.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default cost per 1M input tokens (USD) for unknown models
pub const DEFAULT_INPUT_COST_PER_MILLION: f64 = 5.0;

/// Default cost per 1M output tokens (USD) for unknown models
pub const DEFAULT_OUTPUT_COST_PER_MILLION: f64 = 15.0;

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

fn entry(
    pricing: &mut HashMap<String, ModelPricing>,
    model: &str,
    provider: &str,
    input: f64,
    output: f64,
) {
    pricing.insert(
        model.to_string(),
        ModelPricing {
            model: model.to_string(),
            provider: provider.to_string(),
            input_cost_per_million: input,
            output_cost_per_million: output,
        },
    );
}

/// Default pricing for both providers' published model families
#[must_use]
pub fn default_pricing() -> HashMap<String, ModelPricing> {
    let mut pricing = HashMap::new();

    // ========================================================================
    // OpenAI
    // ========================================================================
    entry(&mut pricing, "gpt-3.5-turbo", "openai", 0.50, 1.50);
    entry(&mut pricing, "gpt-4", "openai", 30.00, 60.00);
    entry(&mut pricing, "gpt-4-turbo", "openai", 10.00, 30.00);
    entry(&mut pricing, "gpt-4o", "openai", 2.50, 10.00);
    entry(&mut pricing, "gpt-4o-mini", "openai", 0.15, 0.60);

    // ========================================================================
    // Anthropic
    // ========================================================================
    entry(&mut pricing, "claude-3-opus-20240229", "anthropic", 15.00, 75.00);
    entry(&mut pricing, "claude-3-sonnet-20240229", "anthropic", 3.00, 15.00);
    entry(&mut pricing, "claude-3-haiku-20240307", "anthropic", 0.25, 1.25);
    entry(&mut pricing, "claude-3-5-sonnet-20241022", "anthropic", 3.00, 15.00);
    entry(&mut pricing, "claude-3-5-haiku-20241022", "anthropic", 0.80, 4.00);

    pricing
}

/// Cost model: pricing lookups with a default-tier fallback
#[derive(Debug, Clone)]
pub struct CostModel {
    pricing: HashMap<String, ModelPricing>,
}

impl Default for CostModel {
    fn default() -> Self {
        Self::new()
    }
}

impl CostModel {
    /// Create a cost model with the default pricing table
    #[must_use]
    pub fn new() -> Self {
        Self {
            pricing: default_pricing(),
        }
    }

    /// Create a cost model with a custom pricing table
    #[must_use]
    pub fn with_pricing(pricing: HashMap<String, ModelPricing>) -> Self {
        Self { pricing }
    }

    /// Get pricing for a model, if listed
    #[must_use]
    pub fn pricing_for(&self, model: &str) -> Option<&ModelPricing> {
        self.pricing.get(model)
    }

    /// Cost in USD for a call's token counts.
    ///
    /// Unknown models fall back to the default tier's pricing rather than
    /// failing; a call is never blocked just because pricing data for a new
    /// model is missing.
    #[must_use]
    pub fn cost(&self, model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
        if let Some(pricing) = self.pricing.get(model) {
            pricing.calculate_cost(input_tokens, output_tokens)
        } else {
            (input_tokens as f64 / 1_000_000.0) * DEFAULT_INPUT_COST_PER_MILLION
                + (output_tokens as f64 / 1_000_000.0) * DEFAULT_OUTPUT_COST_PER_MILLION
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_model_cost() {
        let model = CostModel::new();
        // gpt-3.5-turbo: $0.50 / $1.50 per 1M tokens
        let cost = model.cost("gpt-3.5-turbo", 1_000_000, 1_000_000);
        assert!((cost - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_cost_formula() {
        let model = CostModel::new();
        // gpt-4o: $2.50 in, $10.00 out
        let cost = model.cost("gpt-4o", 2_000, 500);
        let expected = (2_000.0 * 2.50 + 500.0 * 10.00) / 1_000_000.0;
        assert!((cost - expected).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_model_falls_back() {
        let model = CostModel::new();
        let cost = model.cost("totally-unknown-model-xyz", 1000, 1000);
        assert!(cost > 0.0);
        assert!(cost.is_finite());
        let expected = (1000.0 * DEFAULT_INPUT_COST_PER_MILLION
            + 1000.0 * DEFAULT_OUTPUT_COST_PER_MILLION)
            / 1_000_000.0;
        assert!((cost - expected).abs() < 1e-12);
    }

    #[test]
    fn test_cost_monotonic_in_tokens() {
        let model = CostModel::new();
        for name in ["gpt-4o", "claude-3-5-sonnet-20241022", "unlisted-model"] {
            let mut prev = model.cost(name, 0, 500);
            for input in [1, 10, 1_000, 50_000, 2_000_000] {
                let cost = model.cost(name, input, 500);
                assert!(cost >= prev, "cost decreased for {} at {} input", name, input);
                prev = cost;
            }
        }
    }

    #[test]
    fn test_zero_tokens_cost_zero() {
        let model = CostModel::new();
        assert_eq!(model.cost("gpt-4o", 0, 0), 0.0);
    }

    #[test]
    fn test_both_providers_covered() {
        let model = CostModel::new();
        assert!(model.pricing_for("gpt-4o").is_some());
        assert!(model.pricing_for("claude-3-opus-20240229").is_some());
        assert_eq!(model.pricing_for("gpt-4o").unwrap().provider, "openai");
        assert_eq!(
            model.pricing_for("claude-3-haiku-20240307").unwrap().provider,
            "anthropic"
        );
    }
}
