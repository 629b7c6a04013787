// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Cost accounting for provider calls.
//!
//! Pricing is configured per model as dollars per million tokens; the
//! calculator walks dimension results, reads their token metadata and
//! aggregates spend per dimension, per provider and in total. Results whose
//! model has no price entry are skipped with a single warning per model.

use crate::types::{DimensionResult, TokenUsage};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::warn;

// ============================================================================
// Pricing
// ============================================================================

/// Pricing for a single model.
///
/// Stored as cost per 1,000,000 tokens. Use [`Pricing::per_1m`] for the
/// modern per-million format or [`Pricing::per_1k`] for legacy per-thousand
/// price sheets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    /// Cost per 1,000,000 input tokens.
    pub input_per_million: f64,
    /// Cost per 1,000,000 output tokens.
    pub output_per_million: f64,
}

impl Pricing {
    /// Pricing from per-1M token prices.
    #[must_use]
    pub fn per_1m(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }

    /// Pricing from per-1K token prices.
    #[must_use]
    pub fn per_1k(input_per_1k: f64, output_per_1k: f64) -> Self {
        Self {
            input_per_million: input_per_1k * 1000.0,
            output_per_million: output_per_1k * 1000.0,
        }
    }

    /// Dollar cost of one call's token usage.
    #[must_use]
    pub fn cost_of(&self, tokens: &TokenUsage) -> f64 {
        (tokens.input as f64 * self.input_per_million
            + tokens.output as f64 * self.output_per_million)
            / 1_000_000.0
    }
}

/// Model name to [`Pricing`] table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingTable {
    /// Per-model pricing entries.
    pub models: HashMap<String, Pricing>,
}

impl PricingTable {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a model entry.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>, pricing: Pricing) -> Self {
        self.models.insert(model.into(), pricing);
        self
    }

    /// Cost of one call, if the model is priced.
    #[must_use]
    pub fn cost_of(&self, model: &str, tokens: &TokenUsage) -> Option<f64> {
        self.models.get(model).map(|p| p.cost_of(tokens))
    }
}

// ============================================================================
// Summary
// ============================================================================

/// Aggregated spend for one grouping key (dimension or provider).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    /// Dollar cost.
    pub cost: f64,
    /// Input tokens.
    pub input_tokens: u64,
    /// Output tokens.
    pub output_tokens: u64,
    /// Number of priced calls.
    pub calls: u64,
}

impl CostBreakdown {
    fn record(&mut self, tokens: &TokenUsage, cost: f64) {
        self.cost += cost;
        self.input_tokens += tokens.input;
        self.output_tokens += tokens.output;
        self.calls += 1;
    }
}

/// Total cost report for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostSummary {
    /// Total dollar cost across all priced results.
    pub total_cost: f64,
    /// Total tokens across all priced results.
    pub total_tokens: u64,
    /// Spend grouped by dimension name.
    pub by_dimension: HashMap<String, CostBreakdown>,
    /// Spend grouped by provider name.
    pub by_provider: HashMap<String, CostBreakdown>,
    /// Currency of all cost figures.
    pub currency: String,
}

/// Walks dimension results and produces a [`CostSummary`].
#[derive(Debug, Clone)]
pub struct CostCalculator {
    table: PricingTable,
}

impl CostCalculator {
    /// Calculator over the given pricing table.
    #[must_use]
    pub fn new(table: PricingTable) -> Self {
        Self { table }
    }

    /// Aggregate cost over `(dimension, result)` pairs.
    ///
    /// Pairs must cover every result that should be billed: current section
    /// results, results preserved from before a transformation, and global
    /// results. Results without token metadata (skips, failures, hook
    /// fallbacks) contribute nothing. An unpriced model is warned once and
    /// skipped.
    pub fn summarize<'a>(
        &self,
        results: impl IntoIterator<Item = (&'a str, &'a DimensionResult)>,
    ) -> CostSummary {
        let mut summary = CostSummary {
            currency: "USD".to_string(),
            ..CostSummary::default()
        };
        let mut unpriced: HashSet<String> = HashSet::new();

        for (dimension, result) in results {
            let Some(metadata) = result.metadata.as_ref() else {
                continue;
            };
            let (Some(tokens), Some(model)) = (metadata.tokens.as_ref(), metadata.model.as_ref())
            else {
                continue;
            };
            let Some(cost) = self.table.cost_of(model, tokens) else {
                if unpriced.insert(model.clone()) {
                    warn!(model = %model, "no pricing entry for model; excluding from cost summary");
                }
                continue;
            };

            summary.total_cost += cost;
            summary.total_tokens += tokens.total;
            summary
                .by_dimension
                .entry(dimension.to_string())
                .or_default()
                .record(tokens, cost);
            let provider = metadata.provider.clone().unwrap_or_else(|| "unknown".to_string());
            summary.by_provider.entry(provider).or_default().record(tokens, cost);
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResultMetadata;
    use serde_json::json;

    fn priced_result(model: &str, provider: &str, input: u64, output: u64) -> DimensionResult {
        DimensionResult::success(
            json!({"ok": true}),
            ResultMetadata {
                tokens: Some(TokenUsage::new(input, output)),
                model: Some(model.to_string()),
                provider: Some(provider.to_string()),
                ..ResultMetadata::default()
            },
        )
    }

    #[test]
    fn test_per_1k_converts_to_per_million() {
        let pricing = Pricing::per_1k(0.03, 0.06);
        assert_eq!(pricing.input_per_million, 30.0);
        assert_eq!(pricing.output_per_million, 60.0);
    }

    #[test]
    fn test_cost_of_single_call() {
        let pricing = Pricing::per_1m(2.5, 10.0);
        let cost = pricing.cost_of(&TokenUsage::new(1_000_000, 100_000));
        assert!((cost - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_summarize_groups_by_dimension_and_provider() {
        let table = PricingTable::new().with_model("m", Pricing::per_1m(1.0, 2.0));
        let calculator = CostCalculator::new(table);

        let a = priced_result("m", "alpha", 500_000, 0);
        let b = priced_result("m", "beta", 0, 250_000);
        let summary =
            calculator.summarize([("classify", &a), ("classify", &b)]);

        assert!((summary.total_cost - 1.0).abs() < 1e-9);
        assert_eq!(summary.total_tokens, 750_000);
        assert_eq!(summary.by_dimension.len(), 1);
        assert_eq!(summary.by_dimension["classify"].calls, 2);
        assert_eq!(summary.by_provider["alpha"].calls, 1);
        assert_eq!(summary.by_provider["beta"].calls, 1);
        assert_eq!(summary.currency, "USD");
    }

    #[test]
    fn test_unpriced_model_is_skipped() {
        let calculator = CostCalculator::new(PricingTable::new());
        let result = priced_result("mystery", "alpha", 1000, 1000);
        let summary = calculator.summarize([("dim", &result)]);
        assert_eq!(summary.total_cost, 0.0);
        assert!(summary.by_dimension.is_empty());
    }

    #[test]
    fn test_skipped_results_contribute_nothing() {
        let table = PricingTable::new().with_model("m", Pricing::per_1m(1.0, 1.0));
        let calculator = CostCalculator::new(table);
        let skipped = DimensionResult::skipped();
        let summary = calculator.summarize([("dim", &skipped)]);
        assert_eq!(summary.total_cost, 0.0);
        assert_eq!(summary.total_tokens, 0);
    }
}
