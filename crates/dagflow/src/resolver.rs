// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Dependency bundle resolution.
//!
//! Upstream dimensions are fully complete before downstream dimensions start
//! (group ordering guarantees it), so resolution reads a consistent snapshot
//! of the result maps taken when it begins.
//!
//! Cross-scope rule: a global consumer reading a section-scope upstream
//! receives a synthetic aggregate over every section's result. The reverse
//! direction (section consumer, global upstream) and same-scope edges pass
//! the stored result through verbatim, including results a skip hook
//! supplied for a skipped global, which is why the aggregation test is on
//! the upstream's declared scope, never on the stored result's shape.

use crate::plan::ExecutionPlan;
use crate::state::StateManager;
use crate::types::{DimensionResult, DimensionScope};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Resolves upstream results into the dependency bundle for one slot.
#[derive(Debug, Clone, Copy)]
pub struct DependencyResolver<'a> {
    plan: &'a ExecutionPlan,
    state: &'a StateManager,
}

impl<'a> DependencyResolver<'a> {
    /// Resolver over a plan and the run state.
    #[must_use]
    pub fn new(plan: &'a ExecutionPlan, state: &'a StateManager) -> Self {
        Self { plan, state }
    }

    /// Gather upstream results for `dimension`.
    ///
    /// `section_index` is the consuming slot's section for section-scope
    /// consumers and `None` for global consumers. Missing upstream slots
    /// resolve to empty results.
    #[must_use]
    pub fn resolve(
        &self,
        dimension: &str,
        section_index: Option<usize>,
    ) -> HashMap<String, DimensionResult> {
        let dependencies = self.plan.dependencies_of(dimension);
        if dependencies.is_empty() {
            return HashMap::new();
        }

        // One snapshot for the whole bundle.
        let section_results = self.state.section_results();
        let global_results = self.state.global_results();
        let section_count = self.state.section_count();

        let mut bundle = HashMap::with_capacity(dependencies.len());
        for upstream in dependencies {
            let result = match (self.plan.scope_of(upstream), section_index) {
                (DimensionScope::Global, _) => {
                    global_results.get(upstream).cloned().unwrap_or_default()
                }
                (DimensionScope::Section, Some(index)) => section_results
                    .get(&index)
                    .and_then(|results| results.get(upstream))
                    .cloned()
                    .unwrap_or_default(),
                (DimensionScope::Section, None) => {
                    aggregate_sections(upstream, &section_results, section_count)
                }
            };
            bundle.insert(upstream.clone(), result);
        }
        bundle
    }
}

/// Aggregate envelope a global consumer receives for a section-scope
/// upstream: every section's result in index order, missing slots as null.
fn aggregate_sections(
    upstream: &str,
    section_results: &HashMap<usize, HashMap<String, DimensionResult>>,
    section_count: usize,
) -> DimensionResult {
    let sections: Vec<Value> = (0..section_count)
        .map(|index| {
            section_results
                .get(&index)
                .and_then(|results| results.get(upstream))
                .map(|result| serde_json::to_value(result).unwrap_or(Value::Null))
                .unwrap_or(Value::Null)
        })
        .collect();

    DimensionResult {
        data: Some(json!({
            "sections": sections,
            "aggregated": true,
            "totalSections": section_count,
        })),
        error: None,
        metadata: None,
    }
}
