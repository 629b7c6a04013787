// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Transformation edge semantics: identical lists are no-ops, growth reseeds
//! slots, and only the first section-count change is preserved for costs.

use super::{batch, ok_provider, registry_of};
use crate::cost::{Pricing, PricingTable};
use crate::error::Result;
use crate::executor::Engine;
use crate::options::ProcessOptions;
use crate::plugin::{CompletionContext, Plugin, PromptContext, TransformContext};
use crate::provider::ProviderSelection;
use crate::state::ProcessState;
use crate::types::{DimensionDescriptor, ProcessOutput, Section};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

type StateSink = Arc<Mutex<Option<ProcessState>>>;

struct IdentityTransformPlugin {
    final_state: StateSink,
}

#[async_trait]
impl Plugin for IdentityTransformPlugin {
    fn dimensions(&self) -> Vec<DimensionDescriptor> {
        vec![
            DimensionDescriptor::section("scan"),
            DimensionDescriptor::global("review"),
        ]
    }

    async fn define_dependencies(
        &self,
        _ctx: &crate::plugin::PlanContext<'_>,
    ) -> Result<HashMap<String, Vec<String>>> {
        Ok(HashMap::from([("review".to_string(), vec!["scan".to_string()])]))
    }

    async fn create_prompt(&self, ctx: &PromptContext<'_>) -> Result<String> {
        Ok(ctx.context.dimension.clone())
    }

    fn select_provider(&self, _dimension: &str) -> ProviderSelection {
        ProviderSelection::new("ok")
    }

    async fn transform_sections(&self, ctx: &TransformContext<'_>) -> Result<Option<Vec<Section>>> {
        // An equal list, rebuilt from scratch: must be treated as unchanged.
        Ok(Some(ctx.sections.to_vec()))
    }

    async fn after_process_complete(
        &self,
        ctx: &CompletionContext<'_>,
        output: ProcessOutput,
    ) -> Result<ProcessOutput> {
        *self.final_state.lock() = Some(ctx.state.clone());
        Ok(output)
    }
}

#[tokio::test]
async fn test_equal_list_transformation_is_a_no_op() {
    let final_state: StateSink = Arc::new(Mutex::new(None));
    let engine = Engine::new(
        Arc::new(IdentityTransformPlugin { final_state: Arc::clone(&final_state) }),
        registry_of(vec![ok_provider("ok")]),
    );

    engine.process(batch(3)).await.unwrap();

    // The pre-transform scan results survived: no reset happened.
    let state = final_state.lock().clone().unwrap();
    assert_eq!(state.section_results.len(), 3);
    for index in 0..3 {
        assert!(state.section_results[&index].contains_key("scan"));
    }
}

struct GrowthPlugin;

#[async_trait]
impl Plugin for GrowthPlugin {
    fn dimensions(&self) -> Vec<DimensionDescriptor> {
        vec![
            DimensionDescriptor::section("scan"),
            DimensionDescriptor::global("split"),
            DimensionDescriptor::section("refine"),
        ]
    }

    async fn define_dependencies(
        &self,
        _ctx: &crate::plugin::PlanContext<'_>,
    ) -> Result<HashMap<String, Vec<String>>> {
        Ok(HashMap::from([
            ("split".to_string(), vec!["scan".to_string()]),
            ("refine".to_string(), vec!["split".to_string()]),
        ]))
    }

    async fn create_prompt(&self, ctx: &PromptContext<'_>) -> Result<String> {
        Ok(ctx.context.dimension.clone())
    }

    fn select_provider(&self, _dimension: &str) -> ProviderSelection {
        ProviderSelection::new("ok")
    }

    async fn transform_sections(&self, ctx: &TransformContext<'_>) -> Result<Option<Vec<Section>>> {
        if ctx.dimension == "split" {
            Ok(Some(batch(4)))
        } else {
            Ok(None)
        }
    }
}

#[tokio::test]
async fn test_growth_transformation_reseeds_and_bills_pre_transform_work() {
    let engine = Engine::new(Arc::new(GrowthPlugin), registry_of(vec![ok_provider("ok")]))
        .with_options(ProcessOptions::default().with_pricing(
            PricingTable::new().with_model("unit-model", Pricing::per_1m(1.0, 1.0)),
        ));

    let output = engine.process(batch(2)).await.unwrap();

    assert_eq!(output.transformed_sections.len(), 4);
    assert_eq!(output.sections.len(), 4);
    for section in &output.sections {
        assert!(section.results.contains_key("refine"));
    }

    let costs = output.costs.unwrap();
    assert_eq!(costs.by_dimension["scan"].calls, 2, "pre-transform work stays billed");
    assert_eq!(costs.by_dimension["split"].calls, 1);
    assert_eq!(costs.by_dimension["refine"].calls, 4);
}

struct DoubleReshapePlugin;

#[async_trait]
impl Plugin for DoubleReshapePlugin {
    fn dimensions(&self) -> Vec<DimensionDescriptor> {
        vec![
            DimensionDescriptor::section("scan"),
            DimensionDescriptor::global("first_pass"),
            DimensionDescriptor::section("middle"),
            DimensionDescriptor::global("second_pass"),
            DimensionDescriptor::section("last"),
        ]
    }

    async fn define_dependencies(
        &self,
        _ctx: &crate::plugin::PlanContext<'_>,
    ) -> Result<HashMap<String, Vec<String>>> {
        Ok(HashMap::from([
            ("first_pass".to_string(), vec!["scan".to_string()]),
            ("middle".to_string(), vec!["first_pass".to_string()]),
            ("second_pass".to_string(), vec!["middle".to_string()]),
            ("last".to_string(), vec!["second_pass".to_string()]),
        ]))
    }

    async fn create_prompt(&self, ctx: &PromptContext<'_>) -> Result<String> {
        Ok(ctx.context.dimension.clone())
    }

    fn select_provider(&self, _dimension: &str) -> ProviderSelection {
        ProviderSelection::new("ok")
    }

    async fn transform_sections(&self, ctx: &TransformContext<'_>) -> Result<Option<Vec<Section>>> {
        match ctx.dimension {
            "first_pass" => Ok(Some(batch(2))),
            "second_pass" => Ok(Some(batch(1))),
            _ => Ok(None),
        }
    }
}

#[tokio::test]
async fn test_only_first_count_change_is_preserved_for_costs() {
    let engine = Engine::new(Arc::new(DoubleReshapePlugin), registry_of(vec![ok_provider("ok")]))
        .with_options(ProcessOptions::default().with_pricing(
            PricingTable::new().with_model("unit-model", Pricing::per_1m(1.0, 1.0)),
        ));

    let output = engine.process(batch(3)).await.unwrap();

    assert_eq!(output.transformed_sections.len(), 1);
    let costs = output.costs.unwrap();
    // First snapshot (scan x3) and the final batch (last x1) are billed, as
    // are the globals; the middle batch was displaced by the second reshape
    // without a second snapshot.
    assert_eq!(costs.by_dimension["scan"].calls, 3);
    assert_eq!(costs.by_dimension["first_pass"].calls, 1);
    assert_eq!(costs.by_dimension["second_pass"].calls, 1);
    assert_eq!(costs.by_dimension["last"].calls, 1);
    assert!(!costs.by_dimension.contains_key("middle"));
}
