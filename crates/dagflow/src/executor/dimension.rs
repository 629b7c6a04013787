// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Per-dimension execution: skip consultation, dependency resolution, and
//! scope-aware fan-out through the bounded concurrency queue.

use crate::error::{Error, Result};
use crate::hooks::HookRunner;
use crate::options::ProcessOptions;
use crate::plan::ExecutionPlan;
use crate::plugin::{DimensionContext, SkipContext, SkipDecision};
use crate::progress::{ProgressTracker, SlotOutcome};
use crate::resolver::DependencyResolver;
use crate::state::StateManager;
use crate::types::{DimensionResult, Section};
use futures::future::try_join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::provider::ProviderRunner;

pub(crate) struct DimensionRunner {
    hooks: HookRunner,
    provider_runner: ProviderRunner,
    options: Arc<ProcessOptions>,
    queue: Arc<Semaphore>,
}

impl DimensionRunner {
    pub(crate) fn new(
        hooks: HookRunner,
        provider_runner: ProviderRunner,
        options: Arc<ProcessOptions>,
        queue: Arc<Semaphore>,
    ) -> Self {
        Self {
            hooks,
            provider_runner,
            options,
            queue,
        }
    }

    /// Run one global dimension and record its result.
    pub(crate) async fn run_global(
        &self,
        plan: &ExecutionPlan,
        state: &StateManager,
        tracker: &ProgressTracker,
        dimension: &str,
    ) -> Result<()> {
        let sections = state.sections();
        let ctx = DimensionContext {
            process_id: state.id(),
            dimension: dimension.to_string(),
            is_global: true,
            section_index: None,
            total_sections: sections.len(),
        };
        let dependencies = DependencyResolver::new(plan, state).resolve(dimension, None);

        let decision = self
            .hooks
            .should_skip_global_dimension(&SkipContext {
                context: &ctx,
                sections: &sections,
                dependencies: &dependencies,
            })
            .await?;
        if let Some(result) = skip_result(decision) {
            debug!(dimension, "global dimension skipped");
            state.insert_global_result(dimension, result.clone());
            tracker.record(dimension, SlotOutcome::Skipped, 0.0);
            self.hooks.after_dimension_execute(&ctx, &result).await?;
            return Ok(());
        }

        self.hooks.before_dimension_execute(&ctx).await?;
        let global_results = state.global_results();
        let outcome = {
            let _slot = self.acquire_slot().await?;
            self.provider_runner
                .execute(&ctx, &sections, dependencies, &global_results)
                .await
        };

        if let Some(result) = self.settle(&ctx, outcome, tracker).await? {
            state.insert_global_result(dimension, result);
        }
        debug!(dimension, "global dimension finished");
        Ok(())
    }

    /// Run one section dimension across every current section.
    pub(crate) async fn run_section_dimension(
        &self,
        plan: &ExecutionPlan,
        state: &StateManager,
        tracker: &ProgressTracker,
        dimension: &str,
    ) -> Result<()> {
        let sections = state.sections();
        debug!(dimension, sections = sections.len(), "section dimension fan-out");
        let slots = (0..sections.len()).map(|index| {
            self.run_section_slot(plan, state, tracker, dimension, index, &sections)
        });
        try_join_all(slots).await?;
        Ok(())
    }

    async fn run_section_slot(
        &self,
        plan: &ExecutionPlan,
        state: &StateManager,
        tracker: &ProgressTracker,
        dimension: &str,
        index: usize,
        sections: &[Section],
    ) -> Result<()> {
        let ctx = DimensionContext {
            process_id: state.id(),
            dimension: dimension.to_string(),
            is_global: false,
            section_index: Some(index),
            total_sections: sections.len(),
        };
        let visible = &sections[index..=index];
        let dependencies = DependencyResolver::new(plan, state).resolve(dimension, Some(index));

        let decision = self
            .hooks
            .should_skip_section_dimension(&SkipContext {
                context: &ctx,
                sections: visible,
                dependencies: &dependencies,
            })
            .await?;
        if let Some(result) = skip_result(decision) {
            debug!(dimension, section = index, "section slot skipped");
            state.insert_section_result(index, dimension, result.clone());
            tracker.record(dimension, SlotOutcome::Skipped, 0.0);
            self.hooks.after_dimension_execute(&ctx, &result).await?;
            return Ok(());
        }

        self.hooks.before_dimension_execute(&ctx).await?;
        let global_results = state.global_results();
        let outcome = {
            let _slot = self.acquire_slot().await?;
            self.provider_runner
                .execute(&ctx, visible, dependencies, &global_results)
                .await
        };

        if let Some(result) = self.settle(&ctx, outcome, tracker).await? {
            state.insert_section_result(index, dimension, result);
        }
        Ok(())
    }

    /// Turn a provider outcome into a recorded result, honoring
    /// `continue_on_error`, and notify progress and the completion hook.
    async fn settle(
        &self,
        ctx: &DimensionContext,
        outcome: Result<DimensionResult>,
        tracker: &ProgressTracker,
    ) -> Result<Option<DimensionResult>> {
        match outcome {
            Ok(result) => {
                let cost = self.slot_cost(&result);
                let slot_outcome = if result.is_error() {
                    SlotOutcome::Failed
                } else if result.is_skipped() {
                    SlotOutcome::Skipped
                } else {
                    SlotOutcome::Succeeded
                };
                tracker.record(&ctx.dimension, slot_outcome, cost);
                self.hooks.after_dimension_execute(ctx, &result).await?;
                Ok(Some(result))
            }
            Err(error) => {
                tracker.record(&ctx.dimension, SlotOutcome::Failed, 0.0);
                if self.options.continue_on_error {
                    warn!(
                        dimension = %ctx.dimension,
                        section = ?ctx.section_index,
                        error = %error,
                        "slot failed; continuing"
                    );
                    let result = DimensionResult::failure(error.to_string());
                    self.hooks.after_dimension_execute(ctx, &result).await?;
                    Ok(Some(result))
                } else {
                    Err(error)
                }
            }
        }
    }

    fn slot_cost(&self, result: &DimensionResult) -> f64 {
        let Some(pricing) = self.options.pricing.as_ref() else {
            return 0.0;
        };
        result
            .metadata
            .as_ref()
            .and_then(|metadata| {
                let tokens = metadata.tokens.as_ref()?;
                let model = metadata.model.as_ref()?;
                pricing.cost_of(model, tokens)
            })
            .unwrap_or(0.0)
    }

    async fn acquire_slot(&self) -> Result<tokio::sync::SemaphorePermit<'_>> {
        self.queue
            .acquire()
            .await
            .map_err(|_| Error::message("execution queue closed"))
    }
}

/// Map a skip decision to the result to record, or `None` to run the slot.
fn skip_result(decision: SkipDecision) -> Option<DimensionResult> {
    match decision {
        SkipDecision::Run => None,
        SkipDecision::Skip => Some(DimensionResult::skipped()),
        SkipDecision::SkipWith(result) => Some(result),
    }
}
