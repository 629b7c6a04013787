// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! The top-level phase executor.
//!
//! A run moves through five strictly sequential phases:
//!
//! 1. **Pre-process**: `before_process_start` may replace sections and
//!    attach metadata; the post-override sections become the run's
//!    `original_sections`; an empty batch fails fast.
//! 2. **Planning**: `define_dependencies`, graph build, topological sort,
//!    greedy grouping. Cycles and stuck groupings are fatal.
//! 3. **Execution**: groups in order; inside a group all globals run in
//!    parallel, then their transformations apply in declaration order, then
//!    section dimensions fan out across sections, enqueued in declaration
//!    order onto the bounded concurrency queue.
//! 4. **Finalization**: assemble the result object, let `finalize_results`
//!    reshape it, attach the cost summary (including results preserved from
//!    before a transformation).
//! 5. **Post-process**: `after_process_complete` may replace the result.
//!
//! Any phase error routes through `handle_process_failure`, which can turn
//! the failure into a result; otherwise the error propagates.

mod dimension;
mod provider;
#[cfg(test)]
mod tests;
mod transform;

use crate::cost::CostCalculator;
use crate::error::{Error, Result};
use crate::hooks::HookRunner;
use crate::options::{ProcessOptions, ProgressDisplay};
use crate::plan::ExecutionPlan;
use crate::plugin::{CompletionContext, PlanContext, Plugin, ProcessStartContext};
use crate::progress::ProgressTracker;
use crate::provider::ProviderRegistry;
use crate::state::StateManager;
use crate::types::{DimensionResult, DimensionScope, ProcessOutput, Section, SectionOutput};
use crate::util::count_outcomes;
use chrono::Utc;
use dimension::DimensionRunner;
use futures::future::try_join_all;
use provider::ProviderRunner;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use transform::TransformationManager;

/// The execution engine: a plugin, a provider registry, and run options.
///
/// # Example
///
/// ```rust,ignore
/// use dagflow::{Engine, ProcessOptions, ProviderRegistry};
/// use std::sync::Arc;
///
/// let registry = ProviderRegistry::new().with_provider(Arc::new(my_provider));
/// let engine = Engine::new(Arc::new(my_plugin), registry)
///     .with_options(ProcessOptions::default().with_concurrency(8));
/// let output = engine.process(vec!["first".into(), "second".into()]).await?;
/// ```
pub struct Engine {
    plugin: Arc<dyn Plugin>,
    hooks: HookRunner,
    providers: ProviderRegistry,
    options: Arc<ProcessOptions>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("providers", &self.providers)
            .field("options", &self.options)
            .finish()
    }
}

impl Engine {
    /// Engine over a plugin and registry with default options.
    #[must_use]
    pub fn new(plugin: Arc<dyn Plugin>, providers: ProviderRegistry) -> Self {
        Self {
            hooks: HookRunner::new(Arc::clone(&plugin)),
            plugin,
            providers,
            options: Arc::new(ProcessOptions::default()),
        }
    }

    /// Replace the run options.
    #[must_use]
    pub fn with_options(mut self, options: ProcessOptions) -> Self {
        self.options = Arc::new(options);
        self
    }

    /// Build the execution plan for a batch without running it. Useful for
    /// inspecting groups, analytics, and graph exports up front.
    pub async fn plan_for(&self, sections: &[Section]) -> Result<ExecutionPlan> {
        let ctx = PlanContext {
            process_id: "plan-preview",
            sections,
            metadata: None,
        };
        let dependencies = self.hooks.define_dependencies(&ctx).await?;
        ExecutionPlan::build(&self.plugin.dimensions(), &dependencies)
    }

    /// Run the full pipeline over a batch of sections.
    pub async fn process(&self, sections: Vec<Section>) -> Result<ProcessOutput> {
        let state = StateManager::new(sections);
        let process_id = state.id();
        info!(process_id = %process_id, "run started");

        match self.run_phases(&state).await {
            Ok(output) => {
                info!(process_id = %process_id, "run finished");
                Ok(output)
            }
            Err(error) => {
                warn!(process_id = %process_id, error = %error, "run failed; consulting recovery hook");
                match self
                    .hooks
                    .handle_process_failure(&error, &state.snapshot())
                    .await?
                {
                    Some(output) => {
                        info!(process_id = %process_id, "run recovered by failure hook");
                        Ok(output)
                    }
                    None => Err(error),
                }
            }
        }
    }

    async fn run_phases(&self, state: &StateManager) -> Result<ProcessOutput> {
        // Phase 1: pre-process.
        info!(phase = "pre-process", "phase started");
        let process_id = state.id();
        let start_ctx_sections = state.sections();
        let start_ctx = ProcessStartContext {
            process_id: &process_id,
            start_time: state.start_time(),
            sections: &start_ctx_sections,
            options: &self.options,
        };
        if let Some(overrides) = self.hooks.before_process_start(&start_ctx).await? {
            if let Some(sections) = overrides.sections {
                debug!(count = sections.len(), "pre-process replaced sections");
                state.update_sections(sections);
            }
            if let Some(metadata) = overrides.metadata {
                state.set_metadata(metadata);
            }
        }
        state.snapshot_original_sections();
        if state.section_count() == 0 {
            return Err(Error::NoSections);
        }

        // Phase 2: planning.
        info!(phase = "planning", "phase started");
        let plan_sections = state.sections();
        let metadata = state.metadata();
        let plan_ctx = PlanContext {
            process_id: &process_id,
            sections: &plan_sections,
            metadata: metadata.as_ref(),
        };
        let dependencies = self.hooks.define_dependencies(&plan_ctx).await?;
        let plan = ExecutionPlan::build(&self.plugin.dimensions(), &dependencies)?;
        info!(
            dimensions = plan.sorted_dimensions.len(),
            groups = plan.execution_groups.len(),
            "plan built"
        );

        // Phase 3: execution.
        info!(phase = "execution", "phase started");
        let tracked: Vec<(String, DimensionScope)> = plan
            .sorted_dimensions
            .iter()
            .map(|name| (name.clone(), plan.scope_of(name)))
            .collect();
        let log_progress = self.options.progress_display == ProgressDisplay::Simple
            && self.options.on_progress.is_none();
        let tracker = ProgressTracker::new(
            &tracked,
            state.section_count(),
            self.options.on_progress.clone(),
            self.options.update_every,
            log_progress,
        );
        let transformer = TransformationManager::new();
        let queue = Arc::new(Semaphore::new(self.options.concurrency));
        let runner = DimensionRunner::new(
            self.hooks.clone(),
            ProviderRunner::new(
                self.hooks.clone(),
                self.providers.clone(),
                Arc::clone(&self.options),
            ),
            Arc::clone(&self.options),
            queue,
        );

        for (group_index, group) in plan.execution_groups.iter().enumerate() {
            let (globals, section_dims) = plan.split_group(group);
            debug!(
                group = group_index,
                globals = globals.len(),
                sections = section_dims.len(),
                "group started"
            );

            try_join_all(
                globals
                    .iter()
                    .map(|name| runner.run_global(&plan, state, &tracker, name.as_str())),
            )
            .await?;

            for name in &globals {
                if let Some(result) = state.global_result(name.as_str()) {
                    transformer
                        .apply_after_global(&self.hooks, state, &tracker, name.as_str(), &result)
                        .await?;
                }
            }

            // Section dimensions enqueue in declaration order but share the
            // queue; the global -> transformation -> section hand-off is the
            // only intra-group barrier.
            try_join_all(
                section_dims
                    .iter()
                    .map(|name| runner.run_section_dimension(&plan, state, &tracker, name.as_str())),
            )
            .await?;
        }
        tracker.finish();

        // Phase 4: finalization.
        info!(phase = "finalization", "phase started");
        let sections = state.sections();
        let section_results = state.section_results();
        let global_results = state.global_results();
        let section_outputs: Vec<SectionOutput> = sections
            .iter()
            .enumerate()
            .map(|(index, section)| SectionOutput {
                section: section.clone(),
                results: section_results.get(&index).cloned().unwrap_or_default(),
            })
            .collect();
        let mut output = ProcessOutput {
            sections: section_outputs,
            global_results: global_results.clone(),
            transformed_sections: sections,
            costs: None,
        };
        output = self.hooks.finalize_results(output).await?;

        if let Some(pricing) = self.options.pricing.as_ref() {
            let calculator = CostCalculator::new(pricing.clone());
            let preserved = transformer.preserved();
            let mut pairs: Vec<(&str, &DimensionResult)> = Vec::new();
            if let Some(preserved) = preserved.as_ref() {
                for results in preserved.section_results.values() {
                    pairs.extend(results.iter().map(|(name, result)| (name.as_str(), result)));
                }
            }
            for results in section_results.values() {
                pairs.extend(results.iter().map(|(name, result)| (name.as_str(), result)));
            }
            pairs.extend(
                global_results
                    .iter()
                    .map(|(name, result)| (name.as_str(), result)),
            );
            output.costs = Some(calculator.summarize(pairs));
        }

        // Phase 5: post-process.
        info!(phase = "post-process", "phase started");
        let counts = count_outcomes(&section_results, &global_results);
        let elapsed_ms = (Utc::now().timestamp_millis() - state.start_time()).max(0) as u64;
        let final_state = state.snapshot();
        let completion_ctx = CompletionContext {
            state: &final_state,
            duration: Duration::from_millis(elapsed_ms),
            counts,
        };
        output = self.hooks.after_process_complete(&completion_ctx, output).await?;
        Ok(output)
    }
}
