// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! The plugin interface.
//!
//! A plugin is a capability record: implement the required operations
//! ([`Plugin::dimensions`], [`Plugin::create_prompt`],
//! [`Plugin::select_provider`]) and override only the lifecycle hooks you
//! care about; every hook has a default body. Hooks run sequentially within
//! one slot's execution; parallelism exists across slots, never within a
//! single hook chain.

use crate::error::{ProviderAttempt, Result};
use crate::options::ProcessOptions;
use crate::provider::{ProviderRequest, ProviderResponse, ProviderSelection};
use crate::state::ProcessState;
use crate::types::{DimensionDescriptor, DimensionResult, ProcessOutput, Section};
use crate::util::OutcomeCounts;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

// ============================================================================
// Hook contexts
// ============================================================================

/// Context for [`Plugin::before_process_start`].
#[derive(Debug, Clone, Copy)]
pub struct ProcessStartContext<'a> {
    /// Run id.
    pub process_id: &'a str,
    /// Run start, milliseconds since the epoch.
    pub start_time: i64,
    /// Caller-supplied sections, before any override.
    pub sections: &'a [Section],
    /// Options for this run.
    pub options: &'a ProcessOptions,
}

/// Replacement inputs returned by [`Plugin::before_process_start`].
#[derive(Debug, Clone, Default)]
pub struct StartOverrides {
    /// Replacement section list.
    pub sections: Option<Vec<Section>>,
    /// Opaque run metadata, stored on the state.
    pub metadata: Option<Value>,
}

/// Context for [`Plugin::define_dependencies`].
#[derive(Debug, Clone, Copy)]
pub struct PlanContext<'a> {
    /// Run id.
    pub process_id: &'a str,
    /// Sections as they stand after pre-process.
    pub sections: &'a [Section],
    /// Metadata returned by the pre-process hook, if any.
    pub metadata: Option<&'a Value>,
}

/// Identity of one slot execution, shared by several hooks.
#[derive(Debug, Clone)]
pub struct DimensionContext {
    /// Run id.
    pub process_id: String,
    /// Dimension being executed.
    pub dimension: String,
    /// True for global-scope invocations.
    pub is_global: bool,
    /// Section index for section-scope slots.
    pub section_index: Option<usize>,
    /// Section count visible to the run at execution time.
    pub total_sections: usize,
}

/// Context for [`Plugin::create_prompt`].
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    /// Slot identity.
    pub context: &'a DimensionContext,
    /// Sections visible to this call: one for section scope, all for global.
    pub sections: &'a [Section],
    /// Resolved (and possibly transformed) upstream results.
    pub dependencies: &'a HashMap<String, DimensionResult>,
    /// Global results recorded so far.
    pub global_results: &'a HashMap<String, DimensionResult>,
}

/// Context for the skip hooks.
#[derive(Debug, Clone, Copy)]
pub struct SkipContext<'a> {
    /// Slot identity.
    pub context: &'a DimensionContext,
    /// Sections visible to this slot.
    pub sections: &'a [Section],
    /// Resolved upstream results.
    pub dependencies: &'a HashMap<String, DimensionResult>,
}

/// Decision returned by the skip hooks.
#[derive(Debug, Clone, Default)]
pub enum SkipDecision {
    /// Execute the slot.
    #[default]
    Run,
    /// Skip; record a result with `metadata.skipped = true`.
    Skip,
    /// Skip; record the supplied result verbatim.
    SkipWith(DimensionResult),
}

/// Context for [`Plugin::transform_sections`].
#[derive(Debug, Clone, Copy)]
pub struct TransformContext<'a> {
    /// The global dimension that just completed.
    pub dimension: &'a str,
    /// Current section list.
    pub sections: &'a [Section],
    /// The completed dimension's result.
    pub result: &'a DimensionResult,
}

/// Context for [`Plugin::handle_retry`].
#[derive(Debug, Clone, Copy)]
pub struct RetryContext<'a> {
    /// Slot identity.
    pub context: &'a DimensionContext,
    /// Provider that just failed.
    pub provider: &'a str,
    /// Zero-based index of the failed attempt against this provider.
    pub attempt: u32,
    /// Hard retry cap for this run.
    pub max_retries: u32,
    /// Failure message of the attempt.
    pub error: &'a str,
    /// The request that failed.
    pub request: &'a ProviderRequest,
}

/// Directive returned by [`Plugin::handle_retry`].
///
/// Advisory only: the hook can stop retries early or adjust the delay and
/// request, but it can never extend attempts past `max_retries`.
#[derive(Debug, Clone, Default)]
pub struct RetryDirective {
    /// Whether to retry at all. Defaults to true.
    pub should_retry: bool,
    /// Override for the backoff delay; `None` keeps the exponential default.
    pub delay: Option<Duration>,
    /// Replacement request for the next attempt.
    pub modified_request: Option<ProviderRequest>,
}

impl RetryDirective {
    /// Retry with the default backoff.
    #[must_use]
    pub fn retry() -> Self {
        Self {
            should_retry: true,
            ..Self::default()
        }
    }

    /// Retry after a specific delay.
    #[must_use]
    pub fn retry_after(delay: Duration) -> Self {
        Self {
            should_retry: true,
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Stop retrying this provider.
    #[must_use]
    pub fn stop() -> Self {
        Self::default()
    }

    /// Replace the request for the next attempt.
    #[must_use]
    pub fn with_request(mut self, request: ProviderRequest) -> Self {
        self.modified_request = Some(request);
        self
    }
}

/// Context for [`Plugin::handle_provider_fallback`].
#[derive(Debug, Clone, Copy)]
pub struct FallbackContext<'a> {
    /// Slot identity.
    pub context: &'a DimensionContext,
    /// Provider whose retries were just exhausted.
    pub failed_provider: &'a str,
    /// Fallback about to be attempted.
    pub next_provider: &'a str,
    /// Failure message of the last attempt.
    pub error: &'a str,
}

/// Directive returned by [`Plugin::handle_provider_fallback`].
#[derive(Debug, Clone, Default)]
pub struct FallbackDirective {
    /// Whether to try the next fallback. Returning false abandons the chain.
    pub should_fallback: bool,
    /// Extra wait before the fallback; the longer of this and the
    /// fallback's declared `retry_after` wins.
    pub delay: Option<Duration>,
}

impl FallbackDirective {
    /// Continue to the next fallback.
    #[must_use]
    pub fn proceed() -> Self {
        Self {
            should_fallback: true,
            delay: None,
        }
    }

    /// Continue after a delay.
    #[must_use]
    pub fn proceed_after(delay: Duration) -> Self {
        Self {
            should_fallback: true,
            delay: Some(delay),
        }
    }

    /// Abandon the fallback chain.
    #[must_use]
    pub fn halt() -> Self {
        Self::default()
    }
}

/// Context for [`Plugin::handle_dimension_failure`].
#[derive(Debug, Clone, Copy)]
pub struct FailureContext<'a> {
    /// Slot identity.
    pub context: &'a DimensionContext,
    /// Every provider attempted, in order, with its final error.
    pub attempts: &'a [ProviderAttempt],
}

/// Context for [`Plugin::after_process_complete`].
#[derive(Debug, Clone, Copy)]
pub struct CompletionContext<'a> {
    /// Final run state.
    pub state: &'a ProcessState,
    /// Wall-clock duration of the run.
    pub duration: Duration,
    /// Outcome counts across all slots.
    pub counts: OutcomeCounts,
}

// ============================================================================
// Plugin trait
// ============================================================================

/// A workflow plugin: dimension declarations, prompt/provider selection, and
/// optional lifecycle hooks.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// The declared dimension set. Source of truth for names and scopes.
    fn dimensions(&self) -> Vec<DimensionDescriptor>;

    /// Dependency map: dimension name to the names it depends on.
    /// Defaults to no dependencies.
    async fn define_dependencies(
        &self,
        _ctx: &PlanContext<'_>,
    ) -> Result<HashMap<String, Vec<String>>> {
        Ok(HashMap::new())
    }

    /// Build the prompt for one slot.
    async fn create_prompt(&self, ctx: &PromptContext<'_>) -> Result<String>;

    /// Choose the provider (and fallbacks) for a dimension.
    fn select_provider(&self, dimension: &str) -> ProviderSelection;

    /// Phase 1: may replace the input sections and attach run metadata.
    async fn before_process_start(
        &self,
        _ctx: &ProcessStartContext<'_>,
    ) -> Result<Option<StartOverrides>> {
        Ok(None)
    }

    /// Consulted before each global dimension runs.
    async fn should_skip_global_dimension(&self, _ctx: &SkipContext<'_>) -> Result<SkipDecision> {
        Ok(SkipDecision::Run)
    }

    /// Consulted before each (dimension, section) slot runs.
    async fn should_skip_section_dimension(&self, _ctx: &SkipContext<'_>) -> Result<SkipDecision> {
        Ok(SkipDecision::Run)
    }

    /// Reshape the resolved dependency bundle just before prompt creation.
    async fn transform_dependencies(
        &self,
        _ctx: &DimensionContext,
        dependencies: HashMap<String, DimensionResult>,
    ) -> Result<HashMap<String, DimensionResult>> {
        Ok(dependencies)
    }

    /// Side-effect hook before the provider runner takes over a slot.
    async fn before_dimension_execute(&self, _ctx: &DimensionContext) -> Result<()> {
        Ok(())
    }

    /// Inspect or replace the request before each provider attempt.
    async fn before_provider_execute(
        &self,
        _ctx: &DimensionContext,
        request: ProviderRequest,
    ) -> Result<ProviderRequest> {
        Ok(request)
    }

    /// Inspect or replace the response after a successful attempt.
    async fn after_provider_execute(
        &self,
        _ctx: &DimensionContext,
        response: ProviderResponse,
    ) -> Result<ProviderResponse> {
        Ok(response)
    }

    /// Side-effect hook after a slot reaches its final outcome.
    async fn after_dimension_execute(
        &self,
        _ctx: &DimensionContext,
        _result: &DimensionResult,
    ) -> Result<()> {
        Ok(())
    }

    /// After a global dimension completes: return a new section list to
    /// reshape the batch, or `None` to leave it unchanged.
    async fn transform_sections(&self, _ctx: &TransformContext<'_>) -> Result<Option<Vec<Section>>> {
        Ok(None)
    }

    /// After a failed attempt: decide whether to retry. Advisory; the hard
    /// cap is the run's `max_retries`.
    async fn handle_retry(&self, _ctx: &RetryContext<'_>) -> Result<RetryDirective> {
        Ok(RetryDirective::retry())
    }

    /// Before switching to the next fallback provider.
    async fn handle_provider_fallback(
        &self,
        _ctx: &FallbackContext<'_>,
    ) -> Result<FallbackDirective> {
        Ok(FallbackDirective::proceed())
    }

    /// After every provider failed: return a substitute result to recover
    /// the slot, or `None` to let the failure propagate.
    async fn handle_dimension_failure(
        &self,
        _ctx: &FailureContext<'_>,
    ) -> Result<Option<DimensionResult>> {
        Ok(None)
    }

    /// Phase 4: last chance to reshape the assembled results.
    async fn finalize_results(&self, output: ProcessOutput) -> Result<ProcessOutput> {
        Ok(output)
    }

    /// Phase 5: may replace the final result.
    async fn after_process_complete(
        &self,
        _ctx: &CompletionContext<'_>,
        output: ProcessOutput,
    ) -> Result<ProcessOutput> {
        Ok(output)
    }

    /// Failure recovery: may turn a failed run into a result.
    async fn handle_process_failure(
        &self,
        _error: &crate::error::Error,
        _partial_state: &ProcessState,
    ) -> Result<Option<ProcessOutput>> {
        Ok(None)
    }
}
