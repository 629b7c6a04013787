// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Hook invocation layer.
//!
//! [`HookRunner`] is the thin adapter between the engine and a plugin: every
//! hook call goes through it, so each invocation is traced, failures are
//! tagged with the hook that produced them, and call sites stay free of
//! error-mapping noise. Defaults live on the [`Plugin`] trait itself.

use crate::error::Result;
use crate::plugin::{
    CompletionContext, DimensionContext, FailureContext, FallbackContext, FallbackDirective,
    PlanContext, Plugin, ProcessStartContext, PromptContext, RetryContext, RetryDirective,
    SkipContext, SkipDecision, StartOverrides, TransformContext,
};
use crate::provider::{ProviderRequest, ProviderResponse, ProviderSelection};
use crate::state::ProcessState;
use crate::types::{DimensionResult, ProcessOutput, Section};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Invokes plugin hooks with tracing and hook-name error tagging.
#[derive(Clone)]
pub(crate) struct HookRunner {
    plugin: Arc<dyn Plugin>,
}

impl HookRunner {
    pub(crate) fn new(plugin: Arc<dyn Plugin>) -> Self {
        Self { plugin }
    }

    pub(crate) fn select_provider(&self, dimension: &str) -> ProviderSelection {
        trace!(hook = "select_provider", dimension, "invoking hook");
        self.plugin.select_provider(dimension)
    }

    pub(crate) async fn define_dependencies(
        &self,
        ctx: &PlanContext<'_>,
    ) -> Result<HashMap<String, Vec<String>>> {
        trace!(hook = "define_dependencies", "invoking hook");
        self.plugin
            .define_dependencies(ctx)
            .await
            .map_err(|err| err.in_hook("define_dependencies"))
    }

    pub(crate) async fn create_prompt(&self, ctx: &PromptContext<'_>) -> Result<String> {
        trace!(hook = "create_prompt", dimension = %ctx.context.dimension, "invoking hook");
        self.plugin
            .create_prompt(ctx)
            .await
            .map_err(|err| err.in_hook("create_prompt"))
    }

    pub(crate) async fn before_process_start(
        &self,
        ctx: &ProcessStartContext<'_>,
    ) -> Result<Option<StartOverrides>> {
        trace!(hook = "before_process_start", "invoking hook");
        self.plugin
            .before_process_start(ctx)
            .await
            .map_err(|err| err.in_hook("before_process_start"))
    }

    pub(crate) async fn should_skip_global_dimension(
        &self,
        ctx: &SkipContext<'_>,
    ) -> Result<SkipDecision> {
        trace!(hook = "should_skip_global_dimension", dimension = %ctx.context.dimension, "invoking hook");
        self.plugin
            .should_skip_global_dimension(ctx)
            .await
            .map_err(|err| err.in_hook("should_skip_global_dimension"))
    }

    pub(crate) async fn should_skip_section_dimension(
        &self,
        ctx: &SkipContext<'_>,
    ) -> Result<SkipDecision> {
        trace!(hook = "should_skip_section_dimension", dimension = %ctx.context.dimension, "invoking hook");
        self.plugin
            .should_skip_section_dimension(ctx)
            .await
            .map_err(|err| err.in_hook("should_skip_section_dimension"))
    }

    pub(crate) async fn transform_dependencies(
        &self,
        ctx: &DimensionContext,
        dependencies: HashMap<String, DimensionResult>,
    ) -> Result<HashMap<String, DimensionResult>> {
        trace!(hook = "transform_dependencies", dimension = %ctx.dimension, "invoking hook");
        self.plugin
            .transform_dependencies(ctx, dependencies)
            .await
            .map_err(|err| err.in_hook("transform_dependencies"))
    }

    pub(crate) async fn before_dimension_execute(&self, ctx: &DimensionContext) -> Result<()> {
        trace!(hook = "before_dimension_execute", dimension = %ctx.dimension, "invoking hook");
        self.plugin
            .before_dimension_execute(ctx)
            .await
            .map_err(|err| err.in_hook("before_dimension_execute"))
    }

    pub(crate) async fn before_provider_execute(
        &self,
        ctx: &DimensionContext,
        request: ProviderRequest,
    ) -> Result<ProviderRequest> {
        trace!(hook = "before_provider_execute", dimension = %ctx.dimension, "invoking hook");
        self.plugin
            .before_provider_execute(ctx, request)
            .await
            .map_err(|err| err.in_hook("before_provider_execute"))
    }

    pub(crate) async fn after_provider_execute(
        &self,
        ctx: &DimensionContext,
        response: ProviderResponse,
    ) -> Result<ProviderResponse> {
        trace!(hook = "after_provider_execute", dimension = %ctx.dimension, "invoking hook");
        self.plugin
            .after_provider_execute(ctx, response)
            .await
            .map_err(|err| err.in_hook("after_provider_execute"))
    }

    pub(crate) async fn after_dimension_execute(
        &self,
        ctx: &DimensionContext,
        result: &DimensionResult,
    ) -> Result<()> {
        trace!(hook = "after_dimension_execute", dimension = %ctx.dimension, "invoking hook");
        self.plugin
            .after_dimension_execute(ctx, result)
            .await
            .map_err(|err| err.in_hook("after_dimension_execute"))
    }

    pub(crate) async fn transform_sections(
        &self,
        ctx: &TransformContext<'_>,
    ) -> Result<Option<Vec<Section>>> {
        trace!(hook = "transform_sections", dimension = %ctx.dimension, "invoking hook");
        self.plugin
            .transform_sections(ctx)
            .await
            .map_err(|err| err.in_hook("transform_sections"))
    }

    pub(crate) async fn handle_retry(&self, ctx: &RetryContext<'_>) -> Result<RetryDirective> {
        trace!(hook = "handle_retry", dimension = %ctx.context.dimension, attempt = ctx.attempt, "invoking hook");
        self.plugin
            .handle_retry(ctx)
            .await
            .map_err(|err| err.in_hook("handle_retry"))
    }

    pub(crate) async fn handle_provider_fallback(
        &self,
        ctx: &FallbackContext<'_>,
    ) -> Result<FallbackDirective> {
        trace!(hook = "handle_provider_fallback", dimension = %ctx.context.dimension, "invoking hook");
        self.plugin
            .handle_provider_fallback(ctx)
            .await
            .map_err(|err| err.in_hook("handle_provider_fallback"))
    }

    pub(crate) async fn handle_dimension_failure(
        &self,
        ctx: &FailureContext<'_>,
    ) -> Result<Option<DimensionResult>> {
        trace!(hook = "handle_dimension_failure", dimension = %ctx.context.dimension, "invoking hook");
        self.plugin
            .handle_dimension_failure(ctx)
            .await
            .map_err(|err| err.in_hook("handle_dimension_failure"))
    }

    pub(crate) async fn finalize_results(&self, output: ProcessOutput) -> Result<ProcessOutput> {
        trace!(hook = "finalize_results", "invoking hook");
        self.plugin
            .finalize_results(output)
            .await
            .map_err(|err| err.in_hook("finalize_results"))
    }

    pub(crate) async fn after_process_complete(
        &self,
        ctx: &CompletionContext<'_>,
        output: ProcessOutput,
    ) -> Result<ProcessOutput> {
        trace!(hook = "after_process_complete", "invoking hook");
        self.plugin
            .after_process_complete(ctx, output)
            .await
            .map_err(|err| err.in_hook("after_process_complete"))
    }

    pub(crate) async fn handle_process_failure(
        &self,
        error: &crate::error::Error,
        partial_state: &ProcessState,
    ) -> Result<Option<ProcessOutput>> {
        trace!(hook = "handle_process_failure", "invoking hook");
        self.plugin
            .handle_process_failure(error, partial_state)
            .await
            .map_err(|err| err.in_hook("handle_process_failure"))
    }
}
