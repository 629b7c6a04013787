// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! One dimension invocation against a provider chain.
//!
//! The runner owns the retry/fallback state machine: up to `1 + max_retries`
//! attempts against the primary, then each declared fallback in order (same
//! retry budget), then the dimension-failure hook. Retry-before-fallback is
//! absolute. Hook order within one attempt is fixed:
//! `before_provider_execute` -> provider call ->
//! (`after_provider_execute` | `handle_retry`).

use crate::error::{Error, ProviderAttempt, Result};
use crate::hooks::HookRunner;
use crate::options::ProcessOptions;
use crate::plugin::{DimensionContext, FailureContext, FallbackContext, PromptContext, RetryContext};
use crate::provider::{ProviderRegistry, ProviderRequest, RequestMetadata};
use crate::types::{DimensionResult, ResultMetadata, Section};
use crate::util::exponential_backoff;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// One entry of the provider chain: the primary or a declared fallback.
struct ChainEntry {
    provider: String,
    options: HashMap<String, Value>,
    retry_after: Option<Duration>,
}

pub(crate) struct ProviderRunner {
    hooks: HookRunner,
    providers: ProviderRegistry,
    options: Arc<ProcessOptions>,
}

impl ProviderRunner {
    pub(crate) fn new(
        hooks: HookRunner,
        providers: ProviderRegistry,
        options: Arc<ProcessOptions>,
    ) -> Self {
        Self {
            hooks,
            providers,
            options,
        }
    }

    /// Execute one slot: prompt construction, provider chain, failure hook.
    pub(crate) async fn execute(
        &self,
        ctx: &DimensionContext,
        sections: &[Section],
        dependencies: HashMap<String, DimensionResult>,
        global_results: &HashMap<String, DimensionResult>,
    ) -> Result<DimensionResult> {
        let dependencies = self
            .hooks
            .transform_dependencies(ctx, dependencies)
            .await?;
        let prompt = self
            .hooks
            .create_prompt(&PromptContext {
                context: ctx,
                sections,
                dependencies: &dependencies,
                global_results,
            })
            .await?;
        let selection = self.hooks.select_provider(&ctx.dimension);

        let chain: Vec<ChainEntry> = std::iter::once(ChainEntry {
            provider: selection.provider.clone(),
            options: selection.options.clone(),
            retry_after: None,
        })
        .chain(selection.fallbacks.iter().map(|fallback| ChainEntry {
            provider: fallback.provider.clone(),
            options: fallback.options.clone(),
            retry_after: fallback.retry_after,
        }))
        .collect();

        let base_request = ProviderRequest {
            input: prompt.into(),
            options: HashMap::new(),
            dimension: ctx.dimension.clone(),
            is_global: ctx.is_global,
            metadata: RequestMetadata {
                total_sections: ctx.total_sections,
                extra: HashMap::new(),
            },
        };

        let mut attempts: Vec<ProviderAttempt> = Vec::new();
        for (chain_index, entry) in chain.iter().enumerate() {
            if chain_index > 0 {
                // Ask before switching providers; a halt abandons the rest
                // of the chain.
                let last_error = attempts
                    .last()
                    .map(|attempt| attempt.error.clone())
                    .unwrap_or_default();
                let directive = self
                    .hooks
                    .handle_provider_fallback(&FallbackContext {
                        context: ctx,
                        failed_provider: &chain[chain_index - 1].provider,
                        next_provider: &entry.provider,
                        error: &last_error,
                    })
                    .await?;
                if !directive.should_fallback {
                    debug!(
                        dimension = %ctx.dimension,
                        provider = %entry.provider,
                        "fallback chain halted by hook"
                    );
                    break;
                }
                // The longer of the hook delay and the declared retry_after
                // wins.
                let wait = directive
                    .delay
                    .into_iter()
                    .chain(entry.retry_after)
                    .max()
                    .unwrap_or(Duration::ZERO);
                if !wait.is_zero() {
                    tokio::time::sleep(wait).await;
                }
                warn!(
                    dimension = %ctx.dimension,
                    provider = %entry.provider,
                    "switching to fallback provider"
                );
            }

            match self.run_provider(ctx, entry, &base_request, &mut attempts).await? {
                Some(result) => return Ok(result),
                None => continue,
            }
        }

        if let Some(mut result) = self
            .hooks
            .handle_dimension_failure(&FailureContext {
                context: ctx,
                attempts: &attempts,
            })
            .await?
        {
            result
                .metadata
                .get_or_insert_with(ResultMetadata::default)
                .fallback = true;
            debug!(dimension = %ctx.dimension, "dimension failure recovered by hook");
            return Ok(result);
        }

        Err(Error::AllProvidersFailed {
            dimension: ctx.dimension.clone(),
            attempts,
        })
    }

    /// Run the retry loop against one chain entry. Returns `Ok(Some)` on
    /// success, `Ok(None)` when this provider is exhausted and the chain
    /// should advance.
    async fn run_provider(
        &self,
        ctx: &DimensionContext,
        entry: &ChainEntry,
        base_request: &ProviderRequest,
        attempts: &mut Vec<ProviderAttempt>,
    ) -> Result<Option<DimensionResult>> {
        let provider = match self.providers.get(&entry.provider) {
            Ok(provider) => provider,
            Err(err) => {
                // A registry miss cannot succeed on retry; record it and let
                // the chain advance.
                attempts.push(ProviderAttempt {
                    provider: entry.provider.clone(),
                    error: err.to_string(),
                });
                return Ok(None);
            }
        };

        let timeout = self.options.timeout_for(&ctx.dimension);
        let mut request = base_request.clone();
        request.options = entry.options.clone();

        for attempt in 0..=self.options.max_retries {
            let prepared = self
                .hooks
                .before_provider_execute(ctx, request.clone())
                .await?;

            let outcome = match tokio::time::timeout(timeout, provider.execute(&prepared)).await {
                Err(_) => Err(Error::Timeout {
                    dimension: ctx.dimension.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                }),
                Ok(Err(err)) => Err(err),
                Ok(Ok(response)) => match response.error {
                    Some(message) => Err(Error::Provider {
                        provider: entry.provider.clone(),
                        message,
                    }),
                    None => Ok(response),
                },
            };

            let error = match outcome {
                Ok(response) => {
                    let response = self.hooks.after_provider_execute(ctx, response).await?;
                    let mut metadata = response.metadata.unwrap_or_default();
                    if metadata.provider.is_none() {
                        metadata.provider = Some(entry.provider.clone());
                    }
                    return Ok(Some(DimensionResult {
                        data: response.data,
                        error: None,
                        metadata: Some(metadata),
                    }));
                }
                Err(err) => err,
            };

            let message = error.to_string();
            warn!(
                dimension = %ctx.dimension,
                provider = %entry.provider,
                attempt,
                error = %message,
                "provider attempt failed"
            );

            if attempt == self.options.max_retries {
                attempts.push(ProviderAttempt {
                    provider: entry.provider.clone(),
                    error: message,
                });
                return Ok(None);
            }

            // Advisory: the hook can stop early or adjust delay/request, but
            // never extend past max_retries.
            let directive = self
                .hooks
                .handle_retry(&RetryContext {
                    context: ctx,
                    provider: &entry.provider,
                    attempt,
                    max_retries: self.options.max_retries,
                    error: &message,
                    request: &prepared,
                })
                .await?;
            if !directive.should_retry {
                attempts.push(ProviderAttempt {
                    provider: entry.provider.clone(),
                    error: message,
                });
                return Ok(None);
            }
            let delay = directive
                .delay
                .unwrap_or_else(|| exponential_backoff(self.options.retry_delay, attempt));
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if let Some(modified) = directive.modified_request {
                request = modified;
            }
        }

        Ok(None)
    }
}
