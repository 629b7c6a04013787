// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! The abstract provider seam.
//!
//! The engine never talks to an upstream AI service directly; plugins name a
//! provider and the engine resolves it through the [`ProviderRegistry`].
//! Providers return error-bearing responses for domain failures; thrown
//! transport errors are treated identically by the runner.

use crate::error::{Error, Result};
use crate::types::ResultMetadata;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Prompt payload of one provider call: a single prompt for section scope, a
/// batch for global calls that cover several sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderInput {
    /// One prompt string.
    Text(String),
    /// One prompt per covered section.
    Batch(Vec<String>),
}

impl From<String> for ProviderInput {
    fn from(text: String) -> Self {
        ProviderInput::Text(text)
    }
}

impl From<&str> for ProviderInput {
    fn from(text: &str) -> Self {
        ProviderInput::Text(text.to_string())
    }
}

/// Request handed to a provider adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// Prompt payload.
    pub input: ProviderInput,
    /// Provider options selected by the plugin (model, temperature, ...).
    #[serde(default)]
    pub options: HashMap<String, Value>,
    /// Dimension being executed.
    pub dimension: String,
    /// True for global-scope invocations.
    pub is_global: bool,
    /// Request context the provider may consult.
    #[serde(default)]
    pub metadata: RequestMetadata,
}

/// Context carried with a [`ProviderRequest`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestMetadata {
    /// Section count visible to this run at request time.
    pub total_sections: usize,
    /// Open extension map.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Response from a provider adapter.
///
/// Domain failures come back as `error`; only transport-level faults should
/// surface as `Err` from [`Provider::execute`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Structured result payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Domain error reported by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Token usage, model and provider attribution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResultMetadata>,
}

impl ProviderResponse {
    /// Successful response with payload.
    #[must_use]
    pub fn success(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    /// Error response.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Attach result metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: ResultMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A fallback provider declared by the plugin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FallbackProvider {
    /// Registered provider name.
    pub provider: String,
    /// Options for calls against this fallback.
    #[serde(default)]
    pub options: HashMap<String, Value>,
    /// Minimum wait before the first attempt against this fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<Duration>,
}

impl FallbackProvider {
    /// Fallback by provider name.
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            ..Self::default()
        }
    }

    /// Set a provider option.
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Set the minimum wait before using this fallback.
    #[must_use]
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }
}

/// Provider choice for one dimension: a primary plus ordered fallbacks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderSelection {
    /// Primary provider name.
    pub provider: String,
    /// Options for calls against the primary.
    #[serde(default)]
    pub options: HashMap<String, Value>,
    /// Fallbacks, attempted in declared order after the primary's retries
    /// are exhausted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallbacks: Vec<FallbackProvider>,
}

impl ProviderSelection {
    /// Select a provider by name.
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            ..Self::default()
        }
    }

    /// Set a provider option.
    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Append a fallback provider.
    #[must_use]
    pub fn with_fallback(mut self, fallback: FallbackProvider) -> Self {
        self.fallbacks.push(fallback);
        self
    }
}

/// A provider adapter.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Registry name of this provider.
    fn name(&self) -> &str;

    /// Execute one request.
    async fn execute(&self, request: &ProviderRequest) -> Result<ProviderResponse>;
}

/// Named collection of provider adapters.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

impl ProviderRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under its own name, replacing any previous entry.
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    /// Builder-style [`ProviderRegistry::register`].
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.register(provider);
        self
    }

    /// Look up a provider; missing names fail with
    /// [`Error::ProviderNotFound`].
    pub fn get(&self, name: &str) -> Result<Arc<dyn Provider>> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ProviderNotFound(name.to_string()))
    }

    /// Registered provider names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }
}
