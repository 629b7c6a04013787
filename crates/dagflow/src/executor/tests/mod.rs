// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Engine-level tests: hook ordering, failure recovery, and transformation
//! edge semantics. Scenario-style coverage lives in `tests/`.

#![allow(clippy::unwrap_used)]

mod ordering_tests;
mod transformation_tests;

use crate::error::Result;
use crate::provider::{Provider, ProviderRegistry, ProviderRequest, ProviderResponse};
use crate::types::{ResultMetadata, Section, TokenUsage};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

/// Provider driven by a closure; the default answers every call with a fixed
/// success payload and token metadata.
struct FnProvider {
    name: String,
    #[allow(clippy::type_complexity)]
    handler: Box<dyn Fn(&ProviderRequest) -> Result<ProviderResponse> + Send + Sync>,
}

#[async_trait]
impl Provider for FnProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, request: &ProviderRequest) -> Result<ProviderResponse> {
        (self.handler)(request)
    }
}

fn fn_provider<F>(name: &str, handler: F) -> Arc<FnProvider>
where
    F: Fn(&ProviderRequest) -> Result<ProviderResponse> + Send + Sync + 'static,
{
    Arc::new(FnProvider {
        name: name.to_string(),
        handler: Box::new(handler),
    })
}

fn ok_provider(name: &str) -> Arc<FnProvider> {
    let provider = name.to_string();
    fn_provider(name, move |_| {
        Ok(ProviderResponse::success(json!({"ok": true})).with_metadata(ResultMetadata {
            tokens: Some(TokenUsage::new(10, 5)),
            model: Some("unit-model".to_string()),
            provider: Some(provider.clone()),
            ..ResultMetadata::default()
        }))
    })
}

fn registry_of(providers: Vec<Arc<FnProvider>>) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for provider in providers {
        registry.register(provider);
    }
    registry
}

fn batch(count: usize) -> Vec<Section> {
    (0..count).map(|i| Section::new(format!("unit-{i}"))).collect()
}
