// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Hook ordering within one slot execution.

use super::{batch, fn_provider, ok_provider, registry_of};
use crate::error::Result;
use crate::executor::Engine;
use crate::options::ProcessOptions;
use crate::plugin::{
    DimensionContext, FallbackContext, FallbackDirective, Plugin, PromptContext, RetryContext,
    RetryDirective,
};
use crate::provider::{FallbackProvider, ProviderResponse, ProviderSelection};
use crate::types::{DimensionDescriptor, DimensionResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

type EventLog = Arc<Mutex<Vec<String>>>;

struct TracingPlugin {
    events: EventLog,
}

impl TracingPlugin {
    fn log(&self, event: &str) {
        self.events.lock().push(event.to_string());
    }
}

#[async_trait]
impl Plugin for TracingPlugin {
    fn dimensions(&self) -> Vec<DimensionDescriptor> {
        vec![DimensionDescriptor::section("traced")]
    }

    async fn create_prompt(&self, _ctx: &PromptContext<'_>) -> Result<String> {
        self.log("create_prompt");
        Ok("prompt".to_string())
    }

    fn select_provider(&self, _dimension: &str) -> ProviderSelection {
        ProviderSelection::new("ok")
    }

    async fn before_dimension_execute(&self, _ctx: &DimensionContext) -> Result<()> {
        self.log("before_dimension_execute");
        Ok(())
    }

    async fn before_provider_execute(
        &self,
        _ctx: &DimensionContext,
        request: crate::provider::ProviderRequest,
    ) -> Result<crate::provider::ProviderRequest> {
        self.log("before_provider_execute");
        Ok(request)
    }

    async fn after_provider_execute(
        &self,
        _ctx: &DimensionContext,
        response: crate::provider::ProviderResponse,
    ) -> Result<crate::provider::ProviderResponse> {
        self.log("after_provider_execute");
        Ok(response)
    }

    async fn after_dimension_execute(
        &self,
        _ctx: &DimensionContext,
        _result: &DimensionResult,
    ) -> Result<()> {
        self.log("after_dimension_execute");
        Ok(())
    }
}

#[tokio::test]
async fn test_hooks_fire_in_slot_order() {
    let events: EventLog = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let provider_events: EventLog = Arc::clone(&events);
    let provider = fn_provider("ok", move |_| {
        provider_events.lock().push("provider_call".to_string());
        Ok(ProviderResponse::success(json!({"ok": true})))
    });
    let engine = Engine::new(
        Arc::new(TracingPlugin { events: sink }),
        registry_of(vec![provider]),
    );

    engine.process(batch(1)).await.unwrap();

    assert_eq!(
        events.lock().as_slice(),
        [
            "before_dimension_execute",
            "create_prompt",
            "before_provider_execute",
            "provider_call",
            "after_provider_execute",
            "after_dimension_execute",
        ]
    );
}

struct RequestTuningPlugin;

#[async_trait]
impl Plugin for RequestTuningPlugin {
    fn dimensions(&self) -> Vec<DimensionDescriptor> {
        vec![DimensionDescriptor::section("tuned")]
    }

    async fn create_prompt(&self, _ctx: &PromptContext<'_>) -> Result<String> {
        Ok("prompt".to_string())
    }

    fn select_provider(&self, _dimension: &str) -> ProviderSelection {
        ProviderSelection::new("flaky").with_option("temperature", json!(1.0))
    }

    async fn handle_retry(&self, ctx: &RetryContext<'_>) -> Result<RetryDirective> {
        // Cool the request down for the next attempt.
        let mut request = ctx.request.clone();
        request.options.insert("temperature".to_string(), json!(0.0));
        Ok(RetryDirective::retry_after(Duration::from_millis(1)).with_request(request))
    }
}

#[tokio::test]
async fn test_retry_uses_modified_request() {
    let seen: Arc<Mutex<Vec<serde_json::Value>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let calls = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&calls);
    let provider = fn_provider("flaky", move |request| {
        sink.lock().push(request.options["temperature"].clone());
        let mut count = counter.lock();
        *count += 1;
        if *count == 1 {
            Ok(ProviderResponse::failure("first attempt fails"))
        } else {
            Ok(ProviderResponse::success(json!({"ok": true})))
        }
    });
    let engine = Engine::new(Arc::new(RequestTuningPlugin), registry_of(vec![provider]))
        .with_options(ProcessOptions::default().with_max_retries(2));

    let output = engine.process(batch(1)).await.unwrap();

    assert!(output.sections[0].results["tuned"].is_success());
    let temperatures = seen.lock().clone();
    assert_eq!(temperatures, [json!(1.0), json!(0.0)]);
}

struct FallbackWatchingPlugin {
    seen: Arc<Mutex<Vec<(String, String)>>>,
}

#[async_trait]
impl Plugin for FallbackWatchingPlugin {
    fn dimensions(&self) -> Vec<DimensionDescriptor> {
        vec![DimensionDescriptor::section("watched")]
    }

    async fn create_prompt(&self, _ctx: &PromptContext<'_>) -> Result<String> {
        Ok("prompt".to_string())
    }

    fn select_provider(&self, _dimension: &str) -> ProviderSelection {
        ProviderSelection::new("down").with_fallback(FallbackProvider::new("ok"))
    }

    async fn handle_provider_fallback(
        &self,
        ctx: &FallbackContext<'_>,
    ) -> Result<FallbackDirective> {
        self.seen
            .lock()
            .push((ctx.failed_provider.to_string(), ctx.next_provider.to_string()));
        Ok(FallbackDirective::proceed())
    }
}

#[tokio::test]
async fn test_fallback_hook_sees_provider_transition() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let failing = fn_provider("down", |_| Ok(ProviderResponse::failure("down")));
    let engine = Engine::new(
        Arc::new(FallbackWatchingPlugin { seen: Arc::clone(&seen) }),
        registry_of(vec![failing, ok_provider("ok")]),
    )
    .with_options(
        ProcessOptions::default()
            .with_max_retries(0)
            .with_retry_delay(Duration::from_millis(1)),
    );

    let output = engine.process(batch(1)).await.unwrap();

    assert!(output.sections[0].results["watched"].is_success());
    assert_eq!(
        seen.lock().as_slice(),
        [("down".to_string(), "ok".to_string())]
    );
}
