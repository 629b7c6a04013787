//! Mock provider for engine and plugin tests

use async_trait::async_trait;
use dagflow::{
    Provider, ProviderInput, ProviderRequest, ProviderResponse, Result, ResultMetadata,
    TokenUsage,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Handler function type for dynamic mock responses
pub type MockHandler = Arc<dyn Fn(&ProviderRequest) -> ProviderResponse + Send + Sync>;

/// One scripted call outcome.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Respond with this payload.
    Success(Value),
    /// Respond with a domain error.
    Error(String),
}

impl MockOutcome {
    /// Successful outcome with payload.
    pub fn success(data: Value) -> Self {
        MockOutcome::Success(data)
    }

    /// Error outcome.
    pub fn error(message: impl Into<String>) -> Self {
        MockOutcome::Error(message.into())
    }
}

/// Record of one call the mock received.
#[derive(Debug, Clone)]
pub struct ProviderCall {
    /// Dimension named in the request.
    pub dimension: String,
    /// Whether the request was global-scope.
    pub is_global: bool,
    /// Prompt text of the request.
    pub input: String,
    /// When the call started.
    pub started_at: Instant,
    /// When the call finished.
    pub finished_at: Instant,
}

impl ProviderCall {
    /// Whether this call's in-flight window overlaps another's.
    pub fn overlaps(&self, other: &ProviderCall) -> bool {
        self.started_at < other.finished_at && other.started_at < self.finished_at
    }
}

/// A configurable mock provider
///
/// Without a handler or script it answers every call with a fixed success
/// payload and token metadata. A script is consumed one outcome per call and
/// falls back to the default once drained.
///
/// # Example
///
/// ```rust,ignore
/// use dagflow_testing::{MockOutcome, MockProvider};
/// use serde_json::json;
///
/// let provider = MockProvider::new("primary")
///     .with_latency(std::time::Duration::from_millis(20))
///     .with_script([
///         MockOutcome::error("overloaded"),
///         MockOutcome::success(json!({"label": "ok"})),
///     ]);
/// ```
#[derive(Clone)]
pub struct MockProvider {
    name: String,
    model: String,
    tokens: TokenUsage,
    latency: Option<Duration>,
    default_outcome: MockOutcome,
    script: Arc<Mutex<VecDeque<MockOutcome>>>,
    handler: Option<MockHandler>,
    calls: Arc<Mutex<Vec<ProviderCall>>>,
}

impl std::fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockProvider")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("call_count", &self.call_count())
            .finish()
    }
}

impl MockProvider {
    /// Create a mock with the given registry name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: "mock-model".to_string(),
            tokens: TokenUsage::new(10, 5),
            latency: None,
            default_outcome: MockOutcome::Success(json!({"ok": true})),
            script: Arc::new(Mutex::new(VecDeque::new())),
            handler: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock that fails every call with the given message.
    pub fn failing(name: impl Into<String>, message: impl Into<String>) -> Self {
        let mut provider = Self::new(name);
        provider.default_outcome = MockOutcome::Error(message.into());
        provider
    }

    /// Set the model name reported in result metadata.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the token usage reported per successful call.
    #[must_use]
    pub fn with_tokens(mut self, input: u64, output: u64) -> Self {
        self.tokens = TokenUsage::new(input, output);
        self
    }

    /// Inject latency per call; useful for observing overlap.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Set the default success payload.
    #[must_use]
    pub fn with_response(mut self, data: Value) -> Self {
        self.default_outcome = MockOutcome::Success(data);
        self
    }

    /// Queue per-call outcomes, consumed in order before the default kicks
    /// in.
    #[must_use]
    pub fn with_script(self, outcomes: impl IntoIterator<Item = MockOutcome>) -> Self {
        self.script.lock().extend(outcomes);
        self
    }

    /// Set a handler for fully dynamic responses. Overrides script and
    /// default.
    #[must_use]
    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ProviderRequest) -> ProviderResponse + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().clone()
    }

    /// Calls received for one dimension.
    pub fn calls_for(&self, dimension: &str) -> Vec<ProviderCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.dimension == dimension)
            .cloned()
            .collect()
    }

    /// Whether any two calls for `a` and `b` were in flight simultaneously.
    pub fn overlapped(&self, a: &str, b: &str) -> bool {
        let calls = self.calls.lock();
        calls
            .iter()
            .filter(|call| call.dimension == a)
            .any(|left| {
                calls
                    .iter()
                    .filter(|call| call.dimension == b)
                    .any(|right| left.overlaps(right))
            })
    }

    /// Forget recorded calls.
    pub fn reset(&self) {
        self.calls.lock().clear();
    }

    fn metadata(&self) -> ResultMetadata {
        ResultMetadata {
            tokens: Some(self.tokens),
            model: Some(self.model.clone()),
            provider: Some(self.name.clone()),
            ..ResultMetadata::default()
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, request: &ProviderRequest) -> Result<ProviderResponse> {
        let started_at = Instant::now();
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let response = if let Some(handler) = &self.handler {
            handler(request)
        } else {
            let outcome = self
                .script
                .lock()
                .pop_front()
                .unwrap_or_else(|| self.default_outcome.clone());
            match outcome {
                MockOutcome::Success(data) => {
                    ProviderResponse::success(data).with_metadata(self.metadata())
                }
                MockOutcome::Error(message) => ProviderResponse::failure(message),
            }
        };

        let input = match &request.input {
            ProviderInput::Text(text) => text.clone(),
            ProviderInput::Batch(batch) => batch.join("\n"),
        };
        self.calls.lock().push(ProviderCall {
            dimension: request.dimension.clone(),
            is_global: request.is_global,
            input,
            started_at,
            finished_at: Instant::now(),
        });

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn request(dimension: &str) -> ProviderRequest {
        ProviderRequest {
            input: "prompt".into(),
            options: HashMap::new(),
            dimension: dimension.to_string(),
            is_global: false,
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_default_response_carries_metadata() {
        let provider = MockProvider::new("mock");
        let response = provider.execute(&request("dim")).await.unwrap();
        assert_eq!(response.data.unwrap()["ok"], true);
        let metadata = response.metadata.unwrap();
        assert_eq!(metadata.provider.as_deref(), Some("mock"));
        assert_eq!(metadata.tokens.unwrap().total, 15);
    }

    #[tokio::test]
    async fn test_script_consumed_in_order_then_default() {
        let provider = MockProvider::new("mock").with_script([
            MockOutcome::error("first"),
            MockOutcome::success(json!({"n": 2})),
        ]);
        assert_eq!(
            provider.execute(&request("d")).await.unwrap().error.as_deref(),
            Some("first")
        );
        assert_eq!(
            provider.execute(&request("d")).await.unwrap().data.unwrap()["n"],
            2
        );
        assert!(provider.execute(&request("d")).await.unwrap().error.is_none());
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_failing_provider_always_errors() {
        let provider = MockProvider::failing("bad", "down");
        for _ in 0..3 {
            let response = provider.execute(&request("d")).await.unwrap();
            assert_eq!(response.error.as_deref(), Some("down"));
        }
    }

    #[tokio::test]
    async fn test_handler_overrides_script() {
        let provider = MockProvider::new("mock")
            .with_script([MockOutcome::error("ignored")])
            .with_handler(|request| {
                ProviderResponse::success(json!({"echo": request.dimension}))
            });
        let response = provider.execute(&request("custom")).await.unwrap();
        assert_eq!(response.data.unwrap()["echo"], "custom");
    }

    #[tokio::test]
    async fn test_call_history_filters_by_dimension() {
        let provider = MockProvider::new("mock");
        provider.execute(&request("a")).await.unwrap();
        provider.execute(&request("b")).await.unwrap();
        provider.execute(&request("a")).await.unwrap();
        assert_eq!(provider.calls_for("a").len(), 2);
        assert_eq!(provider.calls_for("b").len(), 1);
        provider.reset();
        assert_eq!(provider.call_count(), 0);
    }
}
