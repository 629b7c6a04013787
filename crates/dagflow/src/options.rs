// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Caller-facing run configuration.

use crate::cost::PricingTable;
use crate::progress::ProgressUpdate;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Callback invoked with throttled progress updates.
pub type ProgressCallback = Arc<dyn Fn(&ProgressUpdate) + Send + Sync>;

/// How progress should be surfaced.
///
/// Rendering widgets live outside the engine; `Simple` installs a default
/// tracing-based reporter when no callback is supplied, the other variants
/// are carried through for callers that render their own display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressDisplay {
    /// No default reporting.
    #[default]
    None,
    /// Log progress lines through `tracing`.
    Simple,
    /// Caller-rendered single progress bar.
    Bar,
    /// Caller-rendered per-dimension display.
    Multi,
}

/// Options controlling one run.
///
/// # Example
///
/// ```rust
/// use dagflow::ProcessOptions;
/// use std::time::Duration;
///
/// let options = ProcessOptions::default()
///     .with_concurrency(8)
///     .with_max_retries(2)
///     .with_timeout(Duration::from_secs(30))
///     .with_continue_on_error(true);
/// ```
#[derive(Clone)]
pub struct ProcessOptions {
    /// Maximum number of slots in flight at once.
    pub concurrency: usize,
    /// Retries per provider after the initial attempt.
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries.
    pub retry_delay: Duration,
    /// Record failures and keep going instead of aborting the run.
    pub continue_on_error: bool,
    /// Default wall-clock timeout per provider attempt.
    pub timeout: Duration,
    /// Per-dimension timeout overrides.
    pub dimension_timeouts: HashMap<String, Duration>,
    /// Model pricing; when present a cost summary is attached to the result.
    pub pricing: Option<PricingTable>,
    /// Progress callback.
    pub on_progress: Option<ProgressCallback>,
    /// Emit a progress update every N slot completions.
    pub update_every: usize,
    /// Default progress reporting mode.
    pub progress_display: ProgressDisplay,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            concurrency: 5,
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
            continue_on_error: false,
            timeout: Duration::from_secs(60),
            dimension_timeouts: HashMap::new(),
            pricing: None,
            on_progress: None,
            update_every: 1,
            progress_display: ProgressDisplay::None,
        }
    }
}

impl std::fmt::Debug for ProcessOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessOptions")
            .field("concurrency", &self.concurrency)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .field("continue_on_error", &self.continue_on_error)
            .field("timeout", &self.timeout)
            .field("dimension_timeouts", &self.dimension_timeouts)
            .field("pricing", &self.pricing)
            .field("on_progress", &self.on_progress.as_ref().map(|_| "<callback>"))
            .field("update_every", &self.update_every)
            .field("progress_display", &self.progress_display)
            .finish()
    }
}

impl ProcessOptions {
    /// Set the bounded-queue capacity. Clamped to at least 1.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set retries per provider after the initial attempt.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base backoff delay.
    #[must_use]
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Keep going after slot failures instead of aborting the run.
    #[must_use]
    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    /// Set the default per-attempt timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the timeout for one dimension.
    #[must_use]
    pub fn with_dimension_timeout(mut self, dimension: impl Into<String>, timeout: Duration) -> Self {
        self.dimension_timeouts.insert(dimension.into(), timeout);
        self
    }

    /// Attach model pricing; enables the cost summary.
    #[must_use]
    pub fn with_pricing(mut self, pricing: PricingTable) -> Self {
        self.pricing = Some(pricing);
        self
    }

    /// Register a progress callback.
    #[must_use]
    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ProgressUpdate) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    /// Emit a progress update every `update_every` slot completions.
    /// Clamped to at least 1.
    #[must_use]
    pub fn with_update_every(mut self, update_every: usize) -> Self {
        self.update_every = update_every.max(1);
        self
    }

    /// Set the default progress reporting mode.
    #[must_use]
    pub fn with_progress_display(mut self, display: ProgressDisplay) -> Self {
        self.progress_display = display;
        self
    }

    /// Effective timeout for one dimension.
    #[must_use]
    pub fn timeout_for(&self, dimension: &str) -> Duration {
        self.dimension_timeouts
            .get(dimension)
            .copied()
            .unwrap_or(self.timeout)
    }
}
