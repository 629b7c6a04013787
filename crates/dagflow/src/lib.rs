// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! # DagFlow
//!
//! A dependency-graph execution engine for AI/LLM pipelines.
//!
//! A [`Plugin`] declares named *dimensions* (units of work) over a batch of
//! *sections* (input items), a dependency graph between them, and per-
//! dimension prompt and provider selection. The engine plans the dimensions
//! into parallel groups, fans section-scope work out under bounded
//! concurrency, retries failing providers with exponential backoff, walks
//! declared fallback chains, lets the plugin reshape the section list after
//! global dimensions, and accounts progress and cost throughout. Run state
//! is a single serializable value, so checkpointing is a byte-level concern.
//!
//! ## Architecture
//!
//! ```text
//! sections ──▶ pre-process ──▶ plan (graph/sort/group) ──▶ execute
//!                                                            │
//!                 group k: globals ─▶ transformations ─▶ section fan-out
//!                                                            │
//!              finalize (results + costs) ──▶ post-process ──▶ ProcessOutput
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use dagflow::{Engine, Plugin, ProcessOptions, ProviderRegistry};
//! use std::sync::Arc;
//!
//! let registry = ProviderRegistry::new().with_provider(Arc::new(my_provider));
//! let engine = Engine::new(Arc::new(my_plugin), registry)
//!     .with_options(ProcessOptions::default().with_concurrency(8));
//!
//! let output = engine.process(vec!["first".into(), "second".into()]).await?;
//! for section in &output.sections {
//!     println!("{}: {} results", section.section.content, section.results.len());
//! }
//! ```

pub mod checkpoint;
pub mod cost;
pub mod error;
pub mod executor;
pub mod graph;
mod hooks;
pub mod options;
pub mod plan;
pub mod plugin;
pub mod progress;
pub mod provider;
pub mod resolver;
pub mod state;
pub mod types;
pub mod util;

pub use checkpoint::{Checkpointer, FileCheckpointer, MemoryCheckpointer};
pub use cost::{CostBreakdown, CostCalculator, CostSummary, Pricing, PricingTable};
pub use error::{Error, ProviderAttempt, Result, StuckDimension};
pub use executor::Engine;
pub use graph::{DimensionGraph, GraphAnalytics};
pub use options::{ProcessOptions, ProgressCallback, ProgressDisplay};
pub use plan::ExecutionPlan;
pub use plugin::{
    CompletionContext, DimensionContext, FailureContext, FallbackContext, FallbackDirective,
    PlanContext, Plugin, ProcessStartContext, PromptContext, RetryContext, RetryDirective,
    SkipContext, SkipDecision, StartOverrides, TransformContext,
};
pub use progress::{DimensionProgress, ProgressTracker, ProgressUpdate, SlotOutcome};
pub use provider::{
    FallbackProvider, Provider, ProviderInput, ProviderRegistry, ProviderRequest,
    ProviderResponse, ProviderSelection, RequestMetadata,
};
pub use resolver::DependencyResolver;
pub use state::{ProcessState, StateManager};
pub use types::{
    DimensionDescriptor, DimensionResult, DimensionScope, ProcessOutput, ResultMetadata, Section,
    SectionOutput, TokenUsage,
};
pub use util::{count_outcomes, extract_json, OutcomeCounts};
