// Allow unwrap in testing utilities - test code should panic on errors
#![allow(clippy::unwrap_used)]

//! # DagFlow Testing Utilities
//!
//! This crate provides testing utilities for DagFlow plugins and engines,
//! including:
//!
//! - **MockProvider**: a scriptable provider with call history, latency
//!   injection and per-call outcome sequences
//! - **StaticPlugin**: a declarative plugin for wiring dimensions,
//!   dependencies and provider selections without boilerplate
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dagflow_testing::{MockProvider, StaticPlugin};
//! use serde_json::json;
//!
//! // A provider that fails twice, then succeeds.
//! let provider = MockProvider::new("flaky")
//!     .with_script([
//!         MockOutcome::error("rate limited"),
//!         MockOutcome::error("rate limited"),
//!         MockOutcome::success(json!({"ok": true})),
//!     ]);
//!
//! // Three chained dimensions against that provider.
//! let plugin = StaticPlugin::new("flaky")
//!     .with_section_dimension("extract")
//!     .with_section_dimension("classify")
//!     .with_dependency("classify", ["extract"]);
//! ```

mod mock_provider;
mod static_plugin;

pub use mock_provider::{MockOutcome, MockProvider, ProviderCall};
pub use static_plugin::StaticPlugin;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{MockOutcome, MockProvider, ProviderCall, StaticPlugin};
}
