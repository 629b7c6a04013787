// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Error types for the DagFlow engine
//!
//! Every failure the engine can surface is a distinct variant of [`Error`].
//! Provider-level failures are caught inside the provider runner and fed into
//! the retry/fallback state machine; they only escape as
//! [`Error::AllProvidersFailed`] once the whole chain is exhausted.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A dimension that could not be scheduled, with the dependency names that
/// were never satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StuckDimension {
    /// The dimension that could not be placed into any execution group.
    pub dimension: String,
    /// Declared dependencies that were not met by any earlier group.
    pub missing: Vec<String>,
}

impl std::fmt::Display for StuckDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (missing: {})", self.dimension, self.missing.join(", "))
    }
}

/// One failed provider attempt, recorded in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAttempt {
    /// Provider name as requested by the plugin.
    pub provider: String,
    /// The error produced by the final attempt against this provider.
    pub error: String,
}

/// Error type for engine operations
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// The section list was empty after the pre-process phase.
    #[error("no sections to process")]
    NoSections,

    /// The dependency graph contains a cycle. Carries one concrete cycle.
    #[error("circular dependency detected: {}", .cycle.join(" -> "))]
    CircularDependency {
        /// Dimension names forming the cycle, in edge order.
        cycle: Vec<String>,
    },

    /// Greedy grouping stalled: the remaining dimensions all have unmet
    /// dependencies.
    #[error("unable to build execution groups; stuck dimensions: {}", .stuck.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    ExecutionGrouping {
        /// Dimensions that could not be scheduled, with their unmet deps.
        stuck: Vec<StuckDimension>,
    },

    /// The plugin selected a provider that is not in the registry.
    #[error("provider '{0}' is not registered")]
    ProviderNotFound(String),

    /// A provider returned an error response or failed in transport.
    #[error("provider '{provider}' failed: {message}")]
    Provider {
        /// Provider name.
        provider: String,
        /// Error detail from the response or the thrown failure.
        message: String,
    },

    /// A slot exceeded its wall-clock timeout.
    #[error("dimension '{dimension}' timed out after {timeout_ms}ms")]
    Timeout {
        /// The dimension whose slot timed out.
        dimension: String,
        /// The configured timeout in milliseconds.
        timeout_ms: u64,
    },

    /// Primary provider and all declared fallbacks are exhausted.
    #[error("all providers failed for dimension '{dimension}' ({} attempted)", .attempts.len())]
    AllProvidersFailed {
        /// The dimension being executed.
        dimension: String,
        /// Ordered chain of attempted providers and their final errors.
        attempts: Vec<ProviderAttempt>,
    },

    /// A plugin lifecycle hook returned an error.
    #[error("hook '{hook}' failed: {message}")]
    Hook {
        /// Hook name, e.g. `create_prompt` or `handle_retry`.
        hook: String,
        /// Error detail.
        message: String,
    },

    /// State (de)serialization failed.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Checkpoint storage failed.
    #[error("checkpoint i/o failed: {0}")]
    CheckpointIo(#[from] std::io::Error),
}

impl Error {
    /// Name a plugin hook failure. Errors that are already hook failures are
    /// passed through so the innermost hook name wins.
    pub(crate) fn in_hook(self, hook: &str) -> Self {
        match self {
            Error::Hook { .. } => self,
            other => Error::Hook {
                hook: hook.to_string(),
                message: other.to_string(),
            },
        }
    }

    /// Plain-message constructor used by plugins and hooks.
    pub fn message(message: impl Into<String>) -> Self {
        Error::Hook {
            hook: "plugin".to_string(),
            message: message.into(),
        }
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_dependency_display() {
        let err = Error::CircularDependency {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "circular dependency detected: a -> b -> a");
    }

    #[test]
    fn test_execution_grouping_display() {
        let err = Error::ExecutionGrouping {
            stuck: vec![StuckDimension {
                dimension: "summary".into(),
                missing: vec!["sentiment".into(), "topics".into()],
            }],
        };
        assert_eq!(
            err.to_string(),
            "unable to build execution groups; stuck dimensions: summary (missing: sentiment, topics)"
        );
    }

    #[test]
    fn test_all_providers_failed_display() {
        let err = Error::AllProvidersFailed {
            dimension: "classify".into(),
            attempts: vec![
                ProviderAttempt {
                    provider: "primary".into(),
                    error: "boom".into(),
                },
                ProviderAttempt {
                    provider: "backup".into(),
                    error: "still boom".into(),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "all providers failed for dimension 'classify' (2 attempted)"
        );
    }

    #[test]
    fn test_timeout_display() {
        let err = Error::Timeout {
            dimension: "analyze".into(),
            timeout_ms: 1500,
        };
        assert_eq!(err.to_string(), "dimension 'analyze' timed out after 1500ms");
    }

    #[test]
    fn test_in_hook_keeps_innermost_name() {
        let inner = Error::message("bad prompt").in_hook("create_prompt");
        let outer = inner.in_hook("before_provider_execute");
        match outer {
            Error::Hook { hook, .. } => assert_eq!(hook, "plugin"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_provider_not_found_display() {
        let err = Error::ProviderNotFound("openai".into());
        assert_eq!(err.to_string(), "provider 'openai' is not registered");
    }
}
