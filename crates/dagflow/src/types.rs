// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Core data model: sections, dimensions, and their results.
//!
//! A [`Section`] is one item of the input batch. A dimension is a named unit
//! of work declared by the plugin; its [`DimensionScope`] decides whether it
//! runs once per section or once per run. Every slot execution produces a
//! [`DimensionResult`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

// ============================================================================
// Sections
// ============================================================================

/// One input item in the batch. Identity is positional: a section is addressed
/// by its index in the current section list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// String payload handed to prompts.
    pub content: String,
    /// Open key/value metadata travelling with the section.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl Section {
    /// Create a section from its content.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: HashMap::new(),
        }
    }

    /// Attach a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

impl From<&str> for Section {
    fn from(content: &str) -> Self {
        Section::new(content)
    }
}

impl From<String> for Section {
    fn from(content: String) -> Self {
        Section::new(content)
    }
}

// ============================================================================
// Dimensions
// ============================================================================

/// Fan-out scope of a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionScope {
    /// Runs once per section; results live in the per-section map.
    Section,
    /// Runs once per execution; result lives in the global map.
    Global,
}

impl Default for DimensionScope {
    fn default() -> Self {
        DimensionScope::Section
    }
}

/// A declared dimension: a name plus its scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionDescriptor {
    /// Unique dimension name.
    pub name: String,
    /// Fan-out scope; bare names default to section scope.
    #[serde(default)]
    pub scope: DimensionScope,
}

impl DimensionDescriptor {
    /// Declare a section-scope dimension.
    pub fn section(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: DimensionScope::Section,
        }
    }

    /// Declare a global-scope dimension.
    pub fn global(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: DimensionScope::Global,
        }
    }

    /// True when the dimension runs once per execution.
    #[must_use]
    pub fn is_global(&self) -> bool {
        self.scope == DimensionScope::Global
    }
}

impl From<&str> for DimensionDescriptor {
    fn from(name: &str) -> Self {
        DimensionDescriptor::section(name)
    }
}

// ============================================================================
// Results
// ============================================================================

/// Token counts reported by a provider call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Input (prompt) tokens.
    pub input: u64,
    /// Output (completion) tokens.
    pub output: u64,
    /// Total tokens as reported by the provider.
    pub total: u64,
}

impl TokenUsage {
    /// Create a usage record; `total` is derived.
    #[must_use]
    pub fn new(input: u64, output: u64) -> Self {
        Self {
            input,
            output,
            total: input + output,
        }
    }
}

/// Metadata attached to a [`DimensionResult`].
///
/// The typed fields cover what the engine itself reads (token accounting,
/// skip and fallback markers); everything else a provider or hook attaches
/// rides along in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    /// Token usage, present when a provider call occurred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenUsage>,
    /// Model identifier used for the call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Provider that produced the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Set when the slot was skipped instead of executed.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    /// Set when the result came from a fallback path
    /// (`handle_dimension_failure`).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
    /// Open extension map for plugin- or provider-specific metadata.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Outcome of one slot execution.
///
/// Exactly one of `data` or `error` is normally populated; a skip populates
/// neither but sets `metadata.skipped`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionResult {
    /// Structured payload produced on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Failure message when the slot failed without recovery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Provenance and accounting metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResultMetadata>,
}

impl DimensionResult {
    /// A successful result with payload and metadata.
    #[must_use]
    pub fn success(data: Value, metadata: ResultMetadata) -> Self {
        Self {
            data: Some(data),
            error: None,
            metadata: Some(metadata),
        }
    }

    /// A failed result carrying an error message.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            data: None,
            error: Some(error.into()),
            metadata: None,
        }
    }

    /// A skipped slot: no data, no error, `metadata.skipped = true`.
    #[must_use]
    pub fn skipped() -> Self {
        Self {
            data: None,
            error: None,
            metadata: Some(ResultMetadata {
                skipped: true,
                ..ResultMetadata::default()
            }),
        }
    }

    /// True when the slot was skipped.
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.metadata.as_ref().is_some_and(|m| m.skipped)
    }

    /// True when the slot failed.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// True when the slot produced a payload.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.data.is_some() && self.error.is_none()
    }
}

// ============================================================================
// Caller-facing output
// ============================================================================

/// One section of the final batch, paired with its dimension results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionOutput {
    /// The section as it stood at the end of the run.
    pub section: Section,
    /// Dimension name to result, for the slots executed against this section.
    pub results: HashMap<String, DimensionResult>,
}

/// Final result of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessOutput {
    /// Per-section outcomes for the final (possibly transformed) batch.
    pub sections: Vec<SectionOutput>,
    /// Global dimension outcomes.
    pub global_results: HashMap<String, DimensionResult>,
    /// The section list as it stood at the end of the run.
    pub transformed_sections: Vec<Section>,
    /// Cost summary, present when pricing was configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub costs: Option<crate::cost::CostSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_section_from_str() {
        let section: Section = "hello".into();
        assert_eq!(section.content, "hello");
        assert!(section.metadata.is_empty());
    }

    #[test]
    fn test_descriptor_default_scope_is_section() {
        let descriptor: DimensionDescriptor = "sentiment".into();
        assert_eq!(descriptor.scope, DimensionScope::Section);
        assert!(!descriptor.is_global());
    }

    #[test]
    fn test_descriptor_deserializes_bare_scope() {
        let descriptor: DimensionDescriptor =
            serde_json::from_value(json!({"name": "overall"})).unwrap();
        assert_eq!(descriptor.scope, DimensionScope::Section);
    }

    #[test]
    fn test_token_usage_total_derived() {
        let usage = TokenUsage::new(120, 30);
        assert_eq!(usage.total, 150);
    }

    #[test]
    fn test_skipped_result_shape() {
        let result = DimensionResult::skipped();
        assert!(result.is_skipped());
        assert!(!result.is_error());
        assert!(!result.is_success());
        assert!(result.data.is_none());
        assert!(result.error.is_none());
    }

    #[test]
    fn test_skip_flag_survives_json() {
        let result = DimensionResult::skipped();
        let round: DimensionResult =
            serde_json::from_str(&serde_json::to_string(&result).unwrap()).unwrap();
        assert!(round.is_skipped());
    }

    #[test]
    fn test_metadata_extra_flattens() {
        let metadata = ResultMetadata {
            model: Some("gpt-4o-mini".into()),
            extra: HashMap::from([("cached".to_string(), json!(true))]),
            ..ResultMetadata::default()
        };
        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["model"], "gpt-4o-mini");
        assert_eq!(value["cached"], true);
        assert!(value.get("skipped").is_none());
    }

    #[test]
    fn test_success_result_shape() {
        let result = DimensionResult::success(json!({"ok": true}), ResultMetadata::default());
        assert!(result.is_success());
        assert!(!result.is_error());
    }
}
