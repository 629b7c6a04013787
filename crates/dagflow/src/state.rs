// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Run state and its sole mutator.
//!
//! [`ProcessState`] is the unit of serialization: everything mutable about a
//! run lives here, so a serialized state is enough to inspect or resume a
//! run. [`StateManager`] wraps the state in one coarse mutex; contention is
//! low and critical sections are short, so a single lock is sufficient.
//!
//! The wire format keeps camelCase field names and encodes the per-section
//! result map as index-sorted `[index, results]` pairs, which round-trips
//! losslessly through JSON.

use crate::error::Result;
use crate::types::{DimensionResult, Section};
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Complete mutable state of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessState {
    /// Opaque run id, unique per run.
    pub id: String,
    /// Run start, wall-clock milliseconds since the epoch.
    pub start_time: i64,
    /// Opaque payload returned by the pre-process hook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Current section list; transformations and the pre-process hook may
    /// replace it.
    pub sections: Vec<Section>,
    /// Snapshot of the sections at the end of pre-process; never mutated
    /// afterwards.
    pub original_sections: Vec<Section>,
    /// Dimension name to result, for global-scope dimensions.
    pub global_results: HashMap<String, DimensionResult>,
    /// Section index to per-dimension results. Keys are exactly
    /// `0..sections.len()` at all times.
    #[serde(rename = "sectionResultsMap", with = "section_results_pairs")]
    pub section_results: HashMap<usize, HashMap<String, DimensionResult>>,
}

impl ProcessState {
    /// Fresh state over the given sections, with one empty result slot per
    /// section.
    #[must_use]
    pub fn new(sections: Vec<Section>) -> Self {
        let section_results = empty_slots(sections.len());
        Self {
            id: Uuid::new_v4().to_string(),
            start_time: Utc::now().timestamp_millis(),
            metadata: None,
            sections,
            original_sections: Vec::new(),
            global_results: HashMap::new(),
            section_results,
        }
    }

    /// Serialize to the JSON wire format.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from the JSON wire format.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn empty_slots(count: usize) -> HashMap<usize, HashMap<String, DimensionResult>> {
    (0..count).map(|index| (index, HashMap::new())).collect()
}

/// `sectionResultsMap` wire encoding: index-sorted `[index, results]` pairs.
mod section_results_pairs {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(
        map: &HashMap<usize, HashMap<String, DimensionResult>>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut pairs: Vec<(&usize, &HashMap<String, DimensionResult>)> = map.iter().collect();
        pairs.sort_by_key(|(index, _)| **index);
        serializer.collect_seq(pairs)
    }

    pub fn deserialize<'de, D>(
        deserializer: D,
    ) -> std::result::Result<HashMap<usize, HashMap<String, DimensionResult>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let pairs: Vec<(usize, HashMap<String, DimensionResult>)> =
            Vec::deserialize(deserializer)?;
        Ok(pairs.into_iter().collect())
    }
}

/// Sole authority over [`ProcessState`] mutations.
#[derive(Debug, Default)]
pub struct StateManager {
    inner: Mutex<ProcessState>,
}

impl StateManager {
    /// Manager over a fresh state.
    #[must_use]
    pub fn new(sections: Vec<Section>) -> Self {
        Self {
            inner: Mutex::new(ProcessState::new(sections)),
        }
    }

    /// Manager over a previously serialized state.
    #[must_use]
    pub fn from_state(state: ProcessState) -> Self {
        Self {
            inner: Mutex::new(state),
        }
    }

    /// Run id.
    #[must_use]
    pub fn id(&self) -> String {
        self.inner.lock().id.clone()
    }

    /// Run start, milliseconds since the epoch.
    #[must_use]
    pub fn start_time(&self) -> i64 {
        self.inner.lock().start_time
    }

    /// Pre-process metadata payload.
    #[must_use]
    pub fn metadata(&self) -> Option<Value> {
        self.inner.lock().metadata.clone()
    }

    /// Replace the metadata payload.
    pub fn set_metadata(&self, metadata: Value) {
        self.inner.lock().metadata = Some(metadata);
    }

    /// Snapshot of the current section list.
    #[must_use]
    pub fn sections(&self) -> Vec<Section> {
        self.inner.lock().sections.clone()
    }

    /// Current section count.
    #[must_use]
    pub fn section_count(&self) -> usize {
        self.inner.lock().sections.len()
    }

    /// Snapshot of the original (post-pre-process) section list.
    #[must_use]
    pub fn original_sections(&self) -> Vec<Section> {
        self.inner.lock().original_sections.clone()
    }

    /// Replace the section list and re-seed one empty result slot per new
    /// section. The slot-count invariant (`section_results.len() ==
    /// sections.len()`) holds on exit.
    pub fn update_sections(&self, sections: Vec<Section>) {
        let mut state = self.inner.lock();
        state.section_results = empty_slots(sections.len());
        state.sections = sections;
    }

    /// Snapshot the current sections as the run's original sections. First
    /// call wins; later calls are no-ops.
    pub fn snapshot_original_sections(&self) {
        let mut state = self.inner.lock();
        if state.original_sections.is_empty() {
            state.original_sections = state.sections.clone();
        }
    }

    /// Record a global dimension result.
    pub fn insert_global_result(&self, dimension: impl Into<String>, result: DimensionResult) {
        self.inner.lock().global_results.insert(dimension.into(), result);
    }

    /// Record one section slot result.
    pub fn insert_section_result(
        &self,
        index: usize,
        dimension: impl Into<String>,
        result: DimensionResult,
    ) {
        self.inner
            .lock()
            .section_results
            .entry(index)
            .or_default()
            .insert(dimension.into(), result);
    }

    /// One global result, if recorded.
    #[must_use]
    pub fn global_result(&self, dimension: &str) -> Option<DimensionResult> {
        self.inner.lock().global_results.get(dimension).cloned()
    }

    /// Snapshot of the global result map.
    #[must_use]
    pub fn global_results(&self) -> HashMap<String, DimensionResult> {
        self.inner.lock().global_results.clone()
    }

    /// One section slot result, if recorded.
    #[must_use]
    pub fn section_result(&self, index: usize, dimension: &str) -> Option<DimensionResult> {
        self.inner
            .lock()
            .section_results
            .get(&index)
            .and_then(|results| results.get(dimension))
            .cloned()
    }

    /// Snapshot of the per-section result map.
    #[must_use]
    pub fn section_results(&self) -> HashMap<usize, HashMap<String, DimensionResult>> {
        self.inner.lock().section_results.clone()
    }

    /// Full state snapshot (checkpointing, failure recovery).
    #[must_use]
    pub fn snapshot(&self) -> ProcessState {
        self.inner.lock().clone()
    }
}
