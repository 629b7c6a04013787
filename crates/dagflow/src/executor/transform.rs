// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Section transformation after global dimensions.
//!
//! After each global dimension completes, the plugin may replace the section
//! list. On a replacement the per-section result map is reset to empty slots
//! and progress re-baselines; the first time the section count changes, the
//! pre-transform sections and results are preserved so the final cost
//! summary still covers the work done against the old batch.

use crate::error::Result;
use crate::hooks::HookRunner;
use crate::plugin::TransformContext;
use crate::progress::ProgressTracker;
use crate::state::StateManager;
use crate::types::{DimensionResult, Section};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::info;

/// Pre-transform snapshot kept for cost aggregation.
#[derive(Debug, Clone)]
pub(crate) struct PreservedResults {
    pub sections: Vec<Section>,
    pub section_results: HashMap<usize, HashMap<String, DimensionResult>>,
}

#[derive(Debug, Default)]
pub(crate) struct TransformationManager {
    preserved: Mutex<Option<PreservedResults>>,
}

impl TransformationManager {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Consult the plugin after a completed global dimension and apply any
    /// reshaping. Returns whether the section list changed.
    pub(crate) async fn apply_after_global(
        &self,
        hooks: &HookRunner,
        state: &StateManager,
        tracker: &ProgressTracker,
        dimension: &str,
        result: &DimensionResult,
    ) -> Result<bool> {
        let current = state.sections();
        let replacement = hooks
            .transform_sections(&TransformContext {
                dimension,
                sections: &current,
                result,
            })
            .await?;

        let Some(next) = replacement else {
            return Ok(false);
        };
        if next == current {
            return Ok(false);
        }

        if next.len() != current.len() {
            let mut preserved = self.preserved.lock();
            if preserved.is_none() {
                *preserved = Some(PreservedResults {
                    sections: current.clone(),
                    section_results: state.section_results(),
                });
            }
        }

        info!(
            dimension = %dimension,
            from = current.len(),
            to = next.len(),
            "transformation reshaped sections"
        );
        let new_count = next.len();
        state.update_sections(next);
        tracker.rebaseline(new_count);
        Ok(true)
    }

    /// The first pre-transform snapshot, if any transformation changed the
    /// section count.
    pub(crate) fn preserved(&self) -> Option<PreservedResults> {
        self.preserved.lock().clone()
    }
}
