// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Progress accounting and throttled emission.
//!
//! The tracker keeps per-dimension and aggregate counters, extrapolates cost
//! and ETA once data exists, and re-baselines totals when a transformation
//! changes the section count. Counter updates happen under one mutex; the
//! user callback is invoked under a separate emission mutex, so emissions
//! are serialized and each snapshot is taken inside its emission slot
//! (callbacks observe non-decreasing completion counts).

use crate::options::ProgressCallback;
use crate::types::DimensionScope;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::info;

/// Floor between two emissions when `update_every` alone would emit faster.
const MIN_EMIT_INTERVAL: Duration = Duration::from_millis(100);

/// Terminal outcome of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotOutcome {
    /// Slot produced a payload.
    Succeeded,
    /// Slot failed (recorded or fatal).
    Failed,
    /// Slot was skipped.
    Skipped,
}

/// Progress counters for one dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DimensionProgress {
    /// Slots this dimension will run.
    pub total: usize,
    /// Finished slots (success, failure or skip).
    pub completed: usize,
    /// Failed slots.
    pub failed: usize,
    /// Skipped slots.
    pub skipped: usize,
    /// Accumulated cost of completed slots.
    pub cost: f64,
    /// Extrapolated total cost: `cost * total / completed`.
    pub estimated_cost: f64,
    /// Extrapolated remaining seconds.
    pub eta_seconds: f64,
    /// Completion percentage.
    pub percent: f64,
}

/// One progress snapshot, as handed to the callback.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProgressUpdate {
    /// Total slots across all dimensions.
    pub total: usize,
    /// Finished slots across all dimensions.
    pub completed: usize,
    /// Failed slots across all dimensions.
    pub failed: usize,
    /// Skipped slots across all dimensions.
    pub skipped: usize,
    /// Aggregate completion percentage.
    pub percent: f64,
    /// Accumulated cost so far.
    pub cost: f64,
    /// Extrapolated total cost.
    pub estimated_cost: f64,
    /// Extrapolated remaining seconds.
    pub eta_seconds: f64,
    /// Per-dimension counters.
    pub dimensions: HashMap<String, DimensionProgress>,
}

#[derive(Debug)]
struct DimensionState {
    scope: DimensionScope,
    total: usize,
    completed: usize,
    failed: usize,
    skipped: usize,
    cost: f64,
}

impl DimensionState {
    fn started(&self) -> bool {
        self.completed > 0
    }
}

#[derive(Debug)]
struct Inner {
    started_at: Instant,
    dimensions: HashMap<String, DimensionState>,
    since_last_emit: usize,
    last_emit: Option<Instant>,
}

/// Tracks slot completion across a run and emits throttled updates.
pub struct ProgressTracker {
    inner: Mutex<Inner>,
    emitter: Mutex<()>,
    callback: Option<ProgressCallback>,
    log_progress: bool,
    update_every: usize,
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("update_every", &self.update_every)
            .field("log_progress", &self.log_progress)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

impl ProgressTracker {
    /// Tracker over the planned dimensions.
    ///
    /// `dimensions` carries `(name, scope)` pairs; totals seed as one slot
    /// per global dimension and `section_count` per section dimension.
    /// `log_progress` routes updates through `tracing` when no callback is
    /// registered.
    #[must_use]
    pub fn new(
        dimensions: &[(String, DimensionScope)],
        section_count: usize,
        callback: Option<ProgressCallback>,
        update_every: usize,
        log_progress: bool,
    ) -> Self {
        let states = dimensions
            .iter()
            .map(|(name, scope)| {
                (
                    name.clone(),
                    DimensionState {
                        scope: *scope,
                        total: match scope {
                            DimensionScope::Global => 1,
                            DimensionScope::Section => section_count,
                        },
                        completed: 0,
                        failed: 0,
                        skipped: 0,
                        cost: 0.0,
                    },
                )
            })
            .collect();

        Self {
            inner: Mutex::new(Inner {
                started_at: Instant::now(),
                dimensions: states,
                since_last_emit: 0,
                last_emit: None,
            }),
            emitter: Mutex::new(()),
            callback,
            log_progress,
            update_every: update_every.max(1),
        }
    }

    /// Record one finished slot and emit if the throttle allows.
    pub fn record(&self, dimension: &str, outcome: SlotOutcome, cost: f64) {
        let should_emit = {
            let mut inner = self.inner.lock();
            if let Some(state) = inner.dimensions.get_mut(dimension) {
                state.completed += 1;
                state.cost += cost;
                match outcome {
                    SlotOutcome::Failed => state.failed += 1,
                    SlotOutcome::Skipped => state.skipped += 1,
                    SlotOutcome::Succeeded => {}
                }
            }
            inner.since_last_emit += 1;
            let due = inner.since_last_emit >= self.update_every;
            let spaced = inner
                .last_emit
                .map_or(true, |at| at.elapsed() >= MIN_EMIT_INTERVAL);
            if due && spaced {
                inner.since_last_emit = 0;
                inner.last_emit = Some(Instant::now());
                true
            } else {
                false
            }
        };

        if should_emit {
            self.emit();
        }
    }

    /// Re-baseline totals after a section-count change: dimensions that have
    /// not started yet take the new count; dimensions with recorded slots
    /// keep their historical totals.
    pub fn rebaseline(&self, section_count: usize) {
        {
            let mut inner = self.inner.lock();
            for state in inner.dimensions.values_mut() {
                if state.scope == DimensionScope::Section && !state.started() {
                    state.total = section_count;
                }
            }
        }
        self.emit();
    }

    /// Force a final emission regardless of throttling.
    pub fn finish(&self) {
        {
            let mut inner = self.inner.lock();
            inner.since_last_emit = 0;
            inner.last_emit = Some(Instant::now());
        }
        self.emit();
    }

    /// Current counters as a [`ProgressUpdate`].
    #[must_use]
    pub fn snapshot(&self) -> ProgressUpdate {
        let inner = self.inner.lock();
        let elapsed = inner.started_at.elapsed().as_secs_f64();

        let mut update = ProgressUpdate::default();
        for (name, state) in &inner.dimensions {
            let mut progress = DimensionProgress {
                total: state.total,
                completed: state.completed,
                failed: state.failed,
                skipped: state.skipped,
                cost: state.cost,
                ..DimensionProgress::default()
            };
            if state.completed > 0 {
                progress.estimated_cost =
                    state.cost * state.total as f64 / state.completed as f64;
            }
            if state.total > 0 {
                progress.percent =
                    (state.completed as f64 / state.total as f64 * 100.0).min(100.0);
            }
            update.total += state.total;
            update.completed += state.completed;
            update.failed += state.failed;
            update.skipped += state.skipped;
            update.cost += state.cost;
            update.estimated_cost += progress.estimated_cost;
            update.dimensions.insert(name.clone(), progress);
        }

        if update.total > 0 {
            update.percent = (update.completed as f64 / update.total as f64 * 100.0).min(100.0);
        }
        if update.completed > 0 && update.total >= update.completed {
            let remaining = (update.total - update.completed) as f64;
            update.eta_seconds = (elapsed * remaining / update.completed as f64).max(0.0);
            for progress in update.dimensions.values_mut() {
                if progress.completed > 0 && progress.total >= progress.completed {
                    let left = (progress.total - progress.completed) as f64;
                    progress.eta_seconds =
                        (elapsed * left / progress.completed as f64).max(0.0);
                }
            }
        }
        update
    }

    fn emit(&self) {
        if self.callback.is_none() && !self.log_progress {
            return;
        }
        // Snapshot inside the emission slot so consecutive callbacks observe
        // non-decreasing counters.
        let _serialized = self.emitter.lock();
        let update = self.snapshot();
        if let Some(callback) = &self.callback {
            callback(&update);
        } else {
            info!(
                completed = update.completed,
                total = update.total,
                failed = update.failed,
                percent = format!("{:.1}", update.percent),
                cost = format!("{:.4}", update.cost),
                "progress"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    fn dims(pairs: &[(&str, DimensionScope)]) -> Vec<(String, DimensionScope)> {
        pairs.iter().map(|(n, s)| ((*n).to_string(), *s)).collect()
    }

    #[test]
    fn test_totals_seed_by_scope() {
        let tracker = ProgressTracker::new(
            &dims(&[
                ("classify", DimensionScope::Section),
                ("overall", DimensionScope::Global),
            ]),
            5,
            None,
            1,
            false,
        );
        let update = tracker.snapshot();
        assert_eq!(update.total, 6);
        assert_eq!(update.dimensions["classify"].total, 5);
        assert_eq!(update.dimensions["overall"].total, 1);
    }

    #[test]
    fn test_record_updates_counters_and_cost() {
        let tracker = ProgressTracker::new(
            &dims(&[("classify", DimensionScope::Section)]),
            4,
            None,
            1,
            false,
        );
        tracker.record("classify", SlotOutcome::Succeeded, 0.5);
        tracker.record("classify", SlotOutcome::Failed, 0.0);
        tracker.record("classify", SlotOutcome::Skipped, 0.0);

        let update = tracker.snapshot();
        assert_eq!(update.completed, 3);
        assert_eq!(update.failed, 1);
        assert_eq!(update.skipped, 1);
        assert!((update.cost - 0.5).abs() < 1e-9);
        assert_eq!(update.percent, 75.0);
        // 0.5 across 3 of 4 slots extrapolates to 2/3.
        assert!((update.estimated_cost - 0.5 * 4.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_rebaseline_spares_started_dimensions() {
        let tracker = ProgressTracker::new(
            &dims(&[
                ("done", DimensionScope::Section),
                ("pending", DimensionScope::Section),
                ("overall", DimensionScope::Global),
            ]),
            10,
            None,
            1,
            false,
        );
        for _ in 0..10 {
            tracker.record("done", SlotOutcome::Succeeded, 0.0);
        }

        tracker.rebaseline(3);

        let update = tracker.snapshot();
        assert_eq!(update.dimensions["done"].total, 10);
        assert_eq!(update.dimensions["pending"].total, 3);
        assert_eq!(update.dimensions["overall"].total, 1);
        assert!(update.completed <= update.total);
    }

    #[test]
    fn test_update_every_throttles_emissions() {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let tracker = ProgressTracker::new(
            &dims(&[("d", DimensionScope::Section)]),
            6,
            Some(Arc::new(move |update: &ProgressUpdate| {
                sink.lock().unwrap().push(update.completed);
            })),
            3,
            false,
        );
        for _ in 0..6 {
            tracker.record("d", SlotOutcome::Succeeded, 0.0);
        }
        let emitted = seen.lock().unwrap().clone();
        // First emission at 3 completions; the one at 6 lands inside the
        // minimum interval and is dropped, finish() recovers it.
        assert!(emitted.contains(&3));
        tracker.finish();
        assert_eq!(*seen.lock().unwrap().last().unwrap(), 6);
    }

    #[test]
    fn test_completed_monotone_across_emissions() {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let tracker = ProgressTracker::new(
            &dims(&[("d", DimensionScope::Section)]),
            5,
            Some(Arc::new(move |update: &ProgressUpdate| {
                sink.lock().unwrap().push(update.completed);
            })),
            1,
            false,
        );
        for _ in 0..5 {
            tracker.record("d", SlotOutcome::Succeeded, 0.0);
        }
        tracker.finish();
        let emitted = seen.lock().unwrap().clone();
        assert!(emitted.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn test_eta_clamped_non_negative() {
        let tracker = ProgressTracker::new(
            &dims(&[("d", DimensionScope::Section)]),
            2,
            None,
            1,
            false,
        );
        tracker.record("d", SlotOutcome::Succeeded, 0.0);
        let update = tracker.snapshot();
        assert!(update.eta_seconds >= 0.0);
    }
}
