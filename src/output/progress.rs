//! Per-stage progress counters

use crate::checkpoint::Stage;
use crate::state::ItemState;
use crate::ItemError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How often (in finished items) a progress line is logged
const LOG_EVERY: usize = 25;

/// An item that did not complete, as reported to the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub key: String,
    pub kind: String,
    pub message: String,
    pub state: ItemState,
}

/// Final counts of one stage invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSummary {
    pub stage: Stage,
    /// Items handed to the runner
    pub pending: usize,
    /// Items skipped because their checkpoint already existed
    pub skipped: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub elapsed: Duration,
}

impl StageSummary {
    /// Items a worker actually started on
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Items that will be picked up by the next run
    pub fn remaining(&self) -> usize {
        self.failed + self.cancelled + self.pending.saturating_sub(self.finished())
    }

    fn finished(&self) -> usize {
        self.succeeded + self.failed + self.cancelled
    }
}

/// Counts outcomes for one stage; safe to share between workers
#[derive(Debug)]
pub struct ProgressTracker {
    stage: Stage,
    started: Instant,
    pending: AtomicUsize,
    skipped: AtomicUsize,
    in_flight: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    cancelled: AtomicUsize,
    failures: Mutex<Vec<FailureRecord>>,
}

impl ProgressTracker {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            started: Instant::now(),
            pending: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            succeeded: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            cancelled: AtomicUsize::new(0),
            failures: Mutex::new(Vec::new()),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Sets the size of the work list before the stage starts
    pub fn begin(&self, pending: usize, skipped: usize) {
        self.pending.store(pending, Ordering::Relaxed);
        self.skipped.store(skipped, Ordering::Relaxed);
        tracing::info!(
            stage = %self.stage,
            pending,
            skipped,
            "Stage started"
        );
    }

    /// Records a transition of one item
    pub fn transition(&self, key: &str, state: ItemState) {
        match state {
            ItemState::Fetching => {
                self.in_flight.fetch_add(1, Ordering::Relaxed);
            }
            ItemState::Persisted => {
                self.finish_in_flight();
                self.succeeded.fetch_add(1, Ordering::Relaxed);
                self.maybe_log();
            }
            ItemState::Cancelled => {
                self.finish_in_flight();
                self.cancelled.fetch_add(1, Ordering::Relaxed);
            }
            ItemState::Pending | ItemState::Parsed | ItemState::Failed => {}
        }
        tracing::trace!(stage = %self.stage, item = key, state = %state, "Item transition");
    }

    /// Records a failed item; it stays pending for the next run
    pub fn fail(&self, key: &str, error: &ItemError) {
        self.finish_in_flight();
        self.failed.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(stage = %self.stage, item = key, kind = error.kind(), "{}", error);
        self.push_failure(key, error, ItemState::Failed);
        self.maybe_log();
    }

    /// Records a problem inside an item that did not fail it as a whole
    pub fn note_partial(&self, key: &str, error: &ItemError) {
        tracing::warn!(stage = %self.stage, item = key, kind = error.kind(), "Partial failure: {}", error);
        self.push_failure(key, error, ItemState::Parsed);
    }

    pub fn summary(&self) -> StageSummary {
        StageSummary {
            stage: self.stage,
            pending: self.pending.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            elapsed: self.started.elapsed(),
        }
    }

    /// Items currently between `Fetching` and a final state
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> Vec<FailureRecord> {
        match self.failures.lock() {
            Ok(failures) => failures.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Logs the final counts and returns them
    pub fn finish(&self) -> StageSummary {
        let summary = self.summary();
        tracing::info!(
            stage = %summary.stage,
            succeeded = summary.succeeded,
            failed = summary.failed,
            cancelled = summary.cancelled,
            skipped = summary.skipped,
            elapsed_secs = summary.elapsed.as_secs_f64(),
            "Stage finished"
        );
        summary
    }

    fn finish_in_flight(&self) {
        // Saturating: items may fail before they were ever marked fetching
        let _ = self
            .in_flight
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    fn push_failure(&self, key: &str, error: &ItemError, state: ItemState) {
        let record = FailureRecord {
            key: key.to_string(),
            kind: error.kind().to_string(),
            message: error.to_string(),
            state,
        };
        match self.failures.lock() {
            Ok(mut failures) => failures.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
    }

    fn maybe_log(&self) {
        let done = self.succeeded.load(Ordering::Relaxed) + self.failed.load(Ordering::Relaxed);
        if done % LOG_EVERY == 0 {
            tracing::info!(
                stage = %self.stage,
                done,
                pending = self.pending.load(Ordering::Relaxed),
                in_flight = self.in_flight.load(Ordering::Relaxed),
                failed = self.failed.load(Ordering::Relaxed),
                "Progress"
            );
        }
    }
}
