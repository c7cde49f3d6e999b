//! Crawl stages
//!
//! This module contains the crawl pipeline, including:
//! - The bounded-concurrency stage runner
//! - Directory discovery (region → sub-region → store)
//! - Catalog crawling (category → item → customization)
//! - Coordination of stages, ledger and exports

mod catalog;
mod coordinator;
mod directory;
mod runner;

pub use catalog::{dedupe_first_writer, CatalogCrawler};
pub use coordinator::{Command, Coordinator};
pub use directory::DirectoryCrawler;
pub use runner::{Outcome, RunCounts, StageRunner};

use crate::checkpoint::{CheckpointStore, Stage, StageKey};
use crate::output::{FailureRecord, StageSummary};
use tokio_util::sync::CancellationToken;

/// Operator interrupt state shared by every stage
///
/// `stop` ends submission of new work; in-flight items drain. `abort` also
/// cancels in-flight items, which then report as cancelled.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    stop: CancellationToken,
    abort: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles one interrupt: the first stops, the second aborts
    pub fn signal(&self) {
        if self.stop.is_cancelled() {
            tracing::warn!("Second interrupt, aborting in-flight work");
            self.abort();
        } else {
            tracing::warn!("Interrupt received, finishing in-flight work (interrupt again to abort)");
            self.stop.cancel();
        }
    }

    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn abort(&self) {
        self.stop.cancel();
        self.abort.cancel();
    }

    pub fn is_stopping(&self) -> bool {
        self.stop.is_cancelled()
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_cancelled()
    }

    /// A view that ignores `stop` but still follows `abort`
    ///
    /// Used for work nested inside an item that has already started, which
    /// must run to the end unless the item itself is aborted.
    pub fn abort_only(&self) -> Self {
        Self {
            stop: CancellationToken::new(),
            abort: self.abort.clone(),
        }
    }

    pub(crate) fn stop_token(&self) -> &CancellationToken {
        &self.stop
    }

    pub(crate) fn abort_token(&self) -> &CancellationToken {
        &self.abort
    }
}

/// Result of one stage invocation
#[derive(Debug, Clone)]
pub struct StageReport {
    pub summary: StageSummary,
    pub failures: Vec<FailureRecord>,
}

/// Splits `candidates` into the pending ones and the number already complete
///
/// Keys are deduplicated, first occurrence kept. `limit` caps the pending list.
pub(crate) fn pending_work<I>(
    checkpoints: &dyn CheckpointStore,
    stage: Stage,
    candidates: Vec<I>,
    key_of: impl Fn(&I) -> String,
    limit: Option<usize>,
) -> (Vec<I>, usize) {
    let mut seen = std::collections::HashSet::new();
    let mut pending = Vec::new();
    let mut skipped = 0;

    for item in candidates {
        let key = key_of(&item);
        if !seen.insert(key.clone()) {
            continue;
        }
        if checkpoints.is_complete(&StageKey::new(stage, key)) {
            skipped += 1;
        } else {
            pending.push(item);
        }
    }

    if let Some(limit) = limit {
        pending.truncate(limit);
    }
    (pending, skipped)
}
