//! Ledger trait and error types

use crate::output::{FailureRecord, StageSummary};
use crate::storage::{FailureRow, RunRecord, RunStatus, StageRecord};
use thiserror::Error;

/// Errors that can occur during ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Record of runs, stage counts and item failures
pub trait RunLedger {
    /// Starts a run and returns its id
    fn create_run(&mut self, config_hash: &str, command: &str) -> LedgerResult<i64>;

    /// Sets the final status and finish time of a run
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> LedgerResult<()>;

    fn get_run(&self, run_id: i64) -> LedgerResult<RunRecord>;

    fn latest_run(&self) -> LedgerResult<Option<RunRecord>>;

    /// Stores a stage's counts and the items that did not complete
    fn record_stage(
        &mut self,
        run_id: i64,
        summary: &StageSummary,
        failures: &[FailureRecord],
    ) -> LedgerResult<()>;

    fn stage_records(&self, run_id: i64) -> LedgerResult<Vec<StageRecord>>;

    fn failures(&self, run_id: i64) -> LedgerResult<Vec<FailureRow>>;
}
