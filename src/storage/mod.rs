//! Run ledger
//!
//! A small SQLite database recording every invocation: which command ran with
//! which config, how each stage went, and which items failed. Checkpoints
//! decide what gets crawled; the ledger only reports.

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteLedger;
pub use traits::{LedgerError, LedgerResult, RunLedger};

use crate::state::ItemState;

/// Represents one CLI invocation
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub command: String,
    pub status: RunStatus,
}

/// Status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Counts recorded for one stage of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRecord {
    pub stage: String,
    pub pending: u64,
    pub skipped: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub elapsed_ms: u64,
}

/// One item that did not complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRow {
    pub stage: String,
    pub item_key: String,
    pub kind: String,
    pub message: String,
    pub state: ItemState,
}
