//! SQLite ledger implementation

use crate::output::{FailureRecord, StageSummary};
use crate::state::ItemState;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{LedgerError, LedgerResult, RunLedger};
use crate::storage::{FailureRow, RunRecord, RunStatus, StageRecord};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// SQLite ledger backend
pub struct SqliteLedger {
    conn: Connection,
}

impl SqliteLedger {
    /// Opens or creates the ledger at `path`
    pub fn open(path: &Path) -> LedgerResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;
        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory ledger
    pub fn open_in_memory() -> LedgerResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        command: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?).unwrap_or(RunStatus::Running),
    })
}

impl RunLedger for SqliteLedger {
    fn create_run(&mut self, config_hash: &str, command: &str) -> LedgerResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, command, status) VALUES (?1, ?2, ?3, ?4)",
            params![now, config_hash, command, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> LedgerResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(LedgerError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> LedgerResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, command, status FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(LedgerError::RunNotFound(run_id))
    }

    fn latest_run(&self) -> LedgerResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, command, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn record_stage(
        &mut self,
        run_id: i64,
        summary: &StageSummary,
        failures: &[FailureRecord],
    ) -> LedgerResult<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO stage_runs (run_id, stage, pending, skipped, succeeded, failed, cancelled, elapsed_ms, finished_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                run_id,
                summary.stage.dir_name(),
                summary.pending as i64,
                summary.skipped as i64,
                summary.succeeded as i64,
                summary.failed as i64,
                summary.cancelled as i64,
                summary.elapsed.as_millis() as i64,
                now,
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO item_failures (run_id, stage, item_key, kind, message, state, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for failure in failures {
                stmt.execute(params![
                    run_id,
                    summary.stage.dir_name(),
                    failure.key,
                    failure.kind,
                    failure.message,
                    failure.state.to_db_string(),
                    now,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn stage_records(&self, run_id: i64) -> LedgerResult<Vec<StageRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT stage, pending, skipped, succeeded, failed, cancelled, elapsed_ms
             FROM stage_runs WHERE run_id = ?1 ORDER BY id",
        )?;

        let records = stmt
            .query_map(params![run_id], |row| {
                Ok(StageRecord {
                    stage: row.get(0)?,
                    pending: row.get::<_, i64>(1)? as u64,
                    skipped: row.get::<_, i64>(2)? as u64,
                    succeeded: row.get::<_, i64>(3)? as u64,
                    failed: row.get::<_, i64>(4)? as u64,
                    cancelled: row.get::<_, i64>(5)? as u64,
                    elapsed_ms: row.get::<_, i64>(6)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn failures(&self, run_id: i64) -> LedgerResult<Vec<FailureRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT stage, item_key, kind, message, state
             FROM item_failures WHERE run_id = ?1 ORDER BY id",
        )?;

        let rows = stmt
            .query_map(params![run_id], |row| {
                Ok(FailureRow {
                    stage: row.get(0)?,
                    item_key: row.get(1)?,
                    kind: row.get(2)?,
                    message: row.get(3)?,
                    state: ItemState::from_db_string(&row.get::<_, String>(4)?)
                        .unwrap_or(ItemState::Failed),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}
