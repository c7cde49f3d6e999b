//! Crawl status derived from checkpoints, the merged table and the ledger

use super::table::MergedTable;
use crate::checkpoint::{CheckpointStore, Stage, StageKey};
use crate::state::ItemState;
use crate::storage::{FailureRow, RunLedger, RunRecord, StageRecord};
use crate::AtlasError;
use std::path::Path;

/// Snapshot of how far the crawl has come
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Completed checkpoints per stage
    pub checkpoints: Vec<(Stage, usize)>,

    pub table_rows: usize,
    pub table_columns: usize,

    /// The most recent run, if any
    pub last_run: Option<RunRecord>,

    /// Stage counts of the most recent run
    pub last_stages: Vec<StageRecord>,

    /// Failed or cancelled items of the last run that are still not complete
    pub to_retry: Vec<FailureRow>,

    /// Items that completed with part of their data missing
    pub partial: Vec<FailureRow>,
}

/// Loads statistics
///
/// # Arguments
///
/// * `checkpoints` - The checkpoint store of the data directory
/// * `ledger` - The run ledger
/// * `table_path` - Path of the merged table
pub fn load_statistics(
    checkpoints: &dyn CheckpointStore,
    ledger: &dyn RunLedger,
    table_path: &Path,
) -> Result<CrawlStatistics, AtlasError> {
    let mut counts = Vec::with_capacity(Stage::ALL.len());
    for stage in Stage::ALL {
        counts.push((stage, checkpoints.completed_keys(stage)?.len()));
    }

    let table = MergedTable::read(table_path)?;

    let last_run = ledger.latest_run()?;
    let (last_stages, failures) = match &last_run {
        Some(run) => (ledger.stage_records(run.id)?, ledger.failures(run.id)?),
        None => (Vec::new(), Vec::new()),
    };

    let (partial, failed): (Vec<FailureRow>, Vec<FailureRow>) = failures
        .into_iter()
        .partition(|row| row.state == ItemState::Parsed);

    let to_retry = failed
        .into_iter()
        .filter(|row| match Stage::from_dir_name(&row.stage) {
            Some(stage) => !checkpoints.is_complete(&StageKey::new(stage, row.item_key.as_str())),
            None => true,
        })
        .collect();

    Ok(CrawlStatistics {
        checkpoints: counts,
        table_rows: table.rows().len(),
        table_columns: table.columns().len(),
        last_run,
        last_stages,
        to_retry,
        partial,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Status ===\n");

    println!("Checkpoints:");
    for (stage, count) in &stats.checkpoints {
        println!("  {}: {}", stage, count);
    }
    println!();

    println!("Merged table:");
    println!("  Stores (rows): {}", stats.table_rows);
    println!("  Items (columns): {}", stats.table_columns);
    println!();

    let Some(run) = &stats.last_run else {
        println!("No runs recorded yet.");
        return;
    };

    println!("Last run (#{}):", run.id);
    println!("  Command: {}", run.command);
    println!("  Status: {}", run.status.to_db_string());
    println!("  Started: {}", run.started_at);
    if let Some(finished) = &run.finished_at {
        println!("  Finished: {}", finished);
    }
    println!("  Config hash: {}", run.config_hash);
    println!();

    if !stats.last_stages.is_empty() {
        println!("Stages:");
        for stage in &stats.last_stages {
            println!(
                "  {}: {} succeeded, {} failed, {} cancelled, {} skipped ({:.1}s)",
                stage.stage,
                stage.succeeded,
                stage.failed,
                stage.cancelled,
                stage.skipped,
                stage.elapsed_ms as f64 / 1000.0
            );
        }
        println!();
    }

    if !stats.to_retry.is_empty() {
        println!("Will be retried ({}):", stats.to_retry.len());
        for row in &stats.to_retry {
            println!("  - {}/{} [{}] {}", row.stage, row.item_key, row.kind, row.message);
        }
        println!();
    }

    if !stats.partial.is_empty() {
        println!("Partial data ({}):", stats.partial.len());
        for row in &stats.partial {
            println!("  - {}/{} [{}]", row.stage, row.item_key, row.kind);
        }
    }
}
