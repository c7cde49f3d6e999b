//! Everything the crawl produces besides checkpoints
//!
//! This module handles:
//! - The merged price table and its single-writer merge cycle
//! - Per-stage progress counters
//! - Location export
//! - Crawl status for the `status` command

mod locations;
mod merge;
mod progress;
pub mod stats;
mod table;

pub use locations::{
    export_locations, resolved_stores, ExportSummary, RegionLocations, SubRegionLocations,
};
pub use merge::{format_price, merge, MergeOutcome, MergeWriter, NewRow};
pub use progress::{FailureRecord, ProgressTracker, StageSummary};
pub use stats::{load_statistics, print_statistics, CrawlStatistics};
pub use table::{MergedTable, TableRow, KEY_COLUMN};
