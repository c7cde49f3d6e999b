//! Crawler coordinator - wires stages, checkpoints, the table and the ledger
//!
//! Every CLI command goes through here: it opens the data directory, records
//! the run in the ledger, runs the requested stages and records each stage's
//! counts as it finishes.

use super::{CatalogCrawler, DirectoryCrawler, Shutdown, StageReport};
use crate::checkpoint::{CheckpointStore, CheckpointStoreExt, FsCheckpointStore, Stage};
use crate::config::Config;
use crate::fetch::{Fetchers, HttpFetcher};
use crate::model::StoreMenu;
use crate::output::{
    export_locations, load_statistics, CrawlStatistics, ExportSummary, MergeOutcome, MergeWriter,
    NewRow,
};
use crate::parse::{LocatorPageParser, PageParser};
use crate::storage::{RunLedger, RunStatus, SqliteLedger};
use crate::url::normalize_url;
use crate::{AtlasError, Result};
use std::sync::Arc;

/// Commands that do work and are recorded as runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Read region pages into sub-region lists
    Regions,
    /// Read sub-region pages into store links
    SubRegions,
    /// Resolve store pages into store ids and coordinates
    Stores,
    /// All three directory stages
    Directory,
    /// Crawl the catalogs of resolved stores
    Catalog,
    /// Directory, catalog and location export
    All,
    /// Merge every persisted menu into the table
    RebuildTable,
    ExportLocations,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Regions => "regions",
            Self::SubRegions => "sub-regions",
            Self::Stores => "stores",
            Self::Directory => "directory",
            Self::Catalog => "catalog",
            Self::All => "all",
            Self::RebuildTable => "rebuild-table",
            Self::ExportLocations => "export-locations",
        }
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Config,
    checkpoints: Arc<FsCheckpointStore>,
    writer: Arc<MergeWriter>,
    ledger: SqliteLedger,
    fetchers: Fetchers,
    parser: Arc<dyn PageParser>,
    shutdown: Shutdown,
    limit: Option<usize>,
    run_id: Option<i64>,
}

impl Coordinator {
    /// Opens the data directory with the given collaborators
    ///
    /// # Errors
    ///
    /// Fails if the data directory, the checkpoint store or the ledger
    /// cannot be created.
    pub fn new(
        config: Config,
        fetchers: Fetchers,
        parser: Arc<dyn PageParser>,
        shutdown: Shutdown,
    ) -> Result<Self> {
        let data_dir = config.output.data_dir.clone();
        std::fs::create_dir_all(&data_dir).map_err(|source| AtlasError::DataDir {
            path: data_dir.clone(),
            source,
        })?;

        let checkpoints = Arc::new(FsCheckpointStore::open(config.output.checkpoint_dir())?);
        let ledger = SqliteLedger::open(&config.output.ledger_path())?;
        let writer = Arc::new(MergeWriter::new(config.output.table_path()));

        tracing::debug!(data_dir = %data_dir.display(), "Data directory ready");

        Ok(Self {
            config,
            checkpoints,
            writer,
            ledger,
            fetchers,
            parser,
            shutdown,
            limit: None,
            run_id: None,
        })
    }

    /// Uses the HTTP fetcher and the locator parser
    pub fn from_config(config: Config, shutdown: Shutdown) -> Result<Self> {
        let fetcher = HttpFetcher::from_config(&config.crawler, &config.user_agent)?;
        let fetchers = Fetchers::uniform(Arc::new(fetcher));
        Self::new(config, fetchers, Arc::new(LocatorPageParser), shutdown)
    }

    /// Caps the pending items of every stage
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn checkpoints(&self) -> &FsCheckpointStore {
        &self.checkpoints
    }

    pub fn ledger(&self) -> &SqliteLedger {
        &self.ledger
    }

    /// Records the start of a run
    pub fn begin_run(&mut self, config_hash: &str, command: Command) -> Result<i64> {
        let run_id = self.ledger.create_run(config_hash, command.name())?;
        self.run_id = Some(run_id);
        tracing::info!(run_id, command = command.name(), "Run started");
        Ok(run_id)
    }

    /// Runs a command to completion or interruption
    pub async fn execute(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Regions => {
                let report = self.directory_crawler()?.crawl_regions().await?;
                self.record(&report)?;
            }
            Command::SubRegions => {
                let report = self.directory_crawler()?.crawl_sub_regions().await?;
                self.record(&report)?;
            }
            Command::Stores => {
                let report = self.directory_crawler()?.resolve_stores().await?;
                self.record(&report)?;
            }
            Command::Directory => self.run_directory().await?,
            Command::Catalog => self.run_catalog().await?,
            Command::All => {
                self.run_directory().await?;
                if !self.shutdown.is_stopping() {
                    self.run_catalog().await?;
                }
                if !self.shutdown.is_stopping() {
                    self.export_locations()?;
                }
            }
            Command::RebuildTable => {
                self.rebuild_table()?;
            }
            Command::ExportLocations => {
                self.export_locations()?;
            }
        }
        Ok(())
    }

    /// Runs the three directory stages
    pub async fn run_directory(&mut self) -> Result<()> {
        let crawler = self.directory_crawler()?;

        let report = crawler.crawl_regions().await?;
        self.record(&report)?;

        if !self.shutdown.is_stopping() {
            let report = crawler.crawl_sub_regions().await?;
            self.record(&report)?;
        }
        if !self.shutdown.is_stopping() {
            let report = crawler.resolve_stores().await?;
            self.record(&report)?;
        }
        Ok(())
    }

    pub async fn run_catalog(&mut self) -> Result<()> {
        let root = normalize_url(&self.config.site.catalog_root)?;
        let crawler = CatalogCrawler::new(
            root,
            &self.fetchers,
            Arc::clone(&self.parser),
            self.checkpoints.clone() as Arc<dyn CheckpointStore>,
            Arc::clone(&self.writer),
            &self.config.crawler,
            self.shutdown.clone(),
        )
        .with_limit(self.limit);

        let report = crawler.run().await?;
        self.record(&report)
    }

    /// Merges every persisted menu into the table
    ///
    /// Stores already in the table keep their row, so this only adds stores
    /// whose menu was checkpointed but never merged.
    pub fn rebuild_table(&mut self) -> Result<MergeOutcome> {
        let rows: Vec<NewRow> = self
            .checkpoints
            .load_stage::<StoreMenu>(Stage::Menus)?
            .iter()
            .map(|(_, menu)| NewRow::from_menu(menu))
            .collect();

        let outcome = self.writer.apply(&rows)?;
        tracing::info!(
            menus = rows.len(),
            appended = outcome.appended,
            columns_added = outcome.columns_added,
            "Table rebuilt"
        );
        Ok(outcome)
    }

    pub fn export_locations(&self) -> Result<ExportSummary> {
        let output = &self.config.output;
        Ok(export_locations(
            &*self.checkpoints,
            &output.locations_dir(),
            &output.data_dir.join("locations.json"),
        )?)
    }

    pub fn status(&self) -> Result<CrawlStatistics> {
        load_statistics(
            &*self.checkpoints,
            &self.ledger,
            &self.config.output.table_path(),
        )
    }

    /// Closes the run record; returns the status it was given
    pub fn finish(&mut self, result: &Result<()>) -> Result<RunStatus> {
        let status = match result {
            Err(_) => RunStatus::Failed,
            Ok(()) if self.shutdown.is_stopping() => RunStatus::Interrupted,
            Ok(()) => RunStatus::Completed,
        };

        if let Some(run_id) = self.run_id.take() {
            self.ledger.finish_run(run_id, status)?;
            tracing::info!(run_id, status = status.to_db_string(), "Run finished");
        }
        Ok(status)
    }

    fn directory_crawler(&self) -> Result<DirectoryCrawler> {
        let root = normalize_url(&self.config.site.directory_root)?;
        Ok(DirectoryCrawler::new(
            root,
            Arc::clone(&self.fetchers.directory),
            Arc::clone(&self.parser),
            self.checkpoints.clone() as Arc<dyn CheckpointStore>,
            &self.config.crawler,
            self.shutdown.clone(),
        )
        .with_limit(self.limit))
    }

    fn record(&mut self, report: &StageReport) -> Result<()> {
        if let Some(run_id) = self.run_id {
            self.ledger
                .record_stage(run_id, &report.summary, &report.failures)?;
        }
        Ok(())
    }
}
