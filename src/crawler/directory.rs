//! Location directory discovery: region → sub-region → store

use super::runner::{Outcome, StageRunner};
use super::{pending_work, Shutdown, StageReport};
use crate::checkpoint::{CheckpointStore, CheckpointStoreExt, Stage, StageKey};
use crate::config::CrawlerConfig;
use crate::fetch::{PageFetcher, SessionPool};
use crate::model::{Region, RegionRecord, StoreLink, SubRegion, SubRegionRecord};
use crate::output::ProgressTracker;
use crate::parse::PageParser;
use crate::state::ItemState;
use crate::{AtlasError, ItemError, ParseError};
use serde::Serialize;
use std::sync::Arc;
use url::Url;

/// Key of the bootstrap checkpoint holding the region list
const ROOT_KEY: &str = "root";

/// Walks the location directory, one checkpointed stage per level
///
/// Each stage reads its work list from the checkpoints of the level above,
/// so stages can be run separately and in any later invocation.
pub struct DirectoryCrawler {
    root: Url,
    pool: SessionPool,
    parser: Arc<dyn PageParser>,
    checkpoints: Arc<dyn CheckpointStore>,
    runner: StageRunner,
    shutdown: Shutdown,
    limit: Option<usize>,
}

impl DirectoryCrawler {
    pub fn new(
        root: Url,
        fetcher: Arc<dyn PageFetcher>,
        parser: Arc<dyn PageParser>,
        checkpoints: Arc<dyn CheckpointStore>,
        crawler: &CrawlerConfig,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            root,
            pool: SessionPool::new(fetcher, crawler.directory_workers, crawler.polite_delay()),
            parser,
            checkpoints,
            runner: StageRunner::new(crawler.directory_workers, shutdown.clone()),
            shutdown,
            limit: None,
        }
    }

    /// Caps the number of pending items each stage works on
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Returns the region list, reading the directory root if not yet done
    ///
    /// Failure here is fatal: without regions there is nothing to crawl.
    pub async fn bootstrap(&self) -> Result<Vec<Region>, AtlasError> {
        let key = StageKey::new(Stage::Regions, ROOT_KEY);
        if let Some(regions) = self.checkpoints.load::<Vec<Region>>(&key)? {
            tracing::debug!(regions = regions.len(), "Region list loaded from checkpoint");
            return Ok(regions);
        }

        let bootstrap_err = |source: ItemError| AtlasError::Bootstrap {
            url: self.root.to_string(),
            source,
        };

        tracing::info!(url = %self.root, "Reading directory root");
        let source = self.pool.fetch(&self.root).await.map_err(bootstrap_err)?;
        let regions = self
            .parser
            .parse_regions(&source, &self.root)
            .map_err(|e| bootstrap_err(e.into()))?;

        if regions.is_empty() {
            return Err(bootstrap_err(
                ParseError::MissingStructure {
                    page: self.root.to_string(),
                    what: "region links".to_string(),
                }
                .into(),
            ));
        }

        self.checkpoints.mark_complete(&key, &regions)?;
        tracing::info!(regions = regions.len(), "Region list checkpointed");
        Ok(regions)
    }

    /// Reads every pending region page into its sub-region list
    pub async fn crawl_regions(&self) -> Result<StageReport, AtlasError> {
        let regions = self.bootstrap().await?;
        let parser = Arc::clone(&self.parser);

        Ok(self
            .run_stage(Stage::SubRegions, regions, Region::key, move |region, source, url| {
                let sub_regions = parser.parse_sub_regions(&source, &url, &region)?;
                Ok(RegionRecord {
                    region,
                    sub_regions,
                })
            })
            .await)
    }

    /// Reads every pending sub-region page into its store links
    pub async fn crawl_sub_regions(&self) -> Result<StageReport, AtlasError> {
        let sub_regions: Vec<SubRegion> = self
            .checkpoints
            .load_stage::<RegionRecord>(Stage::SubRegions)?
            .into_iter()
            .flat_map(|(_, record)| record.sub_regions)
            .collect();
        let parser = Arc::clone(&self.parser);

        Ok(self
            .run_stage(Stage::StoreLinks, sub_regions, SubRegion::key, move |sub_region, source, url| {
                let stores = parser.parse_store_links(&source, &url, &sub_region)?;
                Ok(SubRegionRecord { sub_region, stores })
            })
            .await)
    }

    /// Resolves every pending store page into a store record
    pub async fn resolve_stores(&self) -> Result<StageReport, AtlasError> {
        let links: Vec<StoreLink> = self
            .checkpoints
            .load_stage::<SubRegionRecord>(Stage::StoreLinks)?
            .into_iter()
            .flat_map(|(_, record)| record.stores)
            .collect();
        let parser = Arc::clone(&self.parser);

        Ok(self
            .run_stage(Stage::Stores, links, StoreLink::key, move |link, source, url| {
                parser
                    .parse_store_detail(&source, &url, &link)?
                    .ok_or_else(|| {
                        ParseError::MissingStructure {
                            page: url.to_string(),
                            what: "store id".to_string(),
                        }
                        .into()
                    })
            })
            .await)
    }

    /// Runs the three directory stages in order until interrupted
    pub async fn run(&self) -> Result<Vec<StageReport>, AtlasError> {
        let mut reports = vec![self.crawl_regions().await?];
        if !self.shutdown.is_stopping() {
            reports.push(self.crawl_sub_regions().await?);
        }
        if !self.shutdown.is_stopping() {
            reports.push(self.resolve_stores().await?);
        }
        Ok(reports)
    }

    /// Fetches one page per pending item, parses it, and checkpoints the
    /// record under the item's key as each one completes
    async fn run_stage<I, T, P>(
        &self,
        stage: Stage,
        candidates: Vec<I>,
        key_of: fn(&I) -> String,
        parse: P,
    ) -> StageReport
    where
        I: PageItem + Clone + Send + 'static,
        T: Serialize + Send + 'static,
        P: Fn(I, String, Url) -> Result<T, ItemError> + Send + Sync + 'static,
    {
        let (pending, skipped) =
            pending_work(self.checkpoints.as_ref(), stage, candidates, key_of, self.limit);
        let tracker = Arc::new(ProgressTracker::new(stage));
        tracker.begin(pending.len(), skipped);

        let parse = Arc::new(parse);
        let work = |item: I| {
            let pool = self.pool.clone();
            let parse = Arc::clone(&parse);
            let tracker = Arc::clone(&tracker);
            fetch_and_parse(item, key_of, pool, tracker, move |item, source, url| {
                (*parse)(item, source, url)
            })
        };

        let checkpoints = Arc::clone(&self.checkpoints);
        self.runner
            .run(pending, work, |item, outcome| {
                let key = key_of(item);
                match outcome {
                    Outcome::Completed(record) => {
                        match checkpoints.mark_complete(&StageKey::new(stage, key.as_str()), &record) {
                            Ok(_) => tracker.transition(&key, ItemState::Persisted),
                            Err(e) => tracker.fail(&key, &ItemError::Persist(e)),
                        }
                    }
                    Outcome::Failed(e) => tracker.fail(&key, &e),
                    Outcome::Cancelled => tracker.transition(&key, ItemState::Cancelled),
                }
            })
            .await;

        StageReport {
            summary: tracker.finish(),
            failures: tracker.failures(),
        }
    }
}

/// A directory record whose page is fetched in the next stage
pub(crate) trait PageItem {
    fn page_url(&self) -> &str;
}

impl PageItem for Region {
    fn page_url(&self) -> &str {
        &self.directory_url
    }
}

impl PageItem for SubRegion {
    fn page_url(&self) -> &str {
        &self.directory_url
    }
}

impl PageItem for StoreLink {
    fn page_url(&self) -> &str {
        &self.source_url
    }
}

async fn fetch_and_parse<I, T, P>(
    item: I,
    key_of: fn(&I) -> String,
    pool: SessionPool,
    tracker: Arc<ProgressTracker>,
    parse: P,
) -> Result<T, ItemError>
where
    I: PageItem,
    P: FnOnce(I, String, Url) -> Result<T, ItemError>,
{
    let key = key_of(&item);
    let url = Url::parse(item.page_url()).map_err(|e| ParseError::Malformed {
        page: item.page_url().to_string(),
        message: e.to_string(),
    })?;

    tracker.transition(&key, ItemState::Fetching);
    let source = pool.fetch(&url).await?;
    let record = parse(item, source, url)?;
    tracker.transition(&key, ItemState::Parsed);
    Ok(record)
}
