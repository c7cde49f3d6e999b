//! Per-store catalog crawl: category → item → customization

use super::runner::{Outcome, StageRunner};
use super::{pending_work, Shutdown, StageReport};
use crate::checkpoint::{CheckpointStore, CheckpointStoreExt, Stage, StageKey};
use crate::config::CrawlerConfig;
use crate::fetch::{Fetchers, SessionPool};
use crate::model::{Category, CategoryMenu, Customization, ItemListing, MenuItem, Store, StoreMenu};
use crate::output::{resolved_stores, MergeWriter, NewRow, ProgressTracker};
use crate::parse::PageParser;
use crate::state::ItemState;
use crate::url::with_query_param;
use crate::{AtlasError, ItemError, ParseError};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

/// Everything a store worker needs, shared by all of them
struct StoreContext {
    catalog_root: Url,
    store_pool: SessionPool,
    category_pool: SessionPool,
    detail_pool: SessionPool,
    parser: Arc<dyn PageParser>,
    category_workers: usize,
    shutdown: Shutdown,
    tracker: Arc<ProgressTracker>,
}

/// Crawls the catalog of every resolved store
///
/// Stores run `store-workers` at a time. Their category pages share one pool
/// of `category-workers` sessions, so a store with many categories can use
/// sessions that stores with few categories leave idle.
pub struct CatalogCrawler {
    catalog_root: Url,
    store_pool: SessionPool,
    category_pool: SessionPool,
    detail_pool: SessionPool,
    parser: Arc<dyn PageParser>,
    checkpoints: Arc<dyn CheckpointStore>,
    writer: Arc<MergeWriter>,
    runner: StageRunner,
    category_workers: usize,
    shutdown: Shutdown,
    limit: Option<usize>,
}

impl CatalogCrawler {
    pub fn new(
        catalog_root: Url,
        fetchers: &Fetchers,
        parser: Arc<dyn PageParser>,
        checkpoints: Arc<dyn CheckpointStore>,
        writer: Arc<MergeWriter>,
        crawler: &CrawlerConfig,
        shutdown: Shutdown,
    ) -> Self {
        let delay = crawler.polite_delay();
        Self {
            catalog_root,
            store_pool: SessionPool::new(Arc::clone(&fetchers.catalog), crawler.store_workers, delay),
            category_pool: SessionPool::new(
                Arc::clone(&fetchers.catalog),
                crawler.category_workers,
                delay,
            ),
            detail_pool: SessionPool::new(
                Arc::clone(&fetchers.customization),
                crawler.category_workers,
                delay,
            ),
            parser,
            checkpoints,
            writer,
            runner: StageRunner::new(crawler.store_workers, shutdown.clone()),
            category_workers: crawler.category_workers,
            shutdown,
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Crawls every store without a menu checkpoint
    ///
    /// Each finished menu is merged into the table first and checkpointed
    /// second, so a checkpointed store is always in the table.
    pub async fn run(&self) -> Result<StageReport, AtlasError> {
        let stores = resolved_stores(self.checkpoints.as_ref())?;
        let (pending, skipped) = pending_work(
            self.checkpoints.as_ref(),
            Stage::Menus,
            stores,
            |store: &Store| store.store_id.clone(),
            self.limit,
        );

        let tracker = Arc::new(ProgressTracker::new(Stage::Menus));
        tracker.begin(pending.len(), skipped);

        let context = Arc::new(StoreContext {
            catalog_root: self.catalog_root.clone(),
            store_pool: self.store_pool.clone(),
            category_pool: self.category_pool.clone(),
            detail_pool: self.detail_pool.clone(),
            parser: Arc::clone(&self.parser),
            category_workers: self.category_workers,
            shutdown: self.shutdown.clone(),
            tracker: Arc::clone(&tracker),
        });

        let writer = &self.writer;
        let checkpoints = &self.checkpoints;
        self.runner
            .run(
                pending,
                |store| {
                    let context = Arc::clone(&context);
                    let writer = Arc::clone(writer);
                    let checkpoints = Arc::clone(checkpoints);
                    async move {
                        let menu = crawl_store(context, store).await?;
                        persist(writer, checkpoints, menu).await
                    }
                },
                |store, outcome| {
                    let key = store.store_id.as_str();
                    match outcome {
                        Outcome::Completed(()) => tracker.transition(key, ItemState::Persisted),
                        Outcome::Failed(e) => tracker.fail(key, &e),
                        Outcome::Cancelled => tracker.transition(key, ItemState::Cancelled),
                    }
                },
            )
            .await;

        Ok(StageReport {
            summary: tracker.finish(),
            failures: tracker.failures(),
        })
    }
}

/// Merges a finished menu into the table, then checkpoints it
///
/// Runs on the blocking pool. An abort while it runs stops waiting for it but
/// not the write itself, so the checkpoint still only follows a merged row.
async fn persist(
    writer: Arc<MergeWriter>,
    checkpoints: Arc<dyn CheckpointStore>,
    menu: StoreMenu,
) -> Result<(), ItemError> {
    tokio::task::spawn_blocking(move || persist_menu(&writer, checkpoints.as_ref(), &menu))
        .await
        .map_err(|e| ItemError::Panicked(e.to_string()))?
}

fn persist_menu(
    writer: &MergeWriter,
    checkpoints: &dyn CheckpointStore,
    menu: &StoreMenu,
) -> Result<(), ItemError> {
    let merged = writer.apply(&[NewRow::from_menu(menu)])?;
    checkpoints.mark_complete(&StageKey::new(Stage::Menus, menu.store_id.as_str()), menu)?;
    tracing::debug!(
        store_id = %menu.store_id,
        items = menu.item_count(),
        appended = merged.appended,
        "Menu persisted"
    );
    Ok(())
}

async fn crawl_store(context: Arc<StoreContext>, store: Store) -> Result<StoreMenu, ItemError> {
    let key = store.store_id.clone();
    context.tracker.transition(&key, ItemState::Fetching);

    let root = with_query_param(&context.catalog_root, "store", &store.store_id);
    let source = context.store_pool.fetch(&root).await?;
    let categories = context
        .parser
        .parse_categories(&source, &root, &store.store_id)?;
    if categories.is_empty() {
        return Err(ParseError::MissingStructure {
            page: root.to_string(),
            what: "categories".to_string(),
        }
        .into());
    }

    let mut fetched = Vec::with_capacity(categories.len());
    let mut failed_categories = Vec::new();
    let mut first_error = None;
    for (category, outcome) in fetch_categories(&context, categories).await {
        match outcome {
            Outcome::Completed(listings) => fetched.push((category, listings)),
            Outcome::Failed(e) => {
                context
                    .tracker
                    .note_partial(&format!("{}/{}", key, category.name), &e);
                failed_categories.push(category.name);
                first_error.get_or_insert(e);
            }
            Outcome::Cancelled => return Err(ItemError::Cancelled),
        }
    }

    // With no category at all there is nothing worth keeping
    if fetched.is_empty() {
        return Err(first_error.unwrap_or(ItemError::Cancelled));
    }

    let mut categories = Vec::with_capacity(fetched.len());
    for (category, listings) in dedupe_first_writer(fetched) {
        let items = with_customizations(&context, &key, listings).await;
        categories.push(CategoryMenu { category, items });
    }

    context.tracker.transition(&key, ItemState::Parsed);
    Ok(StoreMenu {
        store_id: store.store_id,
        display_name: store.display_name,
        categories,
        failed_categories,
        fetched_at: Utc::now(),
    })
}

/// Fetches every category page through the shared category pool
///
/// Results come back in the order of `categories`, whatever order the pages
/// finished in.
async fn fetch_categories(
    context: &Arc<StoreContext>,
    categories: Vec<Category>,
) -> Vec<(Category, Outcome<Vec<ItemListing>>)> {
    let runner = StageRunner::new(context.category_workers, context.shutdown.abort_only());
    let mut slots: Vec<Option<Outcome<Vec<ItemListing>>>> =
        categories.iter().map(|_| None).collect();

    let indexed: Vec<(usize, Category)> = categories.iter().cloned().enumerate().collect();
    runner
        .run(
            indexed,
            |(_, category)| {
                let pool = context.category_pool.clone();
                let parser = Arc::clone(&context.parser);
                async move {
                    let url = Url::parse(&category.source_url).map_err(|e| ParseError::Malformed {
                        page: category.source_url.clone(),
                        message: e.to_string(),
                    })?;
                    let source = pool.fetch(&url).await?;
                    let listings = parser.parse_items(&source, &url, &category)?;
                    Ok::<_, ItemError>(listings)
                }
            },
            |(index, _), outcome| slots[*index] = Some(outcome),
        )
        .await;

    categories
        .into_iter()
        .zip(slots)
        .map(|(category, slot)| (category, slot.unwrap_or(Outcome::Cancelled)))
        .collect()
}

/// Keeps only the first listing of each item name across categories
///
/// Categories are visited in the given order; a later category loses any
/// item an earlier one already listed, whatever its price.
pub fn dedupe_first_writer(
    categories: Vec<(Category, Vec<ItemListing>)>,
) -> Vec<(Category, Vec<ItemListing>)> {
    let mut seen: HashSet<String> = HashSet::new();
    categories
        .into_iter()
        .map(|(category, listings)| {
            let kept = listings
                .into_iter()
                .filter(|listing| seen.insert(listing.item.name.clone()))
                .collect();
            (category, kept)
        })
        .collect()
}

async fn with_customizations(
    context: &StoreContext,
    store_key: &str,
    listings: Vec<ItemListing>,
) -> Vec<MenuItem> {
    let lookups = listings.into_iter().map(|listing| async move {
        let mut item = listing.item;
        let detail = match (listing.customizable, listing.detail_url) {
            (true, Some(detail)) => detail,
            _ => return item,
        };

        match fetch_customizations(context, &detail).await {
            Ok(Some(options)) => item.customizations = options,
            Ok(None) => {}
            Err(e) => context
                .tracker
                .note_partial(&format!("{}/{}", store_key, item.name), &e),
        }
        item
    });
    futures::future::join_all(lookups).await
}

async fn fetch_customizations(
    context: &StoreContext,
    detail: &str,
) -> Result<Option<Vec<Customization>>, ItemError> {
    let url = Url::parse(detail).map_err(|e| ParseError::Malformed {
        page: detail.to_string(),
        message: e.to_string(),
    })?;
    let source = context.detail_pool.fetch(&url).await?;
    Ok(context.parser.parse_customizations(&source, &url)?)
}
