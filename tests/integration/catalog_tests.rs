//! Catalog crawl and table merge against an in-memory site

mod common;

use common::*;
use menu_atlas::checkpoint::{CheckpointStore, CheckpointStoreExt, FsCheckpointStore, Stage, StageKey};
use menu_atlas::crawler::{CatalogCrawler, Shutdown, StageReport};
use menu_atlas::fetch::Fetchers;
use menu_atlas::model::{
    Category, Customization, ItemListing, Region, Store, StoreLink, StoreMenu, SubRegion,
};
use menu_atlas::output::{MergeWriter, MergedTable};
use menu_atlas::parse::{LocatorPageParser, PageParser};
use menu_atlas::{ItemState, ParseError};
use std::sync::Arc;
use tempfile::TempDir;
use url::Url;

struct Fixture {
    dir: TempDir,
    site: Arc<FakeSite>,
    checkpoints: Arc<FsCheckpointStore>,
    writer: Arc<MergeWriter>,
}

impl Fixture {
    fn new(store_ids: &[&str]) -> Self {
        let dir = TempDir::new().unwrap();
        let checkpoints = Arc::new(FsCheckpointStore::open(dir.path().join("checkpoints")).unwrap());
        for id in store_ids {
            let store = Store {
                store_id: id.to_string(),
                display_name: format!("Store {}", id),
                source_url: format!("https://locations.example.com/ak/anchorage/{}.html", id),
                coordinates: None,
                region: "ak".to_string(),
                sub_region: "ak/anchorage".to_string(),
            };
            checkpoints
                .mark_complete(&StageKey::new(Stage::Stores, format!("ak/anchorage/{}", id)), &store)
                .unwrap();
        }
        let writer = Arc::new(MergeWriter::new(dir.path().join("menu.csv")));
        Self {
            dir,
            site: Arc::new(FakeSite::new()),
            checkpoints,
            writer,
        }
    }

    fn crawler_with(&self, parser: Arc<dyn PageParser>, shutdown: Shutdown) -> CatalogCrawler {
        CatalogCrawler::new(
            Url::parse(CATALOG_ROOT).unwrap(),
            &Fetchers::uniform(self.site.clone()),
            parser,
            self.checkpoints.clone(),
            self.writer.clone(),
            &crawler_config(3),
            shutdown,
        )
    }

    async fn run(&self) -> StageReport {
        self.crawler_with(Arc::new(LocatorPageParser), Shutdown::new())
            .run()
            .await
            .unwrap()
    }

    fn table(&self) -> MergedTable {
        MergedTable::read(&self.dir.path().join("menu.csv")).unwrap()
    }

    fn table_text(&self) -> String {
        std::fs::read_to_string(self.dir.path().join("menu.csv")).unwrap()
    }

    fn menu(&self, store_id: &str) -> Option<StoreMenu> {
        self.checkpoints
            .load(&StageKey::new(Stage::Menus, store_id))
            .unwrap()
    }
}

#[tokio::test]
async fn test_first_category_in_list_order_wins() {
    let fx = Fixture::new(&["1001"]);
    fx.site.page(&catalog_url("1001"), catalog_page(&["tacos", "value"]));
    // The first category answers last
    fx.site.delayed(
        &category_url("tacos", "1001"),
        category_page(&[("Taco", 1.99), ("Soft Taco", 2.19)]),
        80,
    );
    fx.site.page(
        &category_url("value", "1001"),
        category_page(&[("Taco", 1.00), ("Bean Burrito", 1.49)]),
    );

    let report = fx.run().await;
    assert_eq!(report.summary.succeeded, 1);

    let table = fx.table();
    assert_eq!(table.columns(), &["Bean Burrito", "Soft Taco", "Taco"]);
    assert_eq!(table.row_values("1001").unwrap(), vec!["1.49", "2.19", "1.99"]);

    let menu = fx.menu("1001").unwrap();
    let value: Vec<&str> = menu.categories[1]
        .items
        .iter()
        .map(|i| i.name.as_str())
        .collect();
    assert_eq!(value, vec!["Bean Burrito"]);
    assert_eq!(menu.item_count(), 3);
}

#[tokio::test]
async fn test_failed_table_write_leaves_no_checkpoint() {
    let fx = Fixture::new(&["1001"]);
    fx.site.page(&catalog_url("1001"), catalog_page(&["tacos"]));
    fx.site.page(&category_url("tacos", "1001"), category_page(&[("Taco", 1.99)]));
    std::fs::create_dir(fx.dir.path().join("menu.csv")).unwrap();

    let report = fx.run().await;

    assert_eq!(report.summary.succeeded, 0);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.failures[0].key, "1001");
    assert_eq!(report.failures[0].kind, "persist");
    assert!(fx.checkpoints.completed_keys(Stage::Menus).unwrap().is_empty());

    // Once the table is writable the store is crawled again
    std::fs::remove_dir(fx.dir.path().join("menu.csv")).unwrap();
    let retry = fx.run().await;
    assert_eq!(retry.summary.succeeded, 1);
    assert_eq!(fx.table().row_values("1001").unwrap(), vec!["1.99"]);
    assert!(fx.menu("1001").is_some());
}

#[tokio::test]
async fn test_failed_category_leaves_partial_store() {
    let fx = Fixture::new(&["1001", "1002"]);
    fx.site.page(&catalog_url("1001"), catalog_page(&["tacos", "drinks"]));
    fx.site.page(&category_url("tacos", "1001"), category_page(&[("Taco", 1.99)]));
    fx.site.fail(&category_url("drinks", "1001"));
    fx.site.page(&catalog_url("1002"), catalog_page(&["drinks"]));
    fx.site.page(&category_url("drinks", "1002"), category_page(&[("Soda", 1.49)]));

    let report = fx.run().await;

    assert_eq!(report.summary.succeeded, 2);
    assert_eq!(report.summary.failed, 0);
    let partial: Vec<&str> = report
        .failures
        .iter()
        .filter(|f| f.state == ItemState::Parsed)
        .map(|f| f.key.as_str())
        .collect();
    assert_eq!(partial, vec!["1001/drinks"]);

    let table = fx.table();
    assert_eq!(table.columns(), &["Soda", "Taco"]);
    assert_eq!(table.row_values("1001").unwrap(), vec!["", "1.99"]);
    assert_eq!(table.row_values("1002").unwrap(), vec!["1.49", ""]);

    let menu = fx.menu("1001").unwrap();
    assert_eq!(menu.failed_categories, vec!["drinks"]);
    assert_eq!(menu.categories.len(), 1);
}

#[tokio::test]
async fn test_store_root_failure_fails_whole_store() {
    let fx = Fixture::new(&["1001", "1002"]);
    fx.site.page(&catalog_url("1001"), catalog_page(&["tacos"]));
    fx.site.page(&category_url("tacos", "1001"), category_page(&[("Taco", 1.99)]));
    fx.site.fail(&catalog_url("1002"));

    let report = fx.run().await;

    assert_eq!(report.summary.succeeded, 1);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.failures[0].key, "1002");
    assert!(!fx.table().contains("1002"));
    assert!(fx.menu("1002").is_none());
    assert_eq!(fx.site.hits_matching("/food/"), 1);
}

#[tokio::test]
async fn test_every_category_failing_fails_the_store() {
    let fx = Fixture::new(&["1001"]);
    fx.site.page(&catalog_url("1001"), catalog_page(&["tacos", "drinks"]));
    fx.site.fail(&category_url("tacos", "1001"));
    fx.site.fail(&category_url("drinks", "1001"));

    let report = fx.run().await;

    assert_eq!(report.summary.failed, 1);
    assert!(fx.menu("1001").is_none());
    assert!(!fx.dir.path().join("menu.csv").exists());
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let fx = Fixture::new(&["1001", "1002", "1003"]);
    for (id, price) in [("1001", 1.99), ("1002", 1.89), ("1003", 2.09)] {
        fx.site.page(&catalog_url(id), catalog_page(&["tacos", "burritos"]));
        fx.site.page(&category_url("tacos", id), category_page(&[("Taco", price)]));
        fx.site.page(
            &category_url("burritos", id),
            category_page(&[("Burrito", price + 3.0), ("Taco", 9.99)]),
        );
    }

    fx.run().await;
    let first = fx.table_text();
    assert_eq!(fx.table().rows().len(), 3);

    fx.site.clear_hits();
    let report = fx.run().await;
    assert!(fx.site.hits().is_empty());
    assert_eq!(report.summary.skipped, 3);
    assert_eq!(fx.table_text(), first);

    // A store merged but not checkpointed is fetched again without changing the table
    std::fs::remove_file(
        fx.checkpoints
            .path_for(&StageKey::new(Stage::Menus, "1002")),
    )
    .unwrap();
    let report = fx.run().await;
    assert_eq!(report.summary.succeeded, 1);
    assert_eq!(fx.table_text(), first);
    assert!(fx.checkpoints.is_complete(&StageKey::new(Stage::Menus, "1002")));
}

#[tokio::test]
async fn test_customizations_are_followed_up() {
    let fx = Fixture::new(&["1001"]);
    fx.site.page(&catalog_url("1001"), catalog_page(&["tacos"]));
    fx.site.page(
        &category_url("tacos", "1001"),
        next_page(
            r#"{"products":[
                {"name":"Taco","price":{"value":1.99},"slug":"/food/tacos/taco","isCustomizable":true},
                {"name":"Taco Supreme","price":{"value":2.49},"slug":"/food/tacos/supreme","isCustomizable":true},
                {"name":"Soft Taco","price":{"value":2.19},"slug":"/food/tacos/soft"}
            ]}"#,
        ),
    );
    fx.site.page(
        "https://www.example.com/food/tacos/taco?store=1001",
        next_page(r#"{"product":{"ingredients":[{"name":"Sour Cream","price":{"value":0.6}}]}}"#),
    );
    fx.site.fail("https://www.example.com/food/tacos/supreme?store=1001");

    let report = fx.run().await;
    assert_eq!(report.summary.succeeded, 1);
    assert_eq!(fx.site.hits_matching("/food/tacos/soft"), 0);

    let menu = fx.menu("1001").unwrap();
    let items = &menu.categories[0].items;
    assert_eq!(
        items[0].customizations,
        vec![Customization {
            name: "Sour Cream".to_string(),
            price: Some(0.6),
            calories: None,
        }]
    );
    assert!(items[1].customizations.is_empty());
    assert_eq!(fx.table().columns().len(), 3);
}

/// Delegates to the locator parser but panics on one store's catalog
struct PanickingParser {
    store_id: &'static str,
}

impl PageParser for PanickingParser {
    fn parse_regions(&self, source: &str, page_url: &Url) -> Result<Vec<Region>, ParseError> {
        LocatorPageParser.parse_regions(source, page_url)
    }

    fn parse_sub_regions(
        &self,
        source: &str,
        page_url: &Url,
        region: &Region,
    ) -> Result<Vec<SubRegion>, ParseError> {
        LocatorPageParser.parse_sub_regions(source, page_url, region)
    }

    fn parse_store_links(
        &self,
        source: &str,
        page_url: &Url,
        sub_region: &SubRegion,
    ) -> Result<Vec<StoreLink>, ParseError> {
        LocatorPageParser.parse_store_links(source, page_url, sub_region)
    }

    fn parse_store_detail(
        &self,
        source: &str,
        page_url: &Url,
        link: &StoreLink,
    ) -> Result<Option<Store>, ParseError> {
        LocatorPageParser.parse_store_detail(source, page_url, link)
    }

    fn parse_categories(
        &self,
        source: &str,
        page_url: &Url,
        store_id: &str,
    ) -> Result<Vec<Category>, ParseError> {
        if store_id == self.store_id {
            panic!("unexpected catalog layout for {}", store_id);
        }
        LocatorPageParser.parse_categories(source, page_url, store_id)
    }

    fn parse_items(
        &self,
        source: &str,
        page_url: &Url,
        category: &Category,
    ) -> Result<Vec<ItemListing>, ParseError> {
        LocatorPageParser.parse_items(source, page_url, category)
    }

    fn parse_customizations(
        &self,
        source: &str,
        page_url: &Url,
    ) -> Result<Option<Vec<Customization>>, ParseError> {
        LocatorPageParser.parse_customizations(source, page_url)
    }
}

#[tokio::test]
async fn test_panicking_store_is_reported_as_failed() {
    let fx = Fixture::new(&["1001", "1002"]);
    for id in ["1001", "1002"] {
        fx.site.page(&catalog_url(id), catalog_page(&["tacos"]));
        fx.site.page(&category_url("tacos", id), category_page(&[("Taco", 1.99)]));
    }

    let report = fx
        .crawler_with(Arc::new(PanickingParser { store_id: "1002" }), Shutdown::new())
        .run()
        .await
        .unwrap();

    assert_eq!(report.summary.succeeded, 1);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.failures[0].key, "1002");
    assert_eq!(report.failures[0].kind, "panic");
    assert!(fx.table().contains("1001"));
    assert!(fx.menu("1002").is_none());
}

#[tokio::test]
async fn test_stop_before_start_cancels_everything() {
    let fx = Fixture::new(&["1001", "1002"]);
    let shutdown = Shutdown::new();
    shutdown.stop();

    let report = fx
        .crawler_with(Arc::new(LocatorPageParser), shutdown)
        .run()
        .await
        .unwrap();

    assert_eq!(report.summary.cancelled, 2);
    assert_eq!(report.summary.attempted(), 0);
    assert!(fx.site.hits().is_empty());
}

#[tokio::test]
async fn test_abort_leaves_no_checkpoint() {
    let fx = Fixture::new(&["1001", "1002"]);
    for id in ["1001", "1002"] {
        fx.site.page(&catalog_url(id), catalog_page(&["tacos"]));
        fx.site.delayed(
            &category_url("tacos", id),
            category_page(&[("Taco", 1.99)]),
            30_000,
        );
    }

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        trigger.signal();
        trigger.signal();
    });

    let report = fx
        .crawler_with(Arc::new(LocatorPageParser), shutdown)
        .run()
        .await
        .unwrap();

    assert_eq!(report.summary.cancelled, 2);
    assert!(fx.checkpoints.completed_keys(Stage::Menus).unwrap().is_empty());
    assert!(!fx.dir.path().join("menu.csv").exists());
}
