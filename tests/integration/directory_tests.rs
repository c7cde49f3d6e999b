//! Directory discovery against an in-memory site

mod common;

use common::*;
use menu_atlas::checkpoint::{CheckpointStore, CheckpointStoreExt, FsCheckpointStore, Stage, StageKey};
use menu_atlas::crawler::{DirectoryCrawler, Shutdown};
use menu_atlas::model::Store;
use menu_atlas::output::resolved_stores;
use menu_atlas::parse::LocatorPageParser;
use menu_atlas::AtlasError;
use std::sync::Arc;
use tempfile::TempDir;
use url::Url;

const LOC: &str = "https://locations.example.com";

fn serve_directory(site: &FakeSite) {
    site.page(
        DIRECTORY_ROOT,
        directory_page(&[("ak.html", "Alaska"), ("al.html", "Alabama")]),
    );
    site.page(
        &format!("{}/ak.html", LOC),
        directory_page(&[("/ak/anchorage.html", "Anchorage"), ("/ak/juneau.html", "Juneau")]),
    );
    site.page(
        &format!("{}/al.html", LOC),
        directory_page(&[("/al/mobile.html", "Mobile")]),
    );
    site.page(
        &format!("{}/ak/anchorage.html", LOC),
        store_list_page(&[
            ("/ak/anchorage/old-seward.html", "Old Seward Hwy"),
            ("/ak/anchorage/muldoon.html", "Muldoon Rd"),
        ]),
    );
    site.page(
        &format!("{}/ak/juneau.html", LOC),
        store_list_page(&[("/ak/juneau/egan.html", "Egan Dr")]),
    );
    site.page(
        &format!("{}/al/mobile.html", LOC),
        store_list_page(&[("/al/mobile/dauphin.html", "Dauphin St")]),
    );
    site.page(&format!("{}/ak/anchorage/old-seward.html", LOC), store_page("1001", 61.14, -149.86));
    site.page(&format!("{}/ak/anchorage/muldoon.html", LOC), store_page("1002", 61.22, -149.73));
    site.page(&format!("{}/ak/juneau/egan.html", LOC), store_page("1003", 58.36, -134.58));
    site.page(&format!("{}/al/mobile/dauphin.html", LOC), store_page("2001", 30.69, -88.04));
}

fn crawler(site: &Arc<FakeSite>, checkpoints: &Arc<FsCheckpointStore>) -> DirectoryCrawler {
    DirectoryCrawler::new(
        Url::parse(DIRECTORY_ROOT).unwrap(),
        site.clone(),
        Arc::new(LocatorPageParser),
        checkpoints.clone(),
        &crawler_config(2),
        Shutdown::new(),
    )
}

#[tokio::test]
async fn test_full_directory_walk() {
    let dir = TempDir::new().unwrap();
    let checkpoints = Arc::new(FsCheckpointStore::open(dir.path()).unwrap());
    let site = Arc::new(FakeSite::new());
    serve_directory(&site);

    let reports = crawler(&site, &checkpoints).run().await.unwrap();

    assert_eq!(reports.len(), 3);
    for report in &reports {
        assert_eq!(report.summary.failed, 0, "{:?}", report.failures);
    }
    assert_eq!(reports[0].summary.succeeded, 2);
    assert_eq!(reports[1].summary.succeeded, 3);
    assert_eq!(reports[2].summary.succeeded, 4);

    let store: Store = checkpoints
        .load(&StageKey::new(Stage::Stores, "ak/anchorage/old-seward"))
        .unwrap()
        .unwrap();
    assert_eq!(store.store_id, "1001");
    assert_eq!(store.display_name, "Old Seward Hwy");
    assert_eq!(store.region, "ak");
    assert_eq!(store.sub_region, "ak/anchorage");
    assert!(store.coordinates.is_some());

    let ids: Vec<String> = resolved_stores(&*checkpoints)
        .unwrap()
        .into_iter()
        .map(|s| s.store_id)
        .collect();
    assert_eq!(ids.len(), 4);
}

#[tokio::test]
async fn test_completed_region_is_not_fetched_again() {
    let dir = TempDir::new().unwrap();
    let checkpoints = Arc::new(FsCheckpointStore::open(dir.path()).unwrap());
    let site = Arc::new(FakeSite::new());
    serve_directory(&site);
    site.fail(&format!("{}/al.html", LOC));

    let first = crawler(&site, &checkpoints).run().await.unwrap();
    assert_eq!(first[0].summary.failed, 1);
    assert_eq!(first[0].failures[0].key, "al");
    assert_eq!(first[0].failures[0].kind, "transient");
    assert!(checkpoints.is_complete(&StageKey::new(Stage::SubRegions, "ak")));
    assert!(!checkpoints.is_complete(&StageKey::new(Stage::SubRegions, "al")));

    // The region page recovers; everything under Alaska is already done
    serve_directory(&site);
    site.clear_hits();

    let second = crawler(&site, &checkpoints).run().await.unwrap();

    assert_eq!(site.hits_matching("/ak"), 0, "{:?}", site.hits());
    assert_eq!(site.hits_matching("index.html"), 0);
    assert_eq!(
        site.hits(),
        vec![
            format!("{}/al.html", LOC),
            format!("{}/al/mobile.html", LOC),
            format!("{}/al/mobile/dauphin.html", LOC),
        ]
    );
    assert_eq!(second[0].summary.skipped, 1);
    assert_eq!(second[0].summary.succeeded, 1);
    assert_eq!(second[2].summary.skipped, 3);
    assert_eq!(checkpoints.completed_keys(Stage::Stores).unwrap().len(), 4);
}

#[tokio::test]
async fn test_failed_checkpoint_write_fails_the_item() {
    let dir = TempDir::new().unwrap();
    let checkpoints = Arc::new(FsCheckpointStore::open(dir.path()).unwrap());
    let site = Arc::new(FakeSite::new());
    serve_directory(&site);

    // A plain file where the stage directory should be
    let stage_dir = dir.path().join("sub-regions");
    std::fs::remove_dir(&stage_dir).unwrap();
    std::fs::write(&stage_dir, "not a directory").unwrap();

    let report = crawler(&site, &checkpoints).crawl_regions().await.unwrap();

    assert_eq!(report.summary.succeeded, 0);
    assert_eq!(report.summary.failed, 2);
    assert!(report.failures.iter().all(|f| f.kind == "persist"), "{:?}", report.failures);
    for region in ["ak", "al"] {
        assert!(!checkpoints.is_complete(&StageKey::new(Stage::SubRegions, region)));
    }
}

#[tokio::test]
async fn test_unreachable_root_is_fatal() {
    let dir = TempDir::new().unwrap();
    let checkpoints = Arc::new(FsCheckpointStore::open(dir.path()).unwrap());
    let site = Arc::new(FakeSite::new());

    let err = crawler(&site, &checkpoints).run().await.unwrap_err();
    assert!(matches!(err, AtlasError::Bootstrap { .. }));

    site.page(DIRECTORY_ROOT, directory_page(&[]));
    let err = crawler(&site, &checkpoints).bootstrap().await.unwrap_err();
    assert!(matches!(err, AtlasError::Bootstrap { .. }));
    assert!(checkpoints.completed_keys(Stage::Regions).unwrap().is_empty());
}

#[tokio::test]
async fn test_store_page_without_id_stays_pending() {
    let dir = TempDir::new().unwrap();
    let checkpoints = Arc::new(FsCheckpointStore::open(dir.path()).unwrap());
    let site = Arc::new(FakeSite::new());
    serve_directory(&site);
    site.page(
        &format!("{}/ak/juneau/egan.html", LOC),
        "<html><body><p>Temporarily closed</p></body></html>",
    );

    let reports = crawler(&site, &checkpoints).run().await.unwrap();
    let stores = &reports[2];

    assert_eq!(stores.summary.succeeded, 3);
    assert_eq!(stores.summary.failed, 1);
    assert_eq!(stores.failures[0].key, "ak/juneau/egan");
    assert_eq!(stores.failures[0].kind, "parse");
    assert!(!checkpoints.is_complete(&StageKey::new(Stage::Stores, "ak/juneau/egan")));
}

#[tokio::test]
async fn test_limit_caps_each_stage() {
    let dir = TempDir::new().unwrap();
    let checkpoints = Arc::new(FsCheckpointStore::open(dir.path()).unwrap());
    let site = Arc::new(FakeSite::new());
    serve_directory(&site);

    let first = crawler(&site, &checkpoints)
        .with_limit(Some(1))
        .crawl_regions()
        .await
        .unwrap();
    assert_eq!(first.summary.pending, 1);
    assert_eq!(first.summary.succeeded, 1);

    let second = crawler(&site, &checkpoints)
        .with_limit(Some(1))
        .crawl_regions()
        .await
        .unwrap();
    assert_eq!(second.summary.skipped, 1);
    assert_eq!(second.summary.succeeded, 1);
    assert_eq!(checkpoints.completed_keys(Stage::SubRegions).unwrap(), vec!["ak", "al"]);
}
