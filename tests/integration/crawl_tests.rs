//! End-to-end runs against a mock HTTP server
//!
//! These tests use wiremock to serve a small store locator and catalog and
//! drive whole commands through the coordinator.

mod common;

use common::{catalog_page, category_page, directory_page, store_list_page, store_page};
use menu_atlas::checkpoint::{CheckpointStore, Stage};
use menu_atlas::config::{Config, CrawlerConfig, OutputConfig, SiteConfig, UserAgentConfig};
use menu_atlas::crawler::{Command, Coordinator, Shutdown};
use menu_atlas::output::MergedTable;
use menu_atlas::storage::{RunLedger, RunStatus};
use menu_atlas::Store;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STORES: [(&str, &str, &str); 3] = [
    ("/ak/anchorage/1001.html", "Old Seward", "1001"),
    ("/ak/anchorage/1002.html", "Muldoon", "1002"),
    ("/al/mobile/2001.html", "Airport Blvd", "2001"),
];

/// Creates a test configuration pointing both roots at the mock server
fn create_test_config(base_url: &str, data_dir: &Path) -> Config {
    Config {
        site: SiteConfig {
            directory_root: format!("{}/index.html", base_url),
            catalog_root: format!("{}/food", base_url),
        },
        crawler: CrawlerConfig {
            directory_workers: 2,
            store_workers: 1,
            category_workers: 2,
            polite_delay_ms: 0,
            request_timeout_secs: 5,
            respect_robots: true,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            data_dir: data_dir.to_path_buf(),
            ledger_path: None,
        },
    }
}

async fn serve(server: &MockServer, page: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

async fn serve_for_store(server: &MockServer, page: &str, store_id: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page))
        .and(query_param("store", store_id))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

/// Mounts the locator and catalog of three stores in two regions
async fn mount_site(server: &MockServer, robots: &str) {
    serve(server, "/robots.txt", robots.to_string()).await;

    serve(
        server,
        "/index.html",
        directory_page(&[("/ak.html", "Alaska"), ("/al.html", "Alabama")]),
    )
    .await;
    serve(server, "/ak.html", directory_page(&[("/ak/anchorage.html", "Anchorage")])).await;
    serve(server, "/al.html", directory_page(&[("/al/mobile.html", "Mobile")])).await;
    serve(
        server,
        "/ak/anchorage.html",
        store_list_page(&[(STORES[0].0, STORES[0].1), (STORES[1].0, STORES[1].1)]),
    )
    .await;
    serve(server, "/al/mobile.html", store_list_page(&[(STORES[2].0, STORES[2].1)])).await;

    for (i, (page, _, id)) in STORES.iter().enumerate() {
        serve(server, page, store_page(id, 61.1 + i as f64, -149.8)).await;

        let cents = i as f64 / 10.0;
        serve_for_store(server, "/food", id, catalog_page(&["tacos", "drinks"])).await;
        serve_for_store(
            server,
            "/food/tacos",
            id,
            category_page(&[("Taco", 1.79 + cents), ("Soft Taco", 1.99 + cents)]),
        )
        .await;
        serve_for_store(server, "/food/drinks", id, category_page(&[("Soda", 1.29)])).await;
    }
}

async fn run_command(config: Config, command: Command) -> Coordinator {
    let mut coordinator = Coordinator::from_config(config, Shutdown::new()).unwrap();
    coordinator.begin_run("test-hash", command).unwrap();
    let result = coordinator.execute(command).await;
    assert!(result.is_ok(), "{} failed: {:?}", command.name(), result);
    let status = coordinator.finish(&result).unwrap();
    assert_eq!(status, RunStatus::Completed);
    coordinator
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap_or_default().len()
}

#[tokio::test]
async fn test_full_crawl() {
    let mock_server = MockServer::start().await;
    mount_site(&mock_server, "User-agent: *\nAllow: /").await;
    let data = TempDir::new().unwrap();
    let config = create_test_config(&mock_server.uri(), data.path());

    let coordinator = run_command(config, Command::All).await;

    let checkpoints = coordinator.checkpoints();
    assert_eq!(checkpoints.completed_keys(Stage::Regions).unwrap(), vec!["root"]);
    assert_eq!(checkpoints.completed_keys(Stage::SubRegions).unwrap(), vec!["ak", "al"]);
    assert_eq!(
        checkpoints.completed_keys(Stage::StoreLinks).unwrap(),
        vec!["ak/anchorage", "al/mobile"]
    );
    assert_eq!(checkpoints.completed_keys(Stage::Stores).unwrap().len(), 3);
    assert_eq!(
        checkpoints.completed_keys(Stage::Menus).unwrap(),
        vec!["1001", "1002", "2001"]
    );

    let table = MergedTable::read(&data.path().join("menu.csv")).unwrap();
    assert_eq!(table.columns(), &["Soda", "Soft Taco", "Taco"]);
    assert_eq!(table.row_values("1001").unwrap(), vec!["1.29", "1.99", "1.79"]);
    assert_eq!(table.row_values("2001").unwrap(), vec!["1.29", "2.19", "1.99"]);

    let located: Vec<Store> =
        serde_json::from_slice(&std::fs::read(data.path().join("locations.json")).unwrap()).unwrap();
    assert_eq!(located.len(), 3);
    assert!(data.path().join("locations").join("ak.json").exists());
    assert!(data.path().join("locations").join("al.json").exists());

    let ledger = coordinator.ledger();
    let run = ledger.latest_run().unwrap().unwrap();
    assert_eq!(run.command, "all");
    assert_eq!(run.status, RunStatus::Completed);
    let stages = ledger.stage_records(run.id).unwrap();
    let names: Vec<&str> = stages.iter().map(|s| s.stage.as_str()).collect();
    assert_eq!(names.len(), 4);
    assert!(stages.iter().all(|s| s.failed == 0));
    assert!(ledger.failures(run.id).unwrap().is_empty());
}

#[tokio::test]
async fn test_second_run_fetches_nothing() {
    let mock_server = MockServer::start().await;
    mount_site(&mock_server, "User-agent: *\nAllow: /").await;
    let data = TempDir::new().unwrap();

    run_command(create_test_config(&mock_server.uri(), data.path()), Command::All).await;
    let table_before = std::fs::read(data.path().join("menu.csv")).unwrap();
    let requests_before = request_count(&mock_server).await;

    let coordinator =
        run_command(create_test_config(&mock_server.uri(), data.path()), Command::All).await;

    assert_eq!(request_count(&mock_server).await, requests_before);
    assert_eq!(std::fs::read(data.path().join("menu.csv")).unwrap(), table_before);

    let run = coordinator.ledger().latest_run().unwrap().unwrap();
    let stages = coordinator.ledger().stage_records(run.id).unwrap();
    assert!(stages.iter().all(|s| s.succeeded == 0 && s.failed == 0));
}

#[tokio::test]
async fn test_robots_disallowed_region_stays_pending() {
    let mock_server = MockServer::start().await;
    mount_site(&mock_server, "User-agent: *\nDisallow: /al\n").await;
    let data = TempDir::new().unwrap();

    let coordinator =
        run_command(create_test_config(&mock_server.uri(), data.path()), Command::All).await;

    let checkpoints = coordinator.checkpoints();
    assert_eq!(checkpoints.completed_keys(Stage::SubRegions).unwrap(), vec!["ak"]);
    assert_eq!(
        checkpoints.completed_keys(Stage::Menus).unwrap(),
        vec!["1001", "1002"]
    );

    let ledger = coordinator.ledger();
    let run = ledger.latest_run().unwrap().unwrap();
    let failures = ledger.failures(run.id).unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].item_key, "al");
    assert_eq!(failures[0].kind, "blocked");

    let stats = coordinator.status().unwrap();
    assert_eq!(stats.table_rows, 2);
    assert_eq!(stats.to_retry.len(), 1);
}

#[tokio::test]
async fn test_rebuild_table_from_menus() {
    let mock_server = MockServer::start().await;
    mount_site(&mock_server, "User-agent: *\nAllow: /").await;
    let data = TempDir::new().unwrap();
    let table_path = data.path().join("menu.csv");

    run_command(create_test_config(&mock_server.uri(), data.path()), Command::All).await;
    let original = MergedTable::read(&table_path).unwrap();

    std::fs::remove_file(&table_path).unwrap();
    let requests_before = request_count(&mock_server).await;
    run_command(
        create_test_config(&mock_server.uri(), data.path()),
        Command::RebuildTable,
    )
    .await;

    assert_eq!(request_count(&mock_server).await, requests_before);
    let rebuilt = MergedTable::read(&table_path).unwrap();
    assert_eq!(rebuilt.columns(), original.columns());
    for id in ["1001", "1002", "2001"] {
        assert_eq!(rebuilt.row_values(id), original.row_values(id));
    }
}

#[tokio::test]
async fn test_limit_caps_catalog_stage() {
    let mock_server = MockServer::start().await;
    mount_site(&mock_server, "User-agent: *\nAllow: /").await;
    let data = TempDir::new().unwrap();

    run_command(
        create_test_config(&mock_server.uri(), data.path()),
        Command::Directory,
    )
    .await;

    let mut coordinator =
        Coordinator::from_config(create_test_config(&mock_server.uri(), data.path()), Shutdown::new())
            .unwrap()
            .with_limit(Some(2));
    coordinator.execute(Command::Catalog).await.unwrap();

    assert_eq!(
        coordinator.checkpoints().completed_keys(Stage::Menus).unwrap(),
        vec!["1001", "1002"]
    );
    let table = MergedTable::read(&data.path().join("menu.csv")).unwrap();
    assert_eq!(table.rows().len(), 2);
}
