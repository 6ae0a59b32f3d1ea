//! End-to-end harvest tests
//!
//! Discovery, checkpointing, crawling and archive output against one mock site.

mod common;

use common::{
    fetcher, listing_html, page, sitemap_index_xml, start_page_html, test_config, urlset_xml,
};
use listing_harvester::config::Config;
use listing_harvester::crawler::{CrawlOptions, Harvester};
use listing_harvester::interpret::JsonLdInterpreter;
use listing_harvester::storage::{load_records, Archive};
use listing_harvester::HarvestError;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// One language `en` with two seeds: `a.com` (2 pages) and `b.com` (1 page)
async fn mount_site(server: &MockServer, discovery_calls: u64) {
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(start_page_html(&[("en", "English")])))
        .expect(discovery_calls)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sitemaps/index_en.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sitemap_index_xml(&[format!(
            "{}/sitemaps/en/1.xml",
            base
        )])))
        .expect(discovery_calls)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sitemaps/en/1.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(urlset_xml(&[
            (format!("{}/review/a.com", base), Some("2024-04-01")),
            (format!("{}/review/b.com", base), None),
            (format!("{}/blog/post", base), None),
        ])))
        .expect(discovery_calls)
        .mount(server)
        .await;

    for (name, pages) in [("a.com", 2), ("b.com", 1)] {
        for n in 1..=pages {
            Mock::given(method("GET"))
                .and(path(format!("/review/{}", name)))
                .and(page(n))
                .respond_with(ResponseTemplate::new(200).set_body_string(listing_html(name, n)))
                .mount(server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path(format!("/review/{}", name)))
            .and(page(pages + 1))
            .respond_with(ResponseTemplate::new(404))
            .mount(server)
            .await;
    }
}

/// Start page, index and one sub-sitemap per element of `sitemaps` for `en`
async fn mount_discovery(server: &MockServer, sitemaps: &[Vec<(String, Option<&str>)>]) {
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(start_page_html(&[("en", "English")])))
        .mount(server)
        .await;

    let locs: Vec<String> = (1..=sitemaps.len())
        .map(|n| format!("{}/sitemaps/en/{}.xml", base, n))
        .collect();
    Mock::given(method("GET"))
        .and(path("/sitemaps/index_en.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(sitemap_index_xml(&locs)))
        .mount(server)
        .await;

    for (n, entries) in sitemaps.iter().enumerate() {
        Mock::given(method("GET"))
            .and(path(format!("/sitemaps/en/{}.xml", n + 1)))
            .respond_with(ResponseTemplate::new(200).set_body_string(urlset_xml(entries)))
            .mount(server)
            .await;
    }
}

/// Listing at `at` with pages `1..=pages`, each fetched exactly once
async fn mount_listing(server: &MockServer, at: &str, pages: u32) {
    for n in 1..=pages {
        Mock::given(method("GET"))
            .and(path(at))
            .and(page(n))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing_html(at, n)))
            .expect(1)
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path(at))
        .and(page(pages + 1))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;
}

fn harvester(config: Config) -> Harvester<JsonLdInterpreter> {
    Harvester::with_interpreter(config, fetcher(3), JsonLdInterpreter::new())
        .with_config_hash("test-hash")
}

fn entry_names(archive: &Path) -> Vec<String> {
    let mut names = Archive::open(archive).unwrap().entry_names().unwrap();
    names.sort();
    names
}

#[tokio::test]
async fn test_harvest_discovers_crawls_and_archives() {
    let server = MockServer::start().await;
    mount_site(&server, 1).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());
    let options = CrawlOptions::from_config(&config);
    let harvester = harvester(config);

    let mut progress = Vec::new();
    let report = harvester
        .harvest("en", options, false, |stats| progress.push(stats.clone()))
        .await
        .unwrap();

    assert_eq!(report.records_written, 3);
    assert_eq!(progress.len(), 3);
    assert_eq!(progress.last().unwrap().pages_fetched, 3);
    assert_eq!(report.summary.seeds_exhausted, 2);
    assert_eq!(report.summary.seeds_available, 2);

    let file_name = report.archive_path.file_name().unwrap().to_str().unwrap();
    assert!(file_name.ends_with("-en-pages.sqlite"), "{}", file_name);
    assert_eq!(
        entry_names(&report.archive_path),
        vec!["a.com/1.json", "a.com/2.json", "b.com/1.json"]
    );

    let records = load_records(&report.archive_path).unwrap();
    let (_, a2) = records
        .iter()
        .find(|(name, _)| name == "a.com/2.json")
        .unwrap();
    assert_eq!(a2.page_number, 2);
    assert_eq!(a2.seed_last_modified.as_deref(), Some("2024-04-01"));
    assert_eq!(a2.content["jsonld"][0]["page"], 2);

    let archive = Archive::open(&report.archive_path).unwrap();
    assert_eq!(archive.meta("config_hash").unwrap().as_deref(), Some("test-hash"));
    assert_eq!(archive.meta("language").unwrap().as_deref(), Some("en"));

    assert!(harvester.checkpoints().load().unwrap().is_some());
}

#[tokio::test]
async fn test_second_run_reuses_checkpoint_and_new_archive() {
    let server = MockServer::start().await;
    // Discovery endpoints may only be hit by the first run
    mount_site(&server, 1).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());
    let harvester = harvester(config.clone());

    let first = harvester
        .harvest("en", CrawlOptions::from_config(&config), false, |_| {})
        .await
        .unwrap();
    let second = harvester
        .harvest("en", CrawlOptions::from_config(&config), false, |_| {})
        .await
        .unwrap();

    assert_ne!(first.archive_path, second.archive_path);
    assert!(second
        .archive_path
        .to_string_lossy()
        .ends_with("-en-pages-2.sqlite"));
    assert_eq!(entry_names(&first.archive_path), entry_names(&second.archive_path));
}

#[tokio::test]
async fn test_rediscover_runs_discovery_again() {
    let server = MockServer::start().await;
    mount_site(&server, 2).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());
    let harvester = harvester(config.clone());

    harvester.discover().await.unwrap();
    let report = harvester
        .harvest("en", CrawlOptions::from_config(&config), true, |_| {})
        .await
        .unwrap();

    assert_eq!(report.records_written, 3);
}

#[tokio::test]
async fn test_unknown_language_is_rejected() {
    let server = MockServer::start().await;
    mount_site(&server, 1).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&server.uri(), dir.path());
    let harvester = harvester(config.clone());

    let result = harvester
        .harvest("fr", CrawlOptions::from_config(&config), false, |_| {})
        .await;

    assert!(matches!(result, Err(HarvestError::UnknownLanguage(lang)) if lang == "fr"));
    assert!(!config.output.data_dir.exists());
}

#[tokio::test]
async fn test_page_cap_from_config() {
    let server = MockServer::start().await;
    mount_site(&server, 1).await;

    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server.uri(), dir.path());
    config.crawl.max_pages_per_seed = Some(1);
    let harvester = harvester(config.clone());

    let report = harvester
        .harvest("en", CrawlOptions::from_config(&config), false, |_| {})
        .await
        .unwrap();

    assert_eq!(report.records_written, 2);
    assert_eq!(report.summary.seeds_capped, 2);
    assert_eq!(
        entry_names(&report.archive_path),
        vec!["a.com/1.json", "b.com/1.json"]
    );
}

#[tokio::test]
async fn test_seed_listed_in_two_sitemaps_is_harvested_once() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_discovery(
        &server,
        &[
            vec![
                (format!("{}/review/a.com", base), Some("2024-04-01")),
                (format!("{}/review/b.com", base), None),
            ],
            vec![(format!("{}/review/a.com", base), Some("2024-09-09"))],
        ],
    )
    .await;
    mount_listing(&server, "/review/a.com", 2).await;
    mount_listing(&server, "/review/b.com", 1).await;

    let dir = TempDir::new().unwrap();
    let config = test_config(&base, dir.path());
    let harvester = harvester(config.clone());

    let report = harvester
        .harvest("en", CrawlOptions::from_config(&config), false, |_| {})
        .await
        .unwrap();

    let snapshot = harvester.checkpoints().load().unwrap().unwrap().snapshot;
    let seeds = snapshot.seeds("en").unwrap();
    assert_eq!(seeds.len(), 2);
    assert_eq!(seeds[0].last_modified.as_deref(), Some("2024-04-01"));
    assert_eq!(snapshot.language_overview[0].seed_count, 2);

    assert_eq!(report.records_written, 3);
    assert_eq!(report.records_skipped, 0);
    assert_eq!(
        entry_names(&report.archive_path),
        vec!["a.com/1.json", "a.com/2.json", "b.com/1.json"]
    );
}

#[tokio::test]
async fn test_colliding_entry_names_do_not_abort_harvest() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_discovery(
        &server,
        &[vec![
            (format!("{}/review/x", base), None),
            (format!("{}/categories/x", base), None),
            (format!("{}/review/y", base), None),
        ]],
    )
    .await;
    mount_listing(&server, "/review/x", 1).await;
    mount_listing(&server, "/categories/x", 1).await;
    mount_listing(&server, "/review/y", 1).await;

    let dir = TempDir::new().unwrap();
    let mut config = test_config(&base, dir.path());
    config.site.seed_markers.push("/categories/".to_string());
    let harvester = harvester(config.clone());

    let report = harvester
        .harvest("en", CrawlOptions::from_config(&config), false, |_| {})
        .await
        .unwrap();

    assert_eq!(report.records_written, 2);
    assert_eq!(report.records_skipped, 1);
    assert_eq!(report.summary.seeds_exhausted, 3);
    assert_eq!(entry_names(&report.archive_path), vec!["x/1.json", "y/1.json"]);
}
