//! Integration tests for the frontier scheduler
//!
//! Each test mounts listing seeds on a mock server and drains the frontier.

mod common;

use common::{fetcher, listing_html, page, seed};
use listing_harvester::crawler::{CrawlOptions, Frontier};
use listing_harvester::discovery::SeedUrl;
use listing_harvester::interpret::JsonLdInterpreter;
use listing_harvester::output::CrawlStats;
use listing_harvester::state::{FailureReason, SeedState};
use listing_harvester::storage::PageRecord;
use std::collections::{BTreeMap, HashMap};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mounts a seed whose pages `1..=pages` exist and page `pages + 1` is a 404
async fn mount_seed(server: &MockServer, name: &str, pages: u32) {
    for n in 1..=pages {
        Mock::given(method("GET"))
            .and(path(format!("/review/{}", name)))
            .and(query_param("sort", "recency"))
            .and(page(n))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing_html(name, n)))
            .expect(1)
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

fn options() -> CrawlOptions {
    CrawlOptions {
        fixed_params: BTreeMap::from([("sort".to_string(), "recency".to_string())]),
        ..Default::default()
    }
}

async fn drain(
    frontier: &mut Frontier<'_, JsonLdInterpreter>,
) -> Vec<(PageRecord, CrawlStats)> {
    let mut emitted = Vec::new();
    while let Some(item) = frontier.next_record().await {
        emitted.push(item);
    }
    emitted
}

/// Emitted page numbers per seed, in emission order
fn pages_by_seed(emitted: &[(PageRecord, CrawlStats)]) -> HashMap<String, Vec<u32>> {
    let mut pages: HashMap<String, Vec<u32>> = HashMap::new();
    for (record, _) in emitted {
        pages
            .entry(record.seed_url.clone())
            .or_default()
            .push(record.page_number);
    }
    pages
}

#[tokio::test]
async fn test_404_ends_pagination_cleanly() {
    let server = MockServer::start().await;
    mount_seed(&server, "shop.com", 2).await;

    let fetcher = fetcher(3);
    let interpreter = JsonLdInterpreter::new();
    let seeds = vec![seed(&server.uri(), "shop.com")];
    let mut frontier = Frontier::new(&fetcher, &interpreter, &seeds, options());

    let emitted = drain(&mut frontier).await;

    assert_eq!(emitted.len(), 2);
    assert_eq!(emitted[0].0.page_number, 1);
    assert_eq!(emitted[1].0.page_number, 2);
    assert_eq!(
        frontier.seed_state(&seeds[0].url),
        Some(&SeedState::Exhausted {
            pages: 2,
            capped: false
        })
    );
    assert!(frontier.is_finished());
}

#[tokio::test]
async fn test_record_carries_seed_metadata_and_content() {
    let server = MockServer::start().await;
    mount_seed(&server, "shop.com", 1).await;

    let fetcher = fetcher(3);
    let interpreter = JsonLdInterpreter::new();
    let seeds = vec![seed(&server.uri(), "shop.com")];
    let mut frontier = Frontier::new(&fetcher, &interpreter, &seeds, options());

    let (record, stats) = frontier.next_record().await.unwrap();

    assert_eq!(record.seed_url, seeds[0].url);
    assert_eq!(record.seed_last_modified.as_deref(), Some("2024-05-01"));
    assert_eq!(record.page_number, 1);
    assert_eq!(
        record.response_url,
        format!("{}/review/shop.com?sort=recency", server.uri())
    );
    assert!(record.response_headers.contains_key("content-type"));
    assert_eq!(record.content["jsonld"][0]["name"], "shop.com");

    assert_eq!(stats.seeds_started, 1);
    assert_eq!(stats.pages_fetched, 1);
    assert_eq!(stats.current_page, 1);
    assert_eq!(stats.current_seed, seeds[0].url);

    assert!(frontier.next_record().await.is_none());
}

#[tokio::test]
async fn test_page_cap_stops_every_seed() {
    let server = MockServer::start().await;
    for name in ["a.com", "b.com", "c.com"] {
        for n in 1..=2 {
            Mock::given(method("GET"))
                .and(path(format!("/review/{}", name)))
                .and(page(n))
                .respond_with(ResponseTemplate::new(200).set_body_string(listing_html(name, n)))
                .expect(1)
                .mount(&server)
                .await;
        }
        // Page 3 exists but must never be requested
        Mock::given(method("GET"))
            .and(path(format!("/review/{}", name)))
            .and(page(3))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing_html(name, 3)))
            .expect(0)
            .mount(&server)
            .await;
    }

    let fetcher = fetcher(3);
    let interpreter = JsonLdInterpreter::new();
    let seeds: Vec<SeedUrl> = ["a.com", "b.com", "c.com"]
        .iter()
        .map(|name| seed(&server.uri(), name))
        .collect();
    let mut frontier = Frontier::new(
        &fetcher,
        &interpreter,
        &seeds,
        CrawlOptions {
            max_pages_per_seed: Some(2),
            ..options()
        },
    );

    let emitted = drain(&mut frontier).await;

    assert_eq!(emitted.len(), 6);
    for pages in pages_by_seed(&emitted).values() {
        assert_eq!(pages, &vec![1, 2]);
    }
    for seed in &seeds {
        assert_eq!(
            frontier.seed_state(&seed.url),
            Some(&SeedState::Exhausted {
                pages: 2,
                capped: true
            })
        );
    }
    assert_eq!(frontier.summary().seeds_capped, 3);
}

#[tokio::test]
async fn test_limit_restricts_crawl_to_subset() {
    let server = MockServer::start().await;
    let names = ["a.com", "b.com", "c.com", "d.com", "e.com"];
    for name in names {
        Mock::given(method("GET"))
            .and(path(format!("/review/{}", name)))
            .and(page(1))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing_html(name, 1)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/review/{}", name)))
            .and(page(2))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
    }

    let fetcher = fetcher(3);
    let interpreter = JsonLdInterpreter::new();
    let seeds: Vec<SeedUrl> = names.iter().map(|name| seed(&server.uri(), name)).collect();
    let mut frontier = Frontier::new(
        &fetcher,
        &interpreter,
        &seeds,
        CrawlOptions {
            limit: Some(2),
            ..options()
        },
    );

    let emitted = drain(&mut frontier).await;

    assert_eq!(emitted.len(), 2);
    assert_eq!(pages_by_seed(&emitted).len(), 2);
    for (_, stats) in &emitted {
        assert_eq!(stats.seeds_total, 2);
        assert_eq!(stats.seeds_available, 5);
    }

    let summary = frontier.summary();
    assert_eq!(summary.seeds_total, 2);
    assert_eq!(summary.seeds_available, 5);
    assert_eq!(summary.seeds_exhausted, 2);

    // Only the two chosen seeds were touched
    let requested = server.received_requests().await.unwrap();
    assert_eq!(requested.len(), 4);
}

#[tokio::test]
async fn test_seeds_are_interleaved_round_robin() {
    let server = MockServer::start().await;
    mount_seed(&server, "a.com", 3).await;
    mount_seed(&server, "b.com", 3).await;

    let fetcher = fetcher(3);
    let interpreter = JsonLdInterpreter::new();
    let seeds = vec![seed(&server.uri(), "a.com"), seed(&server.uri(), "b.com")];
    let mut frontier = Frontier::new(&fetcher, &interpreter, &seeds, options());

    let emitted = drain(&mut frontier).await;
    let order: Vec<_> = emitted
        .iter()
        .map(|(record, _)| (record.seed_url.as_str(), record.page_number))
        .collect();

    assert_eq!(order.len(), 6);
    let (first, second) = (order[0].0, order[1].0);
    assert_ne!(first, second);
    assert_eq!(
        order,
        vec![
            (first, 1),
            (second, 1),
            (first, 2),
            (second, 2),
            (first, 3),
            (second, 3)
        ]
    );

    // Stats stay consistent with what was emitted
    for (i, (_, stats)) in emitted.iter().enumerate() {
        assert_eq!(stats.pages_fetched, i as u64 + 1);
        assert_eq!(stats.seeds_started, 2.min(i + 1));
        assert_eq!(stats.seeds_finished, 0);
    }
}

#[tokio::test]
async fn test_redirect_mismatch_fails_only_that_seed() {
    let server = MockServer::start().await;
    mount_seed(&server, "good.com", 1).await;
    Mock::given(method("GET"))
        .and(path("/review/stale.com"))
        .respond_with(
            ResponseTemplate::new(301)
                .insert_header("location", format!("{}/review/renamed.com", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/review/renamed.com"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_html("renamed.com", 1)))
        .mount(&server)
        .await;

    let fetcher = fetcher(3);
    let interpreter = JsonLdInterpreter::new();
    let seeds = vec![seed(&server.uri(), "stale.com"), seed(&server.uri(), "good.com")];
    let mut frontier = Frontier::new(&fetcher, &interpreter, &seeds, options());

    let emitted = drain(&mut frontier).await;

    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].0.seed_url, seeds[1].url);
    assert!(matches!(
        frontier.seed_state(&seeds[0].url),
        Some(SeedState::Failed {
            pages: 0,
            reason: FailureReason::RedirectMismatch { .. }
        })
    ));
    assert_eq!(frontier.summary().redirect_mismatches(), 1);
}

#[tokio::test]
async fn test_retry_exhaustion_fails_seed_after_emitted_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/review/flaky.com"))
        .and(page(1))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_html("flaky.com", 1)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/review/flaky.com"))
        .and(page(2))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let fetcher = fetcher(3);
    let interpreter = JsonLdInterpreter::new();
    let seeds = vec![seed(&server.uri(), "flaky.com")];
    let mut frontier = Frontier::new(&fetcher, &interpreter, &seeds, options());

    let emitted = drain(&mut frontier).await;

    assert_eq!(emitted.len(), 1);
    assert_eq!(
        frontier.seed_state(&seeds[0].url),
        Some(&SeedState::Failed {
            pages: 1,
            reason: FailureReason::RetryExhausted { attempts: 3 }
        })
    );
}

#[tokio::test]
async fn test_unreadable_page_fails_seed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/review/broken.com"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><head><script type="application/ld+json">{"name": </script></head></html>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher(3);
    let interpreter = JsonLdInterpreter::new();
    let seeds = vec![seed(&server.uri(), "broken.com")];
    let mut frontier = Frontier::new(&fetcher, &interpreter, &seeds, options());

    assert!(frontier.next_record().await.is_none());
    assert!(matches!(
        frontier.seed_state(&seeds[0].url),
        Some(SeedState::Failed {
            reason: FailureReason::Fatal(_),
            ..
        })
    ));
}

#[tokio::test]
async fn test_forbidden_page_fails_seed_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/review/private.com"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;
    mount_seed(&server, "public.com", 2).await;

    let fetcher = fetcher(3);
    let interpreter = JsonLdInterpreter::new();
    let seeds = vec![
        seed(&server.uri(), "private.com"),
        seed(&server.uri(), "public.com"),
    ];
    let mut frontier = Frontier::new(&fetcher, &interpreter, &seeds, options());

    let emitted = drain(&mut frontier).await;

    assert_eq!(emitted.len(), 2);
    let summary = frontier.summary();
    assert_eq!(summary.seeds_exhausted, 1);
    assert_eq!(summary.seeds_failed.get("fatal"), Some(&1));
}

#[tokio::test]
async fn test_repeated_seed_is_crawled_once() {
    let server = MockServer::start().await;
    mount_seed(&server, "a.com", 2).await;
    mount_seed(&server, "b.com", 1).await;

    let fetcher = fetcher(3);
    let interpreter = JsonLdInterpreter::new();
    let seeds = vec![
        seed(&server.uri(), "a.com"),
        seed(&server.uri(), "b.com"),
        SeedUrl {
            last_modified: Some("2030-01-01".to_string()),
            ..seed(&server.uri(), "a.com")
        },
    ];
    let mut frontier = Frontier::new(&fetcher, &interpreter, &seeds, options());

    let emitted = drain(&mut frontier).await;

    assert_eq!(frontier.seeds_total(), 2);
    assert_eq!(emitted.len(), 3);
    let pages = pages_by_seed(&emitted);
    assert_eq!(pages[&seeds[0].url], vec![1, 2]);
    assert_eq!(pages[&seeds[1].url], vec![1]);
    for (record, _) in &emitted {
        assert_ne!(record.seed_last_modified.as_deref(), Some("2030-01-01"));
    }
}
