//! End-to-end crawl tests: scripted driver in, report and persisted store
//! out.

use std::path::Path;

use murmur_common::{CancelToken, MurmurError, Record};

use crate::crawl::{CrawlOptions, Crawler};
use crate::failover::SourceFailover;
use crate::pacing::Pacing;
use crate::query::SearchQuery;
use crate::snapshot::Snapshots;
use crate::store::{self, RecordStore};
use crate::testing::{frag, page_spec, record, MockDriver};

const ENDPOINT: &str = "https://nitter.net";
const FALLBACK: &str = "https://nitter.example";

fn crawler(dir: &Path, endpoints: &[&str]) -> Crawler {
    Crawler::new(
        SourceFailover::new(endpoints.iter().map(|e| e.to_string()).collect()),
        RecordStore::new(dir.join("posts.json")),
        Pacing::zero(),
        Snapshots::new(dir.join("snapshots")),
    )
}

fn opts(target: usize) -> CrawlOptions {
    CrawlOptions {
        target_count: target,
        ..CrawlOptions::default()
    }
}

fn load(dir: &Path) -> Vec<Record> {
    RecordStore::new(dir.join("posts.json")).load()
}

#[tokio::test]
async fn two_page_crawl_collects_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let driver = MockDriver::new()
        .page(
            page_spec("page-one")
                .fragment(frag().permalink("/a/status/1").author("@a").body("first"))
                .fragment(frag().permalink("/b/status/2").author("@b").body("second"))
                .with_load_more(),
        )
        .page(
            page_spec("page-two")
                .fragment(frag().permalink("/c/status/3").author("@c").body("third")),
        );

    let report = crawler(dir.path(), &[ENDPOINT])
        .run(
            &driver,
            &SearchQuery::keyword("test"),
            &opts(3),
            CancelToken::new(),
            None,
        )
        .await;

    assert!(report.success);
    assert_eq!(report.collected_count, 3);
    assert_eq!(report.pages, 2);
    assert_eq!(report.persisted_total, 3);
    assert_eq!(driver.clicks(), 1);

    let stored = load(dir.path());
    assert_eq!(stored.len(), 3);
    let ids: Vec<&str> = stored.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["1", "2", "3"]);
    assert!(stored.iter().all(|r| r.source_endpoint == ENDPOINT));
}

#[tokio::test]
async fn zero_target_never_touches_the_network() {
    let dir = tempfile::tempdir().unwrap();
    let driver = MockDriver::new();

    let report = crawler(dir.path(), &[ENDPOINT])
        .run(
            &driver,
            &SearchQuery::keyword("test"),
            &opts(0),
            CancelToken::new(),
            None,
        )
        .await;

    assert!(report.success);
    assert_eq!(report.collected_count, 0);
    assert!(driver.navigations().is_empty());
    assert_eq!(driver.clicks(), 0);
}

#[tokio::test]
async fn duplicate_fragments_are_counted_not_collected() {
    let dir = tempfile::tempdir().unwrap();
    let driver = MockDriver::new().page(
        page_spec("page")
            .fragment(frag().permalink("/a/status/1").author("@a").body("once"))
            .fragment(frag().permalink("/a/status/1").author("@a").body("again")),
    );

    let report = crawler(dir.path(), &[ENDPOINT])
        .with_empty_page_threshold(1)
        .run(
            &driver,
            &SearchQuery::keyword("test"),
            &opts(2),
            CancelToken::new(),
            None,
        )
        .await;

    assert!(report.success);
    assert_eq!(report.collected_count, 1);
    assert_eq!(report.duplicates, 1);
    assert_eq!(load(dir.path()).len(), 1);
}

#[tokio::test]
async fn stalled_pagination_stops_the_crawl() {
    let dir = tempfile::tempdir().unwrap();
    // Both pages serve byte-identical content: the transition "succeeds"
    // but nothing changed, which is the re-served-cache signature.
    let driver = MockDriver::new()
        .page(
            page_spec("same-content")
                .fragment(frag().permalink("/a/status/1").author("@a").body("x"))
                .with_load_more(),
        )
        .page(
            page_spec("same-content")
                .fragment(frag().permalink("/b/status/2").author("@b").body("y")),
        );

    let report = crawler(dir.path(), &[ENDPOINT])
        .with_empty_page_threshold(1)
        .run(
            &driver,
            &SearchQuery::keyword("test"),
            &opts(5),
            CancelToken::new(),
            None,
        )
        .await;

    assert!(report.success);
    assert_eq!(report.collected_count, 1);
    assert_eq!(report.pages, 1);
    assert!(driver
        .screenshots()
        .iter()
        .any(|p| p.contains("stalled_page_1")));
}

#[tokio::test]
async fn exhausted_failover_reports_unavailable_and_leaves_store_alone() {
    let dir = tempfile::tempdir().unwrap();
    let store = RecordStore::new(dir.path().join("posts.json"));
    store.save(&store::merge(Vec::new(), &[record("kept")])).unwrap();

    // No scripted pages: every endpoint times out waiting for results.
    let driver = MockDriver::new();

    let report = crawler(dir.path(), &[ENDPOINT, FALLBACK])
        .run(
            &driver,
            &SearchQuery::keyword("test"),
            &opts(5),
            CancelToken::new(),
            None,
        )
        .await;

    assert!(!report.success);
    assert!(matches!(
        report.failure,
        Some(MurmurError::SourceUnavailable { attempted: 2 })
    ));
    assert_eq!(driver.navigations().len(), 2);

    let stored = load(dir.path());
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, "kept");
}

#[tokio::test]
async fn failover_reaches_the_second_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let driver = MockDriver::new().dead_navigations(1).page(
        page_spec("page")
            .fragment(frag().permalink("/a/status/1").author("@a").body("hello")),
    );

    let report = crawler(dir.path(), &[ENDPOINT, FALLBACK])
        .run(
            &driver,
            &SearchQuery::keyword("test"),
            &opts(1),
            CancelToken::new(),
            None,
        )
        .await;

    assert!(report.success);
    assert_eq!(driver.navigations().len(), 2);
    assert!(driver.navigations()[1].starts_with(FALLBACK));

    let stored = load(dir.path());
    assert_eq!(stored[0].source_endpoint, FALLBACK);
}

#[tokio::test]
async fn fresh_start_discards_prior_records() {
    let dir = tempfile::tempdir().unwrap();
    let store = RecordStore::new(dir.path().join("posts.json"));
    store.save(&store::merge(Vec::new(), &[record("old")])).unwrap();

    let driver = MockDriver::new().page(
        page_spec("page")
            .fragment(frag().permalink("/a/status/1").author("@a").body("new")),
    );

    let report = crawler(dir.path(), &[ENDPOINT])
        .run(
            &driver,
            &SearchQuery::keyword("test"),
            &CrawlOptions {
                target_count: 1,
                fresh_start: true,
                ignore_existing: false,
            },
            CancelToken::new(),
            None,
        )
        .await;

    assert!(report.success);
    let stored = load(dir.path());
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, "1");
}

#[tokio::test]
async fn ignore_existing_recollects_and_overwrites() {
    let dir = tempfile::tempdir().unwrap();
    let store = RecordStore::new(dir.path().join("posts.json"));
    let mut prior = record("1");
    prior.body_text = "stale".into();
    store.save(&store::merge(Vec::new(), &[prior])).unwrap();

    let driver = MockDriver::new().page(
        page_spec("page")
            .fragment(frag().permalink("/a/status/1").author("@a").body("fresh")),
    );

    let report = crawler(dir.path(), &[ENDPOINT])
        .run(
            &driver,
            &SearchQuery::keyword("test"),
            &CrawlOptions {
                target_count: 1,
                fresh_start: false,
                ignore_existing: true,
            },
            CancelToken::new(),
            None,
        )
        .await;

    assert!(report.success);
    assert_eq!(report.collected_count, 1);
    let stored = load(dir.path());
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].body_text, "fresh");
}

#[tokio::test]
async fn known_ids_from_store_seed_the_dedup_set() {
    let dir = tempfile::tempdir().unwrap();
    let store = RecordStore::new(dir.path().join("posts.json"));
    store.save(&store::merge(Vec::new(), &[record("1")])).unwrap();

    let driver = MockDriver::new().page(
        page_spec("page")
            .fragment(frag().permalink("/a/status/1").author("@a").body("seen")),
    );

    let report = crawler(dir.path(), &[ENDPOINT])
        .with_empty_page_threshold(1)
        .run(
            &driver,
            &SearchQuery::keyword("test"),
            &opts(5),
            CancelToken::new(),
            None,
        )
        .await;

    assert!(report.success);
    assert_eq!(report.collected_count, 0);
    assert_eq!(report.duplicates, 1);
    assert_eq!(load(dir.path()).len(), 1);
}

#[tokio::test]
async fn cancellation_persists_the_partial_crawl() {
    let dir = tempfile::tempdir().unwrap();
    let driver = MockDriver::new()
        .page(
            page_spec("page-one")
                .fragment(frag().permalink("/a/status/1").author("@a").body("x"))
                .fragment(frag().permalink("/b/status/2").author("@b").body("y"))
                .with_load_more(),
        )
        .page(
            page_spec("page-two")
                .fragment(frag().permalink("/c/status/3").author("@c").body("z")),
        );

    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let progress = move |collected: usize, _target: usize| {
        if collected >= 1 {
            trigger.cancel();
        }
    };

    let report = crawler(dir.path(), &[ENDPOINT])
        .run(
            &driver,
            &SearchQuery::keyword("test"),
            &opts(10),
            cancel,
            Some(&progress),
        )
        .await;

    assert!(report.success);
    assert_eq!(report.collected_count, 2);
    assert_eq!(report.pages, 1);
    assert_eq!(load(dir.path()).len(), 2);
}

#[tokio::test]
async fn consecutive_empty_pages_hit_the_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let repeat =
        |content: &str| page_spec(content).fragment(frag().permalink("/a/status/1").author("@a").body("x"));
    let driver = MockDriver::new()
        .page(repeat("one").with_load_more())
        .page(repeat("two").with_load_more())
        .page(repeat("three").with_load_more())
        .page(repeat("four"));

    let report = crawler(dir.path(), &[ENDPOINT])
        .with_empty_page_threshold(2)
        .run(
            &driver,
            &SearchQuery::keyword("test"),
            &opts(10),
            CancelToken::new(),
            None,
        )
        .await;

    assert!(report.success);
    assert_eq!(report.collected_count, 1);
    // page 1 collects, pages 2 and 3 are all-duplicate, then the crawl
    // gives up without reaching page 4
    assert_eq!(report.pages, 3);
    assert_eq!(report.duplicates, 2);
}

#[tokio::test]
async fn corrupt_store_is_ignored_and_replaced() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("posts.json"), b"]] nonsense").unwrap();

    let driver = MockDriver::new().page(
        page_spec("page")
            .fragment(frag().permalink("/a/status/1").author("@a").body("ok")),
    );

    let report = crawler(dir.path(), &[ENDPOINT])
        .run(
            &driver,
            &SearchQuery::keyword("test"),
            &opts(1),
            CancelToken::new(),
            None,
        )
        .await;

    assert!(report.success);
    let stored = load(dir.path());
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, "1");
}

#[tokio::test]
async fn reply_fragments_become_annotated_threads() {
    let dir = tempfile::tempdir().unwrap();
    let driver = MockDriver::new().page(
        page_spec("page")
            .fragment(
                frag()
                    .permalink("/b/status/2")
                    .author("@b")
                    .body("second reply")
                    .date("2")
                    .replying_to(&["host"]),
            )
            .fragment(
                frag()
                    .permalink("/c/status/3")
                    .author("@c")
                    .body("first reply")
                    .date("1")
                    .replying_to(&["host"]),
            ),
    );

    let report = crawler(dir.path(), &[ENDPOINT])
        .run(
            &driver,
            &SearchQuery::keyword("test"),
            &opts(2),
            CancelToken::new(),
            None,
        )
        .await;

    assert!(report.success);
    let stored = load(dir.path());
    assert_eq!(stored.len(), 2);
    for r in &stored {
        assert_eq!(r.thread_key.as_deref(), Some("thread_host_2"));
        assert_eq!(r.thread_size, Some(2));
    }
    let by_id = |id: &str| stored.iter().find(|r| r.id == id).unwrap();
    assert_eq!(by_id("3").thread_position, Some(1));
    assert_eq!(by_id("2").thread_position, Some(2));
}
