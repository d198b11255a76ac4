// tests/parser_fixtures.rs
use chrono::{TimeZone, Utc};
use status_feed_watcher::ingest::extract::{ProductMatcher, ProductPattern};
use status_feed_watcher::{parse_feed, FeedParser, ParseError};

const OPENAI_ATOM: &str = include_str!("fixtures/openai_history.atom");
const STATUSPAGE_RSS: &str = include_str!("fixtures/statuspage_history.rss");

#[test]
fn openai_atom_fixture() {
    let items = FeedParser::new(ProductMatcher::openai())
        .parse("OpenAI", OPENAI_ATOM.as_bytes())
        .expect("atom parse ok");
    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|i| i.source_name == "OpenAI"));

    let latest = &items[0];
    assert_eq!(latest.id, "https://status.openai.com/incidents/01K4EXAMPLE3");
    assert_eq!(latest.title, "Increased latency for Chat Completions");
    assert_eq!(latest.status, "Investigating");
    assert_eq!(
        latest.affected_products,
        vec!["Chat Completions", "OpenAI API - Chat Completions"]
    );
    assert_eq!(
        latest.summary,
        "Investigating - We are seeing elevated latency on /v1/chat/completions.\nAffected components\nChat Completions (Degraded performance)"
    );
    assert_eq!(
        latest.published_at,
        Utc.with_ymd_and_hms(2025, 9, 6, 12, 5, 0).unwrap()
    );

    let files = &items[1];
    assert_eq!(files.status, "Resolved");
    assert_eq!(files.affected_products, vec!["OpenAI API - Files"]);
    assert!(files.summary.contains("working again. Thanks"), "{}", files.summary);

    // Body falls back from <summary> to <content>.
    let login = &items[2];
    assert_eq!(login.status, "Monitoring");
    assert_eq!(login.summary, "Status: Monitoring\nSome users cannot sign in.");
    assert!(login.affected_products.is_empty());
}

#[test]
fn statuspage_rss_fixture() {
    let items = parse_feed("ExampleCloud", STATUSPAGE_RSS.as_bytes()).expect("rss parse ok");
    assert_eq!(items.len(), 2);

    assert_eq!(items[0].id, "https://status.example.test/incidents/k2x");
    assert_eq!(items[0].status, "Identified");
    assert_eq!(items[0].affected_products, vec!["Object Storage"]);
    assert_eq!(
        items[0].published_at,
        Utc.with_ymd_and_hms(2025, 9, 6, 10, 15, 0).unwrap()
    );
    assert_eq!(items[0].updated_at, None);

    // No <guid>: the permalink is the id.
    assert_eq!(items[1].id, "https://status.example.test/incidents/j9q");
    assert_eq!(items[1].status, "Completed");
}

#[test]
fn openai_fixture_without_a_table_keeps_only_listed_components() {
    let items = parse_feed("OpenAI", OPENAI_ATOM.as_bytes()).unwrap();
    assert_eq!(items[0].affected_products, vec!["Chat Completions"]);
    assert!(items[1].affected_products.is_empty());
}

#[test]
fn parsing_is_deterministic() {
    let a = parse_feed("OpenAI", OPENAI_ATOM.as_bytes()).unwrap();
    let b = parse_feed("OpenAI", OPENAI_ATOM.as_bytes()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn truncated_feed_is_rejected_whole() {
    let cut = &OPENAI_ATOM[..OPENAI_ATOM.len() / 2];
    let err = parse_feed("OpenAI", cut.as_bytes()).unwrap_err();
    assert!(matches!(err, ParseError::Xml(_)), "{err:?}");
}

#[test]
fn custom_product_table() {
    let matcher = ProductMatcher::new(
        vec![ProductPattern::new("object storage", "Storage")],
        None,
    )
    .unwrap();
    let items = FeedParser::new(matcher)
        .parse("ExampleCloud", STATUSPAGE_RSS.as_bytes())
        .unwrap();
    assert_eq!(items[0].affected_products, vec!["Object Storage", "Storage"]);
    assert!(items[1].affected_products.is_empty());
}
