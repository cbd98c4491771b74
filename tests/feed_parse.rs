// tests/feed_parse.rs
use feedforge::feed::{FeedSource, RssFeedSource};

const FEED_XML: &str = include_str!("fixtures/feed.xml");

#[tokio::test]
async fn fixture_feed_yields_two_candidates() {
    let feed = RssFeedSource::from_fixture_str(FEED_XML);
    let out = feed.fetch_entries().await.unwrap();
    assert_eq!(out.len(), 2);

    assert_eq!(
        out[0].title,
        "Quantum startup raises $40M to shrink error correction"
    );
    assert_eq!(
        out[0].link,
        "https://news.example.test/2025/08/05/quantum-startup-raises-40m/"
    );
    assert_eq!(out[0].published_date, "2025-08-05T09:15:00Z");
    assert_eq!(out[0].author.as_deref(), Some("Jane Doe"));
    assert!(out[0].raw_description.contains("error-rate milestones"));

    assert_eq!(out[1].author.as_deref(), Some("John Roe"));
}

#[tokio::test]
async fn malformed_feed_is_an_error_the_pipeline_softens() {
    let feed = RssFeedSource::from_fixture_str("this is not xml at all");
    assert!(feed.fetch_entries().await.is_err());
}
