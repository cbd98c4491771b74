// tests/pipeline_publish_failure.rs
use async_trait::async_trait;

use feedforge::extract::ExtractedContent;
use feedforge::feed::{Candidate, RssFeedSource};
use feedforge::fetch::ContentFetcher;
use feedforge::fingerprint::FingerprintLog;
use feedforge::pipeline::run_once;
use feedforge::publish::RecordingSink;
use feedforge::rewrite::{DisabledProvider, Rewriter};

const FEED_XML: &str = include_str!("fixtures/feed.xml");

struct StubFetcher;

#[async_trait]
impl ContentFetcher for StubFetcher {
    async fn fetch_extract(&self, candidate: &Candidate) -> Option<ExtractedContent> {
        Some(ExtractedContent {
            title: None,
            author: None,
            date: None,
            body_text: format!("Extracted body for {}.", candidate.link),
        })
    }
}

#[tokio::test]
async fn failed_publish_withholds_fingerprints_for_a_later_run() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("fingerprints.log");
    let mut log = FingerprintLog::load(&log_path).unwrap();

    let feed = RssFeedSource::from_fixture_str(FEED_XML);
    // DisabledProvider also exercises the passthrough fallback on this path.
    let rewriter = Rewriter::new(Box::new(DisabledProvider), 200);
    let sink = RecordingSink::failing();

    let (articles, report) = run_once(&feed, &StubFetcher, &rewriter, &sink, &mut log).await;

    assert_eq!(report.candidates, 2);
    assert_eq!(report.publish_failures, 2);
    assert_eq!(report.published, 0);
    assert!(articles.is_empty());

    // Nothing committed: a later run retries both from scratch.
    assert!(log.is_empty());
    let reloaded = FingerprintLog::load(&log_path).unwrap();
    assert!(reloaded.is_empty());

    // The sink stops failing: the retry run publishes and commits both.
    let mut log = FingerprintLog::load(&log_path).unwrap();
    let healthy = RecordingSink::new();
    let (_, retry) = run_once(&feed, &StubFetcher, &rewriter, &healthy, &mut log).await;
    assert_eq!(retry.published, 2);
    assert_eq!(FingerprintLog::load(&log_path).unwrap().len(), 2);
}
