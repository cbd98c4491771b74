// src/pipeline.rs
//! Sequential run loop: feed → fingerprint gate → fetch/extract → rewrite →
//! publish → commit. The fingerprint is committed only after a successful
//! publish, so failed items are retried from scratch on a later run.

use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;

use crate::config::PipelineConfig;
use crate::feed::{FeedSource, RssFeedSource};
use crate::fetch::{ContentFetcher, PageFetcher};
use crate::fingerprint::{fingerprint_of, FingerprintLog};
use crate::publish::{ArticleSink, HttpPublisher};
use crate::rewrite::{build_provider, PublishableArticle, Rewriter};

/// One-time metrics registration (so series show up on an exporter).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("feed_entries_total", "Entries parsed from the feed.");
        describe_counter!("feed_fetch_errors_total", "Feed fetch/parse errors.");
        describe_histogram!("feed_parse_ms", "Feed parse time in milliseconds.");
        describe_counter!(
            "pipeline_candidates_total",
            "Candidates considered by the pipeline."
        );
        describe_counter!(
            "pipeline_duplicates_total",
            "Candidates skipped via the fingerprint log."
        );
        describe_counter!(
            "pipeline_extract_failures_total",
            "Candidates with no usable content after fetch/extract."
        );
        describe_counter!("pipeline_published_total", "Articles published.");
        describe_counter!(
            "pipeline_publish_failures_total",
            "Publish calls that failed (fingerprint withheld)."
        );
        describe_counter!("pipeline_runs_total", "Completed pipeline runs.");
        describe_gauge!(
            "pipeline_last_run_ts",
            "Unix ts when the pipeline last ran."
        );
    });
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub candidates: usize,
    pub duplicates: usize,
    pub extract_failures: usize,
    pub publish_failures: usize,
    pub published: usize,
}

/// Run the pipeline once. Never aborts: a malformed feed is an empty run,
/// and every per-item failure is counted and skipped.
pub async fn run_once(
    feed: &dyn FeedSource,
    fetcher: &dyn ContentFetcher,
    rewriter: &Rewriter,
    publisher: &dyn ArticleSink,
    log: &mut FingerprintLog,
) -> (Vec<PublishableArticle>, RunReport) {
    ensure_metrics_described();

    let mut report = RunReport::default();
    let mut published = Vec::new();

    let candidates = match feed.fetch_entries().await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = ?e, feed = feed.name(), "feed error, empty run");
            Vec::new()
        }
    };
    report.candidates = candidates.len();
    counter!("pipeline_candidates_total").increment(candidates.len() as u64);

    for candidate in candidates {
        let fp = fingerprint_of(&candidate);
        if log.is_seen(&fp) {
            tracing::debug!(title = %candidate.title, "skipping already-published entry");
            report.duplicates += 1;
            counter!("pipeline_duplicates_total").increment(1);
            continue;
        }

        tracing::info!(title = %candidate.title, link = %candidate.link, "processing entry");
        let Some(extracted) = fetcher.fetch_extract(&candidate).await else {
            report.extract_failures += 1;
            counter!("pipeline_extract_failures_total").increment(1);
            continue;
        };

        let article = rewriter.rewrite(&candidate, &extracted).await;

        match publisher.publish(&article).await {
            Ok(()) => {
                if let Err(e) = log.commit(&fp) {
                    tracing::error!(
                        error = ?e,
                        title = %candidate.title,
                        "fingerprint append failed, entry may repeat next run"
                    );
                }
                report.published += 1;
                counter!("pipeline_published_total").increment(1);
                published.push(article);
            }
            Err(e) => {
                tracing::warn!(
                    error = ?e,
                    title = %candidate.title,
                    "publish failed, withholding fingerprint"
                );
                report.publish_failures += 1;
                counter!("pipeline_publish_failures_total").increment(1);
            }
        }
    }

    let now = chrono::Utc::now().timestamp().max(0) as u64;
    counter!("pipeline_runs_total").increment(1);
    gauge!("pipeline_last_run_ts").set(now as f64);

    tracing::info!(
        candidates = report.candidates,
        duplicates = report.duplicates,
        extract_failures = report.extract_failures,
        publish_failures = report.publish_failures,
        published = report.published,
        "pipeline run complete"
    );
    (published, report)
}

/// Wire the HTTP implementations from configuration and run one pass.
pub async fn run_from_config(cfg: &PipelineConfig) -> Result<RunReport> {
    let feed = RssFeedSource::from_url(cfg.feed_url.clone());
    let fetcher = PageFetcher::new(cfg.fetch.clone(), cfg.extract.clone())?;
    let rewriter = Rewriter::new(build_provider(&cfg.rewrite), cfg.rewrite.preview_chars);
    let publisher = HttpPublisher::new(cfg.publish_url.clone());
    let mut log = FingerprintLog::load(&cfg.fingerprint_log)?;

    let (_articles, report) = run_once(&feed, &fetcher, &rewriter, &publisher, &mut log).await;
    Ok(report)
}
