// src/scheduler.rs
use tokio::task::JoinHandle;

use crate::config::PipelineConfig;
use crate::pipeline;

/// Spawn a lightweight scheduler that re-runs the pipeline on a fixed
/// interval. Components (and the fingerprint log) are rebuilt per tick, so
/// each tick sees fingerprints committed by the previous one.
pub fn spawn_poll_scheduler(cfg: PipelineConfig, interval_secs: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        loop {
            ticker.tick().await;
            match pipeline::run_from_config(&cfg).await {
                Ok(report) => {
                    tracing::info!(
                        target: "pipeline",
                        published = report.published,
                        duplicates = report.duplicates,
                        extract_failures = report.extract_failures,
                        "poll tick"
                    );
                }
                Err(e) => {
                    tracing::warn!(error = ?e, "poll tick failed");
                }
            }
        }
    })
}
