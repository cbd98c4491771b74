//! Feedforge — Binary Entrypoint
//! One-shot by default: poll the feed, process new entries, report counts.
//! With `poll_interval_secs` configured, keeps polling on a fixed interval.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use feedforge::{config, pipeline, scheduler};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("feedforge=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = config::load_default()?;
    tracing::info!(
        feed = %cfg.feed_url,
        publish = %cfg.publish_url,
        log = %cfg.fingerprint_log.display(),
        "feedforge starting"
    );

    if let Some(interval) = cfg.poll_interval_secs {
        tracing::info!(interval_secs = interval, "polling mode");
        scheduler::spawn_poll_scheduler(cfg, interval).await?;
    } else {
        let report = pipeline::run_from_config(&cfg).await?;
        tracing::info!(
            published = report.published,
            duplicates = report.duplicates,
            extract_failures = report.extract_failures,
            publish_failures = report.publish_failures,
            "processed {} articles",
            report.published
        );
    }
    Ok(())
}
