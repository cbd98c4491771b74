// src/fetch.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::extract::{extract_article, ExtractRules, ExtractedContent};
use crate::feed::Candidate;

/// Retry configuration applied uniformly around outbound page fetches:
/// bounded attempts, exponential backoff, and an explicit set of
/// retry-worthy statuses. Everything else fails the call immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_factor_secs: f64,
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_factor_secs: 1.0,
            retryable_statuses: vec![429, 500, 502, 503, 504],
        }
    }
}

impl RetryPolicy {
    pub fn is_retryable(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }

    /// Delay before retry number `attempt` (zero-based): factor * 2^attempt.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = 1u32 << attempt.min(6);
        Duration::from_secs_f64(self.backoff_factor_secs * f64::from(exp))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Randomized pre-request delay bounds, in seconds.
    pub min_delay_secs: f64,
    pub max_delay_secs: f64,
    pub user_agents: Vec<String>,
    pub retry: RetryPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            connect_timeout_secs: 4,
            min_delay_secs: 1.0,
            max_delay_secs: 3.0,
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string(),
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:89.0) Gecko/20100101 Firefox/89.0".to_string(),
            ],
            retry: RetryPolicy::default(),
        }
    }
}

/// Fetch-and-extract seam the pipeline drives. Failure is a skip, not an
/// error: implementations log and return `None`.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch_extract(&self, candidate: &Candidate) -> Option<ExtractedContent>;
}

pub struct PageFetcher {
    client: reqwest::Client,
    cfg: FetchConfig,
    rules: ExtractRules,
}

impl PageFetcher {
    pub fn new(cfg: FetchConfig, rules: ExtractRules) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("building page fetch client")?;
        Ok(Self { client, cfg, rules })
    }

    fn pick_user_agent(&self) -> &str {
        let pool = &self.cfg.user_agents;
        if pool.is_empty() {
            return concat!("feedforge/", env!("CARGO_PKG_VERSION"));
        }
        let idx = rand::rng().random_range(0..pool.len());
        &pool[idx]
    }

    async fn jitter_sleep(&self) {
        let (lo, hi) = (self.cfg.min_delay_secs, self.cfg.max_delay_secs);
        if hi <= 0.0 {
            return;
        }
        let secs = if hi > lo {
            rand::rng().random_range(lo..hi)
        } else {
            hi
        };
        tokio::time::sleep(Duration::from_secs_f64(secs)).await;
    }

    /// GET one page with jitter, UA rotation, and the retry policy.
    pub async fn fetch_page(&self, url: &str) -> Result<String> {
        self.jitter_sleep().await;

        let policy = &self.cfg.retry;
        let mut attempt = 0u32;
        loop {
            let sent = self
                .client
                .get(url)
                .header(reqwest::header::USER_AGENT, self.pick_user_agent())
                .send()
                .await;

            match sent {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return resp.text().await.context("page body .text()");
                    }
                    if policy.is_retryable(status.as_u16()) && attempt + 1 < policy.max_attempts {
                        let delay = policy.backoff_delay(attempt);
                        tracing::debug!(
                            url = %url,
                            status = status.as_u16(),
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "retryable status, backing off"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(anyhow!("page fetch for {url} failed with status {status}"));
                }
                Err(e) => {
                    // Transport errors get the same bounded backoff.
                    if attempt + 1 < policy.max_attempts {
                        tokio::time::sleep(policy.backoff_delay(attempt)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(e).context("page fetch transport error");
                }
            }
        }
    }
}

#[async_trait]
impl ContentFetcher for PageFetcher {
    async fn fetch_extract(&self, candidate: &Candidate) -> Option<ExtractedContent> {
        let html = match self.fetch_page(&candidate.link).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(error = ?e, link = %candidate.link, "page fetch failed");
                return None;
            }
        };
        let out = extract_article(&html, &self.rules);
        if out.is_none() {
            tracing::warn!(link = %candidate.link, "no article content after filtering");
        }
        out
    }
}
