// src/publish.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use crate::rewrite::PublishableArticle;

/// Terminal write of a finished article. One call per article, no retries:
/// a failure is reported to the pipeline, which withholds the fingerprint
/// so a later run retries the item from scratch.
#[async_trait]
pub trait ArticleSink: Send + Sync {
    async fn publish(&self, article: &PublishableArticle) -> Result<()>;
}

pub struct HttpPublisher {
    endpoint: String,
    client: Client,
}

impl HttpPublisher {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl ArticleSink for HttpPublisher {
    async fn publish(&self, article: &PublishableArticle) -> Result<()> {
        let body = serde_json::json!({
            "title": article.title,
            "content": article.content_html,
            "author": article.author.as_deref().unwrap_or("No author"),
            "preview": article.preview_text,
            "date": article.date.as_deref().unwrap_or("No date"),
            "link": article.source_link,
        });

        self.client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .context("publish post")?
            .error_for_status()
            .context("publish non-2xx")?;
        Ok(())
    }
}

// --- Test helper ---
pub struct RecordingSink {
    pub published: std::sync::Mutex<Vec<PublishableArticle>>,
    pub fail: std::sync::atomic::AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            published: std::sync::Mutex::new(Vec::new()),
            fail: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn failing() -> Self {
        let sink = Self::new();
        sink.fail.store(true, std::sync::atomic::Ordering::SeqCst);
        sink
    }

    pub fn count(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArticleSink for RecordingSink {
    async fn publish(&self, article: &PublishableArticle) -> Result<()> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            anyhow::bail!("simulated publish failure");
        }
        self.published.lock().unwrap().push(article.clone());
        Ok(())
    }
}
