// src/rewrite.rs
//! Rewriter: generation provider abstraction + article assembly.
//!
//! A generation failure never fails the item: the extracted body passes
//! through verbatim so the pipeline always has something publishable for a
//! successfully fetched article.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::extract::{clean_fragment, ExtractedContent};
use crate::feed::Candidate;

/// The unit handed to the publisher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishableArticle {
    pub title: String,
    pub author: Option<String>,
    pub date: Option<String>,
    pub content_html: String,
    pub preview_text: String,
    pub source_link: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// "cohere" | "disabled"
    pub provider: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub preview_chars: usize,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            provider: "cohere".to_string(),
            model: "command".to_string(),
            max_tokens: 2048,
            temperature: 0.7,
            top_k: 0,
            top_p: 1.0,
            frequency_penalty: 0.2,
            presence_penalty: 0.1,
            preview_chars: 200,
        }
    }
}

/// Fixed style and structure guidance sent with every generation request.
const STYLE_PROMPT: &str = "You are an expert tech journalist and analyst with deep knowledge of technology, business, and innovation. \
Your writing style is clear, engaging, and insightful, aimed at both technical and non-technical readers.\n\n\
Writing Style Requirements:\n\
1) Use specific numbers, metrics, and data points to support arguments\n\
2) Focus on practical implications and actionable insights\n\
3) Include expert citations and references with links\n\
4) Break down complex technical concepts into understandable terms\n\
5) Add relevant market context and industry trends\n\
6) Include a 'Why It Matters' section\n\
7) End with key takeaways or a 'Bottom Line' section\n\
8) Add a P.S. with an interesting related fact or future prediction\n\n\
Article Structure:\n\
- Strong opening hook\n\
- Clear context and background\n\
- Main analysis with supporting evidence\n\
- Industry implications\n\
- Future outlook\n\
- Practical takeaways\n\n\
Additional Guidelines:\n\
- Use bullet points for key information\n\
- Include relevant statistics and market data\n\
- Add subheadings for better readability\n\
- Highlight expert quotes or insights\n\
- Reference similar technologies or competing solutions\n\
- Address potential challenges or limitations\n\
- Include real-world examples or use cases";

/// Low-level provider: does one real generation call. Separated from the
/// rewriter so tests can swap in a mock.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(&self, article_text: &str) -> Result<String>;
    fn name(&self) -> &'static str;
}

/// Cohere generate API. Requires `COHERE_API_KEY`.
pub struct CohereProvider {
    http: reqwest::Client,
    api_key: String,
    cfg: RewriteConfig,
}

impl CohereProvider {
    pub fn new(cfg: RewriteConfig) -> Self {
        let api_key = std::env::var("COHERE_API_KEY").unwrap_or_default();
        let http = reqwest::Client::builder()
            .user_agent(concat!("feedforge/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(60))
            .build()
            .expect("reqwest client");
        Self { http, api_key, cfg }
    }
}

#[async_trait]
impl GenerationProvider for CohereProvider {
    async fn generate(&self, article_text: &str) -> Result<String> {
        if self.api_key.is_empty() {
            bail!("COHERE_API_KEY is not set");
        }

        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            prompt: String,
            max_tokens: u32,
            temperature: f32,
            k: u32,
            p: f32,
            frequency_penalty: f32,
            presence_penalty: f32,
        }
        #[derive(Deserialize)]
        struct Resp {
            generations: Vec<Generation>,
        }
        #[derive(Deserialize)]
        struct Generation {
            text: String,
        }

        let prompt = format!(
            "{STYLE_PROMPT}\n\nPlease rewrite this tech article following the above guidelines:\n\n\
{article_text}\n\n\
Format the article in clean HTML with appropriate tags for headings, paragraphs, and lists."
        );
        let req = Req {
            model: &self.cfg.model,
            prompt,
            max_tokens: self.cfg.max_tokens,
            temperature: self.cfg.temperature,
            k: self.cfg.top_k,
            p: self.cfg.top_p,
            frequency_penalty: self.cfg.frequency_penalty,
            presence_penalty: self.cfg.presence_penalty,
        };

        let resp = self
            .http
            .post("https://api.cohere.com/v1/generate")
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("cohere post")?;
        if !resp.status().is_success() {
            bail!("cohere returned status {}", resp.status());
        }
        let body: Resp = resp.json().await.context("cohere response json")?;
        let text = body
            .generations
            .first()
            .map(|g| g.text.trim().to_string())
            .unwrap_or_default();
        if text.is_empty() {
            bail!("cohere returned an empty generation");
        }
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "cohere"
    }
}

/// Always errors; the rewriter degrades to passthrough.
pub struct DisabledProvider;

#[async_trait]
impl GenerationProvider for DisabledProvider {
    async fn generate(&self, _article_text: &str) -> Result<String> {
        bail!("generation disabled")
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Fixed-output provider for tests/local runs.
#[derive(Clone)]
pub struct MockProvider {
    pub fixed: String,
}

#[async_trait]
impl GenerationProvider for MockProvider {
    async fn generate(&self, _article_text: &str) -> Result<String> {
        Ok(self.fixed.clone())
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Factory: build a provider from config and environment.
///
/// * If `GENERATION_TEST_MODE=mock`, returns a deterministic mock provider.
/// * Else builds the configured provider; unknown names are disabled.
pub fn build_provider(cfg: &RewriteConfig) -> Box<dyn GenerationProvider> {
    if std::env::var("GENERATION_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Box::new(MockProvider {
            fixed: "<p>Mock rewrite of the extracted article body.</p>".to_string(),
        });
    }

    match cfg.provider.as_str() {
        "cohere" => Box::new(CohereProvider::new(cfg.clone())),
        _ => Box::new(DisabledProvider),
    }
}

pub struct Rewriter {
    provider: Box<dyn GenerationProvider>,
    preview_chars: usize,
}

impl Rewriter {
    pub fn new(provider: Box<dyn GenerationProvider>, preview_chars: usize) -> Self {
        Self {
            provider,
            preview_chars,
        }
    }

    /// Produce the publishable record for one fetched article.
    pub async fn rewrite(
        &self,
        candidate: &Candidate,
        extracted: &ExtractedContent,
    ) -> PublishableArticle {
        let (content, promoted_title) = match self.provider.generate(&extracted.body_text).await {
            Ok(text) => {
                let cleaned = strip_generation_artifacts(&text);
                promote_leading_heading(&cleaned)
            }
            Err(e) => {
                tracing::warn!(
                    error = ?e,
                    provider = self.provider.name(),
                    link = %candidate.link,
                    "generation failed, passing original content through"
                );
                (extracted.body_text.clone(), None)
            }
        };

        let title = promoted_title
            .or_else(|| extracted.title.clone())
            .unwrap_or_else(|| candidate.title.clone());
        let date = extracted.date.clone().or_else(|| {
            (!candidate.published_date.is_empty()).then(|| candidate.published_date.clone())
        });

        PublishableArticle {
            title,
            author: extracted.author.clone().or_else(|| candidate.author.clone()),
            date,
            preview_text: preview_text(&content, self.preview_chars),
            content_html: content,
            source_link: candidate.link.clone(),
        }
    }
}

/// Drop a leading `html` / ```` ```html ```` artifact and any stray fences
/// the generation step wrapped the document in.
pub fn strip_generation_artifacts(s: &str) -> String {
    static RE_PREFIX: OnceCell<Regex> = OnceCell::new();
    let re = RE_PREFIX.get_or_init(|| Regex::new(r"(?i)^(?:```html|```|html)\s*").unwrap());
    let out = re.replace(s.trim(), "").to_string();
    out.replace("```", "").trim().to_string()
}

/// When the generated document opens with a heading, promote it to the
/// article title. Returns (body, promoted title).
pub fn promote_leading_heading(s: &str) -> (String, Option<String>) {
    let trimmed = s.trim_start();
    let (first, rest) = match trimmed.split_once('\n') {
        Some((f, r)) => (f.trim(), r),
        None => (trimmed.trim_end(), ""),
    };

    static RE_HTML_HEADING: OnceCell<Regex> = OnceCell::new();
    let re = RE_HTML_HEADING
        .get_or_init(|| Regex::new(r"(?is)^<h([12])\b[^>]*>(.*?)</h[12]>$").unwrap());
    if let Some(cap) = re.captures(first) {
        let title = clean_fragment(cap.get(2).map(|m| m.as_str()).unwrap_or_default());
        if !title.is_empty() {
            return (rest.trim_start().to_string(), Some(title));
        }
    }
    if let Some(md) = first.strip_prefix("# ") {
        let title = md.trim().to_string();
        if !title.is_empty() {
            return (rest.trim_start().to_string(), Some(title));
        }
    }
    (s.to_string(), None)
}

/// Plain-text preview: tags stripped, whitespace collapsed, truncated to the
/// character budget with an ellipsis marker only when truncated.
pub fn preview_text(html: &str, budget: usize) -> String {
    let clean = clean_fragment(html);
    if clean.chars().count() > budget {
        let head: String = clean.chars().take(budget).collect();
        format!("{head}...")
    } else {
        clean
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate() -> Candidate {
        Candidate {
            title: "Feed title".to_string(),
            link: "https://example.test/a".to_string(),
            published_date: "2025-08-05T12:00:00Z".to_string(),
            raw_description: String::new(),
            author: Some("Feed Author".to_string()),
        }
    }

    fn extracted() -> ExtractedContent {
        ExtractedContent {
            title: Some("Scraped title".to_string()),
            author: Some("Jane Doe".to_string()),
            date: Some("2025-08-05T10:00:00Z".to_string()),
            body_text: "Original body text.".to_string(),
        }
    }

    #[test]
    fn preview_truncates_over_budget_with_ellipsis() {
        let long = "x".repeat(250);
        let out = preview_text(&long, 200);
        assert_eq!(out.chars().count(), 203);
        assert!(out.ends_with("..."));
        assert_eq!(&out[..200], &long[..200]);
    }

    #[test]
    fn preview_passes_short_content_unchanged() {
        assert_eq!(preview_text("<p>short</p>", 200), "short");
    }

    #[test]
    fn artifacts_are_stripped() {
        assert_eq!(
            strip_generation_artifacts("```html\n<p>Body</p>\n```"),
            "<p>Body</p>"
        );
        assert_eq!(strip_generation_artifacts("html <p>Body</p>"), "<p>Body</p>");
        assert_eq!(strip_generation_artifacts("<p>Body</p>"), "<p>Body</p>");
    }

    #[test]
    fn leading_heading_is_promoted() {
        let (body, title) = promote_leading_heading("<h1>New Title</h1>\n<p>Body</p>");
        assert_eq!(title.as_deref(), Some("New Title"));
        assert_eq!(body, "<p>Body</p>");

        let (body, title) = promote_leading_heading("# Markdown Title\n<p>Body</p>");
        assert_eq!(title.as_deref(), Some("Markdown Title"));
        assert_eq!(body, "<p>Body</p>");

        let (body, title) = promote_leading_heading("<p>No heading</p>");
        assert!(title.is_none());
        assert_eq!(body, "<p>No heading</p>");
    }

    #[tokio::test]
    async fn generation_failure_passes_original_through() {
        let rw = Rewriter::new(Box::new(DisabledProvider), 200);
        let out = rw.rewrite(&candidate(), &extracted()).await;
        assert_eq!(out.content_html, "Original body text.");
        assert_eq!(out.title, "Scraped title");
        assert_eq!(out.author.as_deref(), Some("Jane Doe"));
        assert_eq!(out.date.as_deref(), Some("2025-08-05T10:00:00Z"));
        assert_eq!(out.source_link, "https://example.test/a");
    }

    #[tokio::test]
    async fn generated_heading_overrides_scraped_title() {
        let rw = Rewriter::new(
            Box::new(MockProvider {
                fixed: "```html\n<h1>Generated Title</h1>\n<p>Generated body.</p>\n```".to_string(),
            }),
            200,
        );
        let out = rw.rewrite(&candidate(), &extracted()).await;
        assert_eq!(out.title, "Generated Title");
        assert_eq!(out.content_html, "<p>Generated body.</p>");
        assert_eq!(out.preview_text, "Generated body.");
    }
}
