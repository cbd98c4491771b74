// src/feed.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::{OffsetDateTime, UtcOffset};

/// One feed entry before content extraction. Identity key is (title, link).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,
    pub link: String,
    pub published_date: String,
    pub raw_description: String,
    pub author: Option<String>,
}

#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch and parse the whole feed. Finite, re-fetched on every call.
    async fn fetch_entries(&self) -> Result<Vec<Candidate>>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    author: Option<String>,
    #[serde(rename = "dc:creator")]
    creator: Option<String>,
}

/// Re-render an RFC 2822 `pubDate` as RFC 3339; pass unparseable values through.
pub fn normalize_pub_date(ts: &str) -> String {
    OffsetDateTime::parse(ts, &Rfc2822)
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC))
        .and_then(|dt| dt.format(&Rfc3339).ok())
        .unwrap_or_else(|| ts.to_string())
}

pub struct RssFeedSource {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl RssFeedSource {
    /// Parse from an in-memory XML string. Used by tests and fixtures.
    pub fn from_fixture_str(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
        }
    }

    pub fn from_url(url: impl Into<String>) -> Self {
        let client = reqwest::Client::new();
        Self {
            mode: Mode::Http {
                url: url.into(),
                client,
            },
        }
    }

    fn parse_items_from_str(s: &str) -> Result<Vec<Candidate>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean).context("parsing rss xml")?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            // Both identity fields are required downstream for fingerprinting.
            let (Some(title), Some(link)) = (it.title, it.link) else {
                continue;
            };
            let title = title.trim().to_string();
            let link = link.trim().to_string();
            if title.is_empty() || link.is_empty() {
                continue;
            }

            out.push(Candidate {
                title,
                link,
                published_date: it
                    .pub_date
                    .as_deref()
                    .map(normalize_pub_date)
                    .unwrap_or_default(),
                raw_description: it.description.unwrap_or_default(),
                author: it.author.or(it.creator).map(|a| a.trim().to_string()),
            });
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("feed_parse_ms").record(ms);
        counter!("feed_entries_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl FeedSource for RssFeedSource {
    async fn fetch_entries(&self) -> Result<Vec<Candidate>> {
        match &self.mode {
            Mode::Fixture(s) => Self::parse_items_from_str(s),

            Mode::Http { url, client } => {
                let body = match client.get(url).send().await {
                    Ok(resp) => resp.text().await.context("feed http .text()")?,
                    Err(e) => {
                        tracing::warn!(error = ?e, url = %url, "feed http error");
                        counter!("feed_fetch_errors_total").increment(1);
                        return Err(e).context("feed http get()");
                    }
                };
                Self::parse_items_from_str(&body)
            }
        }
    }

    fn name(&self) -> &'static str {
        "rss"
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Example</title>
    <item>
      <title>First post</title>
      <link>https://example.test/first</link>
      <pubDate>Tue, 05 Aug 2025 12:00:00 +0000</pubDate>
      <description>Short teaser &ndash; more inside</description>
      <author>Jane Doe</author>
    </item>
    <item>
      <title>Untitled junk</title>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_items_and_drops_incomplete_ones() {
        let out = RssFeedSource::parse_items_from_str(FEED).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "First post");
        assert_eq!(out[0].link, "https://example.test/first");
        assert_eq!(out[0].author.as_deref(), Some("Jane Doe"));
        assert_eq!(out[0].raw_description, "Short teaser - more inside");
    }

    #[test]
    fn pub_date_is_normalized_to_rfc3339() {
        assert_eq!(
            normalize_pub_date("Tue, 05 Aug 2025 12:00:00 +0000"),
            "2025-08-05T12:00:00Z"
        );
        // Unparseable values pass through untouched.
        assert_eq!(normalize_pub_date("yesterday"), "yesterday");
    }

    #[test]
    fn malformed_xml_is_an_error_not_a_panic() {
        assert!(RssFeedSource::parse_items_from_str("<rss><channel>").is_err());
    }
}
