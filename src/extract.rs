// src/extract.rs
//! Regex-region extraction of article fields from fetched HTML.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Structured article fields pulled out of one source page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    pub title: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
    pub body_text: String,
}

/// Class markers and thresholds for one site layout. Defaults match a
/// WordPress block theme; point the pipeline at another layout via config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractRules {
    pub title_class: String,
    pub author_class: String,
    pub date_class: String,
    pub content_class: String,
    pub paragraph_class: String,
    pub junk_classes: Vec<String>,
    pub min_paragraph_chars: usize,
    pub boilerplate_prefixes: Vec<String>,
}

impl Default for ExtractRules {
    fn default() -> Self {
        Self {
            title_class: "wp-block-post-title".to_string(),
            author_class: "wp-block-tc23-author-card-name".to_string(),
            date_class: "wp-block-post-date".to_string(),
            content_class: "wp-block-post-content".to_string(),
            paragraph_class: "wp-block-paragraph".to_string(),
            junk_classes: vec![
                "ad-unit".to_string(),
                "wp-block-tc-ads-ad-slot".to_string(),
                "marfeel-experience-inline-cta".to_string(),
            ],
            min_paragraph_chars: 50,
            boilerplate_prefixes: vec!["Image Credits:".to_string()],
        }
    }
}

const CONTAINER_TAGS: [&str; 5] = ["div", "article", "section", "main", "aside"];

/// Extract title, author, date, and filtered body text from one page.
/// `None` when the content region is missing or no paragraph survives
/// filtering.
pub fn extract_article(html: &str, rules: &ExtractRules) -> Option<ExtractedContent> {
    let region = extract_class_region(html, &rules.content_class)?;
    let region = remove_junk_blocks(region, &rules.junk_classes);

    let mut paragraphs = Vec::new();
    for raw in paragraph_fragments(&region, &rules.paragraph_class) {
        let text = clean_fragment(&raw);
        if text.chars().count() < rules.min_paragraph_chars {
            continue;
        }
        if rules
            .boilerplate_prefixes
            .iter()
            .any(|p| text.starts_with(p.as_str()))
        {
            continue;
        }
        paragraphs.push(text);
    }
    if paragraphs.is_empty() {
        return None;
    }

    Some(ExtractedContent {
        title: extract_title(html, &rules.title_class),
        author: extract_author(html, &rules.author_class),
        date: extract_date(html, &rules.date_class),
        body_text: paragraphs.join(" "),
    })
}

/// Inner HTML of the first container whose class attribute contains `class`.
/// Nesting is tracked explicitly: a lazy `.*?</div>` would stop at the first
/// nested close tag.
fn extract_class_region(html: &str, class: &str) -> Option<String> {
    for tag in CONTAINER_TAGS {
        if let Some((inner_start, inner_end, _)) = balanced_element(html, tag, class) {
            return Some(html[inner_start..inner_end].to_string());
        }
    }
    None
}

/// Delete every element carrying one of the junk classes from the region.
fn remove_junk_blocks(region: String, junk_classes: &[String]) -> String {
    let mut out = region;
    for class in junk_classes {
        loop {
            let mut removed = false;
            for tag in CONTAINER_TAGS {
                if let Some((_, _, full)) = balanced_element(&out, tag, class) {
                    out.replace_range(full.clone(), "");
                    removed = true;
                    break;
                }
            }
            if !removed {
                break;
            }
        }
    }
    out
}

/// Locate the first `<tag class="..class..">` element and return
/// (inner start, inner end, full element byte range), balancing nested
/// same-name tags.
fn balanced_element(
    html: &str,
    tag: &str,
    class: &str,
) -> Option<(usize, usize, std::ops::Range<usize>)> {
    let open = Regex::new(&format!(
        r#"(?is)<{tag}\b[^>]*class=["'][^"']*{class}[^"']*["'][^>]*>"#,
        tag = tag,
        class = regex::escape(class)
    ))
    .ok()?;
    let m = open.find(html)?;
    let inner_start = m.end();

    let steps = Regex::new(&format!(r"(?is)<{tag}\b[^>]*>|</{tag}\s*>", tag = tag)).ok()?;
    let mut depth = 1usize;
    for step in steps.find_iter(&html[inner_start..]) {
        if step.as_str().starts_with("</") {
            depth -= 1;
            if depth == 0 {
                let inner_end = inner_start + step.start();
                return Some((inner_start, inner_end, m.start()..inner_start + step.end()));
            }
        } else {
            depth += 1;
        }
    }
    None
}

/// Raw inner HTML of each paragraph in the region. An empty class marker
/// means every `<p>` counts.
fn paragraph_fragments(region: &str, paragraph_class: &str) -> Vec<String> {
    let re = if paragraph_class.is_empty() {
        static RE_ANY_P: OnceCell<Regex> = OnceCell::new();
        RE_ANY_P
            .get_or_init(|| Regex::new(r"(?is)<p(?:\s[^>]*)?>(.*?)</p>").unwrap())
            .clone()
    } else {
        match Regex::new(&format!(
            r#"(?is)<p\b[^>]*class=["'][^"']*{class}[^"']*["'][^>]*>(.*?)</p>"#,
            class = regex::escape(paragraph_class)
        )) {
            Ok(re) => re,
            Err(_) => return Vec::new(),
        }
    };
    re.captures_iter(region)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

fn extract_title(html: &str, title_class: &str) -> Option<String> {
    let re = Regex::new(&format!(
        r#"(?is)<h1\b[^>]*class=["'][^"']*{class}[^"']*["'][^>]*>(.*?)</h1>"#,
        class = regex::escape(title_class)
    ))
    .ok()?;
    re.captures(html)
        .and_then(|c| c.get(1))
        .map(|m| clean_fragment(m.as_str()))
        .filter(|t| !t.is_empty())
}

fn extract_author(html: &str, author_class: &str) -> Option<String> {
    let region = extract_class_region(html, author_class)?;
    static RE_ANCHOR: OnceCell<Regex> = OnceCell::new();
    let re = RE_ANCHOR.get_or_init(|| Regex::new(r"(?is)<a\b[^>]*>(.*?)</a>").unwrap());
    re.captures(&region)
        .and_then(|c| c.get(1))
        .map(|m| clean_fragment(m.as_str()))
        .filter(|a| !a.is_empty())
}

fn extract_date(html: &str, date_class: &str) -> Option<String> {
    let region = extract_class_region(html, date_class)?;
    static RE_DATETIME: OnceCell<Regex> = OnceCell::new();
    let re = RE_DATETIME
        .get_or_init(|| Regex::new(r#"(?is)<time\b[^>]*datetime=["']([^"']+)["']"#).unwrap());
    re.captures(&region)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|d| !d.is_empty())
}

/// Strip tags, decode entities, collapse whitespace.
pub fn clean_fragment(s: &str) -> String {
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    let out = re_tags.replace_all(s, " ");

    let out = html_escape::decode_html_entities(out.as_ref()).to_string();

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    re_ws.replace_all(&out, " ").trim().to_string()
}
