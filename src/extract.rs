//! Web page fetch and readable-text extraction for link submissions.
//!
//! The pipeline consumes this through [`PageExtractor`] so tests can stub
//! the network. The real implementation fetches with a browser-ish
//! user agent and distills the HTML to article text: content-rich
//! containers first (`article`, `main`, common content classes), then a
//! filtered walk of `body`.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; Stash/1.0; +https://github.com/stash)";

/// What a page boils down to once the chrome is stripped away.
#[derive(Debug, Clone, Default)]
pub struct ExtractedPage {
    pub url: String,
    pub title: String,
    /// Full readable text.
    pub content: String,
    /// Short lead-in: meta description when present, else the first bit of
    /// the content.
    pub excerpt: String,
    pub site_name: String,
    pub favicon: String,
}

#[async_trait]
pub trait PageExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> Result<ExtractedPage>;
}

pub struct WebExtractor {
    client: reqwest::Client,
}

impl WebExtractor {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("build fetch client")?;
        Ok(WebExtractor { client })
    }
}

#[async_trait]
impl PageExtractor for WebExtractor {
    async fn extract(&self, url: &str) -> Result<ExtractedPage> {
        let parsed = reqwest::Url::parse(url).context("parse url")?;

        let resp = self
            .client
            .get(url)
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .send()
            .await
            .context("fetch url")?;

        let status = resp.status();
        if !status.is_success() {
            bail!("bad status: {}", status.as_u16());
        }

        let body = resp.text().await.context("read body")?;

        let favicon = match (parsed.scheme(), parsed.host_str()) {
            (scheme, Some(host)) => format!("{scheme}://{host}/favicon.ico"),
            _ => String::new(),
        };

        // scraper's DOM is not Send; keep all parsing on this side of the
        // last await.
        let mut page = parse_page(url, &body);
        page.favicon = favicon;

        if page.content.trim().is_empty() {
            bail!("no readable text at {url}");
        }

        Ok(page)
    }
}

fn parse_page(url: &str, body: &str) -> ExtractedPage {
    let document = Html::parse_document(body);

    let title = meta_content(&document, "meta[property=\"og:title\"]")
        .or_else(|| select_text(&document, "title"))
        .unwrap_or_else(|| url.to_string());

    let site_name = meta_content(&document, "meta[property=\"og:site_name\"]").unwrap_or_default();

    let content = readable_text(&document);

    let excerpt = meta_content(&document, "meta[name=\"description\"]")
        .or_else(|| meta_content(&document, "meta[property=\"og:description\"]"))
        .unwrap_or_else(|| crate::parse::truncate_chars(&content, 200));

    ExtractedPage {
        url: url.to_string(),
        title: title.trim().to_string(),
        content,
        excerpt: excerpt.trim().to_string(),
        site_name,
        favicon: String::new(),
    }
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    document
        .select(&sel)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|s| s.to_string())
        .filter(|s| !s.trim().is_empty())
}

fn select_text(document: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    document
        .select(&sel)
        .next()
        .map(|el| element_text(&el))
        .filter(|s| !s.trim().is_empty())
}

/// Collects an element's text with whitespace collapsed.
fn element_text(element: &scraper::ElementRef) -> String {
    let mut text = String::new();
    for node in element.text() {
        let trimmed = node.trim();
        if !trimmed.is_empty() {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(trimmed);
        }
    }
    text
}

/// Tries content-rich selectors first, then falls back to paragraph-level
/// elements of `body`, skipping short fragments.
fn readable_text(document: &Html) -> String {
    for sel_str in &[
        "article",
        "main",
        "[role=main]",
        ".post-content",
        ".entry-content",
        ".article-body",
    ] {
        if let Ok(sel) = Selector::parse(sel_str) {
            let parts: Vec<String> = document
                .select(&sel)
                .map(|el| element_text(&el))
                .filter(|t| !t.trim().is_empty())
                .collect();
            if !parts.is_empty() {
                return parts.join("\n\n");
            }
        }
    }

    if let Ok(body_sel) = Selector::parse("body") {
        if let Some(body) = document.select(&body_sel).next() {
            let mut paragraphs = Vec::new();
            for sel_str in &["p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "blockquote", "pre"] {
                if let Ok(sel) = Selector::parse(sel_str) {
                    for el in body.select(&sel) {
                        let text = element_text(&el);
                        if text.len() > 20 {
                            paragraphs.push(text);
                        }
                    }
                }
            }
            if !paragraphs.is_empty() {
                paragraphs.dedup();
                return paragraphs.join("\n\n");
            }
            return element_text(&body);
        }
    }

    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html>
          <head>
            <title>Post</title>
            <meta name="description" content="A post about things.">
            <meta property="og:site_name" content="Example">
          </head>
          <body>
            <nav>Home About Contact and other navigation junk</nav>
            <article><p>Hello world, this is the body of the article.</p></article>
          </body>
        </html>
    "#;

    #[test]
    fn prefers_article_content() {
        let page = parse_page("https://example.com/post", PAGE);
        assert_eq!(page.title, "Post");
        assert_eq!(page.site_name, "Example");
        assert_eq!(page.excerpt, "A post about things.");
        assert!(page.content.contains("Hello world"));
        assert!(!page.content.contains("navigation junk"));
    }

    #[test]
    fn falls_back_to_url_title_and_content_excerpt() {
        let html = "<html><body><p>Just a paragraph that is long enough to count.</p></body></html>";
        let page = parse_page("https://example.com/x", html);
        assert_eq!(page.title, "https://example.com/x");
        assert!(page.excerpt.starts_with("Just a paragraph"));
    }
}
