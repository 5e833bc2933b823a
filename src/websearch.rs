//! Topic lookup via the DuckDuckGo Instant Answer API.
//!
//! Used by the topic ingestion stage to seed knowledge entries from a
//! short query. The pipeline consumes [`TopicSearch`]; tests stub it.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt::Write as _;
use std::time::Duration;

const API_URL: &str = "https://api.duckduckgo.com/";
const MAX_RELATED: usize = 5;

/// A distilled instant-answer result.
#[derive(Debug, Clone, Default)]
pub struct TopicResult {
    pub abstract_html: String,
    pub abstract_text: String,
    pub abstract_url: String,
    /// Source name, e.g. "Wikipedia".
    pub source: String,
    pub heading: String,
    pub related: Vec<RelatedTopic>,
}

#[derive(Debug, Clone)]
pub struct RelatedTopic {
    pub text: String,
    pub url: String,
}

impl TopicResult {
    pub fn has_content(&self) -> bool {
        !self.abstract_html.is_empty() || !self.abstract_text.is_empty() || !self.related.is_empty()
    }

    /// Renders the result as the text block handed to the model.
    pub fn format_for_llm(&self) -> String {
        let mut out = String::new();

        if !self.heading.is_empty() {
            let _ = writeln!(out, "Topic: {}\n", self.heading);
        }

        if !self.abstract_html.is_empty() {
            let _ = writeln!(out, "Summary: {}", self.abstract_html);
            if !self.source.is_empty() {
                let _ = writeln!(out, "Source: {}", self.source);
            }
            if !self.abstract_url.is_empty() {
                let _ = writeln!(out, "URL: {}", self.abstract_url);
            }
            out.push('\n');
        }

        if !self.related.is_empty() {
            out.push_str("Related Topics:\n");
            for item in &self.related {
                let _ = writeln!(out, "- {}", item.text);
            }
        }

        out
    }
}

#[async_trait]
pub trait TopicSearch: Send + Sync {
    async fn search(&self, topic: &str) -> Result<TopicResult>;
}

pub struct DuckDuckGoClient {
    client: reqwest::Client,
}

impl DuckDuckGoClient {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("Stash/1.0 (knowledge capture)")
            .build()
            .context("build search client")?;
        Ok(DuckDuckGoClient { client })
    }
}

#[async_trait]
impl TopicSearch for DuckDuckGoClient {
    async fn search(&self, topic: &str) -> Result<TopicResult> {
        let resp = self
            .client
            .get(API_URL)
            .query(&[
                ("q", topic),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .context("search request")?;

        let status = resp.status();
        if !status.is_success() {
            bail!("bad status: {}", status.as_u16());
        }

        let body = resp.text().await.context("read search body")?;
        let raw: DdgResponse = serde_json::from_str(&body).context("decode search response")?;

        Ok(distill(raw))
    }
}

// ============ Wire types ============

#[derive(Debug, Deserialize, Default)]
struct DdgResponse {
    #[serde(rename = "Abstract", default)]
    abstract_html: String,
    #[serde(rename = "AbstractText", default)]
    abstract_text: String,
    #[serde(rename = "AbstractSource", default)]
    abstract_source: String,
    #[serde(rename = "AbstractURL", default)]
    abstract_url: String,
    #[serde(rename = "Heading", default)]
    heading: String,
    #[serde(rename = "RelatedTopics", default)]
    related_topics: Vec<DdgRelated>,
    #[serde(rename = "Definition", default)]
    definition: String,
    #[serde(rename = "DefinitionSource", default)]
    definition_source: String,
    #[serde(rename = "DefinitionURL", default)]
    definition_url: String,
}

/// Related topics come either flat or grouped under a category.
#[derive(Debug, Deserialize, Default)]
struct DdgRelated {
    #[serde(rename = "Text", default)]
    text: String,
    #[serde(rename = "FirstURL", default)]
    first_url: String,
    #[serde(rename = "Topics", default)]
    topics: Vec<DdgTopic>,
}

#[derive(Debug, Deserialize, Default)]
struct DdgTopic {
    #[serde(rename = "Text", default)]
    text: String,
    #[serde(rename = "FirstURL", default)]
    first_url: String,
}

fn distill(raw: DdgResponse) -> TopicResult {
    let mut result = TopicResult {
        abstract_html: raw.abstract_html,
        abstract_text: raw.abstract_text,
        abstract_url: raw.abstract_url,
        source: raw.abstract_source,
        heading: raw.heading,
        related: Vec::new(),
    };

    // Dictionary-style answers carry a definition instead of an abstract.
    if result.abstract_html.is_empty() && !raw.definition.is_empty() {
        result.abstract_html = raw.definition.clone();
        result.abstract_text = raw.definition;
        result.abstract_url = raw.definition_url;
        result.source = raw.definition_source;
    }

    for rt in raw.related_topics {
        if !rt.text.is_empty() && !rt.first_url.is_empty() {
            result.related.push(RelatedTopic {
                text: rt.text,
                url: rt.first_url,
            });
        }
        for topic in rt.topics {
            if !topic.text.is_empty() && !topic.first_url.is_empty() {
                result.related.push(RelatedTopic {
                    text: topic.text,
                    url: topic.first_url,
                });
            }
        }
    }

    result.related.truncate(MAX_RELATED);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_related_topics_flatten() {
        let raw = r#"{
            "Abstract": "Kubernetes is a container orchestrator.",
            "AbstractText": "Kubernetes is a container orchestrator.",
            "AbstractSource": "Wikipedia",
            "AbstractURL": "https://en.wikipedia.org/wiki/Kubernetes",
            "Heading": "Kubernetes",
            "RelatedTopics": [
                {"Text": "Docker", "FirstURL": "https://ddg.gg/docker"},
                {"Topics": [
                    {"Text": "Helm", "FirstURL": "https://ddg.gg/helm"},
                    {"Text": "etcd", "FirstURL": "https://ddg.gg/etcd"}
                ]}
            ]
        }"#;
        let parsed: DdgResponse = serde_json::from_str(raw).unwrap();
        let result = distill(parsed);

        assert!(result.has_content());
        assert_eq!(result.related.len(), 3);
        assert_eq!(result.related[1].text, "Helm");

        let block = result.format_for_llm();
        assert!(block.starts_with("Topic: Kubernetes"));
        assert!(block.contains("Source: Wikipedia"));
        assert!(block.contains("- Docker"));
    }

    #[test]
    fn definition_backfills_missing_abstract() {
        let raw = r#"{
            "Definition": "A word.",
            "DefinitionSource": "Wiktionary",
            "DefinitionURL": "https://wiktionary.org/x"
        }"#;
        let parsed: DdgResponse = serde_json::from_str(raw).unwrap();
        let result = distill(parsed);

        assert_eq!(result.abstract_html, "A word.");
        assert_eq!(result.source, "Wiktionary");
    }

    #[test]
    fn empty_response_has_no_content() {
        let result = distill(DdgResponse::default());
        assert!(!result.has_content());
        assert_eq!(result.format_for_llm(), "");
    }
}
