//! Language-model enrichment client.
//!
//! The pipeline consumes the model through [`LanguageModel`] so tests can
//! substitute canned (or failing) implementations. The shipped
//! [`LlmClient`] speaks the OpenAI-compatible `/chat/completions` wire
//! format against a configurable base URL (OpenRouter by default).
//!
//! All structured responses are JSON; models occasionally wrap JSON in
//! markdown code fences, which are stripped before parsing.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::lang::Lang;
use crate::parse::truncate_chars;

/// Longest content slice handed to the model.
const MAX_CONTENT_CHARS: usize = 8000;

/// Structured enrichment for a piece of content.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Enriched {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub related_topics: Vec<String>,
}

/// One model-suggested edge toward an existing item.
#[derive(Debug, Clone, Deserialize)]
pub struct RelationSuggestion {
    pub target_id: String,
    pub relation_type: String,
    pub strength: f64,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Title/summary/tags for freshly captured content.
    async fn summarize(
        &self,
        content_type: &str,
        content: &str,
        lang: Lang,
        existing_tags: &[String],
    ) -> Result<Enriched>;

    /// Knowledge-entry synthesis from a web-search result block.
    async fn summarize_search(
        &self,
        topic: &str,
        results: &str,
        lang: Lang,
        existing_tags: &[String],
    ) -> Result<Enriched>;

    /// Free-text answer grounded in the supplied item blocks.
    async fn answer(&self, question: &str, items: &[String]) -> Result<String>;

    /// Cross-item relationship suggestions. Must come back empty unless
    /// the connection is obvious; the caller additionally gates on
    /// strength >= 0.7.
    async fn suggest_relations(
        &self,
        title: &str,
        summary: &str,
        tags: &[String],
        existing_items: &str,
    ) -> Result<Vec<RelationSuggestion>>;
}

pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl LlmClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("build llm client")?;
        Ok(LlmClient {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    async fn chat(&self, prompt: String) -> Result<String> {
        let req = ChatRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("llm request")?;

        let body: ChatResponse = resp.json().await.context("decode llm response")?;

        if let Some(err) = body.error {
            bail!("llm api error: {}", err.message);
        }

        let Some(choice) = body.choices.into_iter().next() else {
            bail!("llm response had no choices");
        };

        Ok(choice.message.content)
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    async fn summarize(
        &self,
        content_type: &str,
        content: &str,
        lang: Lang,
        existing_tags: &[String],
    ) -> Result<Enriched> {
        let content = truncate_chars(content, MAX_CONTENT_CHARS);
        let prompt = summarize_prompt(content_type, &content, lang, existing_tags);
        let response = self.chat(prompt).await?;
        parse_json_response(&response).context("parse summarize response")
    }

    async fn summarize_search(
        &self,
        topic: &str,
        results: &str,
        lang: Lang,
        existing_tags: &[String],
    ) -> Result<Enriched> {
        let prompt = summarize_search_prompt(topic, results, lang, existing_tags);
        let response = self.chat(prompt).await?;
        parse_json_response(&response).context("parse search summary response")
    }

    async fn answer(&self, question: &str, items: &[String]) -> Result<String> {
        let prompt = answer_prompt(question, items);
        let response = self.chat(prompt).await?;
        Ok(response.trim().to_string())
    }

    async fn suggest_relations(
        &self,
        title: &str,
        summary: &str,
        tags: &[String],
        existing_items: &str,
    ) -> Result<Vec<RelationSuggestion>> {
        let prompt = relations_prompt(title, summary, tags, existing_items);
        let response = self.chat(prompt).await?;
        parse_json_response(&response).context("parse relation suggestions")
    }
}

// ============ Wire types ============

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

// ============ Prompts ============

fn language_and_tag_hints(lang: Lang, existing_tags: &[String]) -> String {
    let mut hints = String::new();
    if lang == Lang::Ru {
        hints.push_str("Write the title and summary in Russian.\n");
    }
    if !existing_tags.is_empty() {
        hints.push_str(&format!(
            "Existing tags in this vault (prefer reusing them): {}\n",
            existing_tags.join(", ")
        ));
    }
    hints
}

fn summarize_prompt(content_type: &str, content: &str, lang: Lang, existing_tags: &[String]) -> String {
    format!(
        r##"Analyze the following content and extract structured information.
{hints}Content Type: {content_type}
Content:
---
{content}
---

Respond with ONLY valid JSON (no markdown, no explanation):
{{
  "title": "concise descriptive title (max 10 words)",
  "summary": "2-3 sentence summary capturing key points",
  "tags": ["tag1", "tag2", "tag3"],
  "related_topics": ["topic that might connect to other saved items"]
}}

Rules:
- Tags should be lowercase, single words or short phrases
- If the content includes hashtags (e.g. #tag), include them as tags without the "#"
- Generate 3-7 relevant tags
- PREFER reusing existing tags when they fit the content (consistency is valuable)
- Summary should be informative but concise
- Related topics help build knowledge graph connections"##,
        hints = language_and_tag_hints(lang, existing_tags),
    )
}

fn summarize_search_prompt(topic: &str, results: &str, lang: Lang, existing_tags: &[String]) -> String {
    format!(
        r#"You are a knowledge assistant. The user searched for a topic and we found some information.
Create a helpful knowledge entry about this topic.
{hints}Topic: {topic}

Search Results:
---
{results}
---

Respond with ONLY valid JSON (no markdown, no explanation):
{{
  "title": "concise descriptive title for this topic (max 10 words)",
  "summary": "2-4 sentence informative summary about this topic",
  "tags": ["tag1", "tag2", "tag3"],
  "related_topics": ["related topic 1", "related topic 2"]
}}

Rules:
- If search results are empty or unhelpful, use your general knowledge about the topic
- Tags should be lowercase, relevant to the topic
- Generate 3-5 relevant tags
- PREFER reusing existing tags when they fit the topic (consistency is valuable)
- Summary should explain what this topic is and why it's notable
- Include the most important facts or uses"#,
        hints = language_and_tag_hints(lang, existing_tags),
    )
}

fn answer_prompt(question: &str, items: &[String]) -> String {
    format!(
        r#"Based on the following saved knowledge items, answer the user's question.

User question: {question}

Relevant items:
{items}

Instructions:
- Synthesize information from the provided items
- Be concise but informative
- If the answer is not in the provided items, say so
- Reference specific items when relevant

Answer:"#,
        items = items.join("\n\n---\n\n"),
    )
}

fn relations_prompt(title: &str, summary: &str, tags: &[String], existing_items: &str) -> String {
    format!(
        r#"Given a new item and existing items, identify ONLY genuinely related items.

New item:
Title: {title}
Summary: {summary}
Tags: {tags:?}

Existing items:
{existing_items}

Respond with ONLY valid JSON array of relationships:
[
  {{"target_id": "id", "relation_type": "type", "strength": 0.8}}
]

Relation types: "similar_topic", "references", "contradicts", "extends", "prerequisite"
Strength: 0.7-1.0 (only strong, obvious connections)

STRICT RULES - read carefully:
1. Items MUST be in the same knowledge domain (e.g., both about programming, both about cinema, both about cooking)
2. Do NOT connect items just because they share generic tags like "technology", "article", "image"
3. Do NOT use "creative interpretation" - the connection must be obvious to any reader
4. When in doubt, DO NOT create a relationship - return an empty array []
5. Quality over quantity: 0-2 relationships is normal, more than 3 is suspicious

Return empty array [] if no strong relationships exist."#,
    )
}

// ============ Response parsing ============

/// Strips a surrounding markdown code fence, if any, then parses JSON.
fn parse_json_response<T: serde::de::DeserializeOwned>(response: &str) -> Result<T> {
    let cleaned = strip_code_fences(response);
    serde_json::from_str(cleaned).with_context(|| format!("invalid llm json: {cleaned}"))
}

fn strip_code_fences(s: &str) -> &str {
    let s = s.trim();
    let s = s.strip_prefix("```json").unwrap_or(s);
    let s = s.strip_prefix("```").unwrap_or(s);
    let s = s.strip_suffix("```").unwrap_or(s);
    s.trim()
}
