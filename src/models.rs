//! Core data models used throughout the vault backend.
//!
//! These types represent the submissions, items, and graph edges that flow
//! through the ingestion and query pipeline. The data lifecycle is:
//!
//! ```text
//! RawContent → pipeline::process() → Item → relate::infer() → Relationship
//!                                      ↓
//!                                 search() → SearchResult
//! ```
//!
//! # Type Relationships
//!
//! - A **[`RawContent`]** is a submission as it arrives from the outside
//!   (CLI or HTTP), before any extraction or enrichment.
//! - An **[`Item`]** is the normalized, stored representation in an owner's
//!   vault, with its tag set loaded.
//! - A **[`Relationship`]** is a typed, weighted edge between two items in
//!   the same vault.
//! - A **[`SearchResult`]** is returned by the FTS query engine with a BM25
//!   score and a `<mark>`-delimited snippet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored item kind. Topic submissions persist as `search`: the vault
/// keeps the result of the lookup, not the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Link,
    Note,
    Image,
    Search,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Link => "link",
            ItemType::Note => "note",
            ItemType::Image => "image",
            ItemType::Search => "search",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "link" => Some(ItemType::Link),
            "note" => Some(ItemType::Note),
            "image" => Some(ItemType::Image),
            "search" => Some(ItemType::Search),
            _ => None,
        }
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored knowledge item.
///
/// `title` is never empty: every pipeline stage has a fallback title policy.
/// `tags` holds lowercase trimmed names as persisted in the vault's `tags`
/// table. `raw_content` (the full extracted page text) is kept out of API
/// responses.
#[derive(Debug, Clone, Serialize)]
pub struct Item {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip)]
    pub raw_content: Option<String>,
    /// Path of the stored blob, relative to the owner's vault directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// A blank item of the given type. [`crate::vault::Vault::create_item`]
    /// assigns the id and timestamps at insert time.
    pub fn new(item_type: ItemType) -> Self {
        Item {
            id: String::new(),
            item_type,
            url: None,
            title: String::new(),
            content: None,
            summary: None,
            raw_content: None,
            image_path: None,
            tags: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

/// A typed, weighted edge between two items in the same vault.
///
/// `(source_id, target_id, relation_type)` is unique; writes are upserts.
/// `relation_type` is `"link"` for explicit wiki-link citations, `"tag"`
/// for shared-tag heuristic edges, or an LLM-suggested type.
#[derive(Debug, Clone, Serialize)]
pub struct Relationship {
    pub id: i64,
    pub source_id: String,
    pub target_id: String,
    pub relation_type: String,
    /// Edge weight in `[0.0, 1.0]`.
    pub strength: f64,
}

/// A full-text search hit: the item plus the matched-region snippet and the
/// raw BM25 score (smaller is better).
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub item: Item,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub snippet: String,
    pub score: f64,
}

/// Submission kind as it arrives from the outside.
///
/// `Topic` is a short free-text query routed to the web-search client; it
/// is stored as [`ItemType::Search`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Link,
    Note,
    Image,
    Topic,
}

/// A raw submission before any processing.
#[derive(Debug, Clone, Default)]
pub struct RawContent {
    pub kind: ContentKind,
    pub owner_id: i64,
    /// Target URL for `Link` submissions.
    pub url: String,
    /// Note body or topic query.
    pub text: String,
    /// Raw image bytes for `Image` submissions.
    pub image_data: Vec<u8>,
    /// Image file extension without the dot: `jpg`, `png`, ...
    pub image_ext: String,
    /// Optional caption accompanying an image.
    pub caption: String,
    /// Preferred language code hint (e.g. `"en"`, `"ru-RU"`). Advisory;
    /// the vault's `language` setting wins.
    pub language: String,
}

impl Default for ContentKind {
    fn default() -> Self {
        ContentKind::Note
    }
}
