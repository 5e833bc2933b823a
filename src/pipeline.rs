//! Ingestion pipeline: submission → extraction → enrichment → persistence
//! → relationship inference.
//!
//! Dispatch is by submission kind; each stage tolerates the failures of
//! its external collaborators (page fetch, language model, web search) and
//! degrades to a documented fallback instead of aborting. A submission is
//! persisted whenever the stage produced an item — only vault access and
//! blob/database writes are fatal. Items that missed enrichment carry the
//! `uncategorized` tag.
//!
//! Relationship inference runs after the item commits and never fails the
//! submission (see [`crate::relate`]).

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::extract::PageExtractor;
use crate::lang::{self, Lang, LangCache};
use crate::llm::LanguageModel;
use crate::manager::VaultManager;
use crate::models::{ContentKind, Item, ItemType, RawContent};
use crate::parse::{hashtags, merge_tags, note_title, truncate_chars};
use crate::relate;
use crate::websearch::{TopicResult, TopicSearch};

const FALLBACK_TAG: &str = "uncategorized";

pub struct Pipeline {
    manager: Arc<VaultManager>,
    extractor: Arc<dyn PageExtractor>,
    llm: Arc<dyn LanguageModel>,
    search: Arc<dyn TopicSearch>,
    lang_cache: LangCache,
    relation_suggestions: bool,
}

impl Pipeline {
    pub fn new(
        manager: Arc<VaultManager>,
        extractor: Arc<dyn PageExtractor>,
        llm: Arc<dyn LanguageModel>,
        search: Arc<dyn TopicSearch>,
    ) -> Self {
        Pipeline {
            manager,
            extractor,
            llm,
            search,
            lang_cache: LangCache::new(),
            relation_suggestions: false,
        }
    }

    /// Additionally ask the model for cross-item edges after each ingest.
    pub fn with_relation_suggestions(mut self, enabled: bool) -> Self {
        self.relation_suggestions = enabled;
        self
    }

    /// Runs one submission through its stage graph and persists the result.
    pub async fn process(&self, raw: RawContent) -> Result<Item> {
        let vault = self.manager.vault(raw.owner_id).await.context("get vault")?;

        // Tag-consistency hint for the model; an empty list is fine.
        let existing_tags = vault.all_tags().await.unwrap_or_default();
        let lang = lang::resolve(&self.lang_cache, &vault, raw.owner_id, &raw.language).await;

        let mut item = match raw.kind {
            ContentKind::Link => self.process_link(&raw, lang, &existing_tags).await?,
            ContentKind::Note => self.process_note(&raw, lang, &existing_tags).await?,
            ContentKind::Image => self.process_image(&raw, lang, &existing_tags).await?,
            ContentKind::Topic => self.process_topic(&raw, lang, &existing_tags).await?,
        };

        vault.create_item(&mut item).await.context("save item")?;

        info!(id = %item.id, title = %item.title, tags = ?item.tags, "processed item");

        let llm = self.relation_suggestions.then(|| self.llm.as_ref());
        relate::infer(&vault, &item, llm).await;

        Ok(item)
    }

    async fn process_link(
        &self,
        raw: &RawContent,
        lang: Lang,
        existing_tags: &[String],
    ) -> Result<Item> {
        let extracted = match self.extractor.extract(&raw.url).await {
            Ok(e) => e,
            Err(e) => {
                warn!(url = %raw.url, error = %e, "extraction failed, using basic info");
                let mut item = Item::new(ItemType::Link);
                item.url = Some(raw.url.clone());
                item.title = raw.url.clone();
                item.content = opt(raw.text.clone());
                item.tags = vec![FALLBACK_TAG.to_string()];
                return Ok(item);
            }
        };

        let mut item = Item::new(ItemType::Link);
        item.url = Some(raw.url.clone());
        item.content = opt(extracted.excerpt.clone());
        item.raw_content = opt(extracted.content.clone());

        match self
            .llm
            .summarize("web article", &extracted.content, lang, existing_tags)
            .await
        {
            Ok(processed) => {
                item.title = fallback_title(processed.title, &extracted.title, &raw.url);
                item.summary = opt(processed.summary);
                item.tags = processed.tags;
            }
            Err(e) => {
                warn!(error = %e, "llm processing failed");
                item.title = fallback_title(extracted.title, &raw.url, &raw.url);
                item.tags = vec![FALLBACK_TAG.to_string()];
            }
        }

        Ok(item)
    }

    async fn process_note(
        &self,
        raw: &RawContent,
        lang: Lang,
        existing_tags: &[String],
    ) -> Result<Item> {
        let explicit_title = note_title(&raw.text);
        let explicit_tags = hashtags(&raw.text);

        let mut item = Item::new(ItemType::Note);
        item.content = opt(raw.text.clone());

        match self.llm.summarize("note", &raw.text, lang, existing_tags).await {
            Ok(processed) => {
                // An explicit heading beats whatever the model proposes.
                item.title = match explicit_title {
                    Some(t) => t,
                    None => fallback_title(processed.title, &truncate_chars(&raw.text, 50), "note"),
                };
                item.summary = opt(processed.summary);
                item.tags = merge_tags(&processed.tags, &explicit_tags);
            }
            Err(e) => {
                warn!(error = %e, "llm processing failed");
                item.title = explicit_title.unwrap_or_else(|| truncate_chars(&raw.text, 50));
                item.tags = merge_tags(&[FALLBACK_TAG.to_string()], &explicit_tags);
            }
        }

        Ok(item)
    }

    async fn process_image(
        &self,
        raw: &RawContent,
        lang: Lang,
        existing_tags: &[String],
    ) -> Result<Item> {
        let item_id = Uuid::new_v4().to_string();

        let user_dir = self.manager.user_dir(raw.owner_id);
        let images_dir = user_dir.join("images");
        std::fs::create_dir_all(&images_dir).context("create images dir")?;

        // Blob write failure is fatal to the submission; an image item
        // without its image is worthless.
        let image_path = format!("images/{}.{}", item_id, raw.image_ext);
        std::fs::write(user_dir.join(&image_path), &raw.image_data).context("write image")?;

        info!(id = %item_id, path = %image_path, size = raw.image_data.len(), "saved image");

        let mut item = Item::new(ItemType::Image);
        item.id = item_id;
        item.image_path = Some(image_path);

        if raw.caption.is_empty() {
            item.title = "Image".to_string();
            item.tags = vec!["image".to_string()];
            return Ok(item);
        }

        let explicit_tags = hashtags(&raw.caption);
        item.content = opt(raw.caption.clone());

        match self
            .llm
            .summarize("note with image", &raw.caption, lang, existing_tags)
            .await
        {
            Ok(processed) => {
                item.title = fallback_title(processed.title, &truncate_chars(&raw.caption, 100), "Image");
                item.summary = opt(processed.summary);
                let mut secondary = explicit_tags;
                secondary.push("image".to_string());
                item.tags = merge_tags(&processed.tags, &secondary);
            }
            Err(e) => {
                warn!(error = %e, "llm processing failed for image caption");
                item.title = truncate_chars(&raw.caption, 100);
                item.tags = merge_tags(
                    &["image".to_string(), FALLBACK_TAG.to_string()],
                    &explicit_tags,
                );
            }
        }

        Ok(item)
    }

    async fn process_topic(
        &self,
        raw: &RawContent,
        lang: Lang,
        existing_tags: &[String],
    ) -> Result<Item> {
        let topic = raw.text.trim();

        // A failed lookup still reaches the model, which falls back to its
        // general knowledge of the topic.
        let search_result = match self.search.search(topic).await {
            Ok(r) => r,
            Err(e) => {
                warn!(topic = %topic, error = %e, "search failed, using llm knowledge");
                TopicResult::default()
            }
        };

        let mut search_text = search_result.format_for_llm();
        if search_text.is_empty() {
            search_text = "(No search results found)".to_string();
        }

        let mut item = Item::new(ItemType::Search);
        item.url = opt(search_result.abstract_url.clone());
        item.content = opt(search_text.clone());

        match self
            .llm
            .summarize_search(topic, &search_text, lang, existing_tags)
            .await
        {
            Ok(processed) => {
                item.title = fallback_title(processed.title, topic, "search");
                item.summary = opt(processed.summary);
                item.tags = processed.tags;
            }
            Err(e) => {
                warn!(error = %e, "llm summarization failed");
                item.title = topic.to_string();
                item.summary = Some(if search_result.abstract_html.is_empty() {
                    format!("Search result for: {topic}")
                } else {
                    search_result.abstract_html.clone()
                });
                item.tags = vec!["search".to_string(), FALLBACK_TAG.to_string()];
            }
        }

        Ok(item)
    }
}

fn opt(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// First non-empty candidate; the last resort must itself be non-empty.
fn fallback_title(primary: String, secondary: &str, last: &str) -> String {
    if !primary.trim().is_empty() {
        primary
    } else if !secondary.trim().is_empty() {
        secondary.to_string()
    } else {
        last.to_string()
    }
}
