//! Relationship inference for a freshly stored item.
//!
//! Two mechanisms compose, both bounded by the recent-item cap:
//!
//! 1. **Explicit wiki-links** — `[[Target]]` tokens in the new item's
//!    content produce `link` edges to existing items whose normalized
//!    title matches, and existing items citing the new item's title get
//!    back-edges. Strength is always 1.0.
//! 2. **Tag overlap** — pairs sharing at least one non-generic tag get a
//!    `tag` edge with strength `0.4 + 0.15 × overlap`, capped at 1.0,
//!    unless the pair was just connected by a link. The lexicographically
//!    smaller id becomes the source so the edge is deterministic.
//!
//! Optionally the language model contributes typed suggestions; only
//! those with strength >= 0.7 are materialized, with the suggested
//! relation type stored verbatim.
//!
//! Everything here is best-effort: failures are logged and skipped, and
//! ingestion never fails because inference did.

use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

use crate::graph::GRAPH_ITEM_LIMIT;
use crate::llm::LanguageModel;
use crate::models::{Item, Relationship};
use crate::parse::{filter_graph_tags, normalize_title, wiki_link_targets};
use crate::vault::Vault;

/// Recent items offered to the model as candidate targets.
const SUGGESTION_CANDIDATES: usize = 50;

/// Finds related items and writes graph edges for `item`.
pub async fn infer(vault: &Vault, item: &Item, llm: Option<&dyn LanguageModel>) {
    let all_items = match vault.list_items(GRAPH_ITEM_LIMIT, 0).await {
        Ok(items) => items,
        Err(e) => {
            warn!(error = %e, "failed to fetch items for relationships");
            return;
        }
    };

    if all_items.len() <= 1 {
        return;
    }

    let mut created = 0usize;

    let title_index = build_title_index(&all_items);
    let new_title_key = normalize_title(&item.title);

    // Ids this run connected with a link edge; those pairs skip the tag
    // heuristic below.
    let mut linked_ids: HashSet<String> = HashSet::new();

    let content = item.content.as_deref().unwrap_or("");
    for target_key in wiki_link_targets(content) {
        let Some(target) = title_index.get(target_key.as_str()) else {
            continue;
        };
        if target.id == item.id {
            continue;
        }

        if let Err(e) = upsert(vault, &item.id, &target.id, "link", 1.0).await {
            warn!(source = %item.id, target = %target.id, error = %e, "failed to create link relationship");
            continue;
        }
        linked_ids.insert(target.id.clone());
        created += 1;
    }

    if !new_title_key.is_empty() {
        for other in &all_items {
            if other.id == item.id || !links_to_title(other, &new_title_key) {
                continue;
            }

            if let Err(e) = upsert(vault, &other.id, &item.id, "link", 1.0).await {
                warn!(source = %other.id, target = %item.id, error = %e, "failed to create back link relationship");
                continue;
            }
            linked_ids.insert(other.id.clone());
            created += 1;
        }
    }

    let new_tags = filter_graph_tags(&item.tags);
    if !new_tags.is_empty() {
        let new_tag_set: HashSet<&str> = new_tags.iter().map(String::as_str).collect();

        for other in &all_items {
            if other.id == item.id || linked_ids.contains(&other.id) {
                continue;
            }

            let overlap = filter_graph_tags(&other.tags)
                .iter()
                .filter(|t| new_tag_set.contains(t.as_str()))
                .count();
            if overlap == 0 {
                continue;
            }

            let (source_id, target_id) = ordered_pair(&item.id, &other.id);
            if let Err(e) = upsert(vault, source_id, target_id, "tag", tag_overlap_strength(overlap)).await {
                warn!(source = %source_id, target = %target_id, error = %e, "failed to create tag relationship");
                continue;
            }
            created += 1;
        }
    }

    if let Some(llm) = llm {
        created += suggest(vault, item, &all_items, llm).await;
    }

    if created > 0 {
        info!(item_id = %item.id, count = created, "created relationships");
    }
}

/// Asks the model for typed edges and materializes the confident ones.
async fn suggest(vault: &Vault, item: &Item, all_items: &[Item], llm: &dyn LanguageModel) -> usize {
    let known_ids: HashSet<&str> = all_items.iter().map(|i| i.id.as_str()).collect();

    let block: String = all_items
        .iter()
        .filter(|other| other.id != item.id)
        .take(SUGGESTION_CANDIDATES)
        .map(|other| format!("{} | {} | tags: {}\n", other.id, other.title, other.tags.join(", ")))
        .collect();

    let summary = item.summary.as_deref().unwrap_or("");
    let suggestions = match llm.suggest_relations(&item.title, summary, &item.tags, &block).await {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "relationship suggestion failed");
            return 0;
        }
    };

    let mut created = 0;
    for s in suggestions {
        if s.strength < 0.7 || s.target_id == item.id || !known_ids.contains(s.target_id.as_str()) {
            continue;
        }
        if let Err(e) = upsert(vault, &item.id, &s.target_id, &s.relation_type, s.strength).await {
            warn!(target = %s.target_id, error = %e, "failed to create suggested relationship");
            continue;
        }
        created += 1;
    }
    created
}

async fn upsert(
    vault: &Vault,
    source_id: &str,
    target_id: &str,
    relation_type: &str,
    strength: f64,
) -> anyhow::Result<()> {
    vault
        .create_relationship(&Relationship {
            id: 0,
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            relation_type: relation_type.to_string(),
            strength,
        })
        .await
}

fn tag_overlap_strength(overlap: usize) -> f64 {
    (0.4 + 0.15 * overlap as f64).min(1.0)
}

fn ordered_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// First item per normalized title wins; later duplicates are ignored.
fn build_title_index(items: &[Item]) -> HashMap<String, &Item> {
    let mut index = HashMap::with_capacity(items.len());
    for item in items {
        let key = normalize_title(&item.title);
        if key.is_empty() {
            continue;
        }
        index.entry(key).or_insert(item);
    }
    index
}

fn links_to_title(item: &Item, title_key: &str) -> bool {
    let Some(content) = item.content.as_deref() else {
        return false;
    };
    wiki_link_targets(content).iter().any(|t| t == title_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strength_is_linear_and_clamped() {
        assert!((tag_overlap_strength(1) - 0.55).abs() < 1e-9);
        assert!((tag_overlap_strength(2) - 0.7).abs() < 1e-9);
        assert!((tag_overlap_strength(4) - 1.0).abs() < 1e-9);
        assert!((tag_overlap_strength(10) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn pair_ordering_is_deterministic() {
        assert_eq!(ordered_pair("b", "a"), ("a", "b"));
        assert_eq!(ordered_pair("a", "b"), ("a", "b"));
    }
}
