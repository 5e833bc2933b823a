//! Text parsing for notes and captions: explicit titles, hashtags,
//! wiki-links, and tag normalization.

use regex::Regex;
use std::sync::LazyLock;

static WIKI_LINK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\[\]]+)\]\]").unwrap());

// Hashtags must follow start-of-text or whitespace, which keeps URL
// fragments (…/#anchor) out.
static HASHTAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)#([\p{L}\p{N}][\p{L}\p{N}_-]*(?:/[\p{L}\p{N}_-]+)*)").unwrap()
});

/// An explicit note title: the first non-empty line, iff it is an ATX
/// level-1 heading. A deeper heading or a plain line means no title.
pub fn note_title(text: &str) -> Option<String> {
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if !trimmed.starts_with('#') {
            return None;
        }

        let hashes = trimmed.chars().take_while(|&c| c == '#').count();
        if hashes == 1 {
            let title = trimmed[1..].trim();
            if !title.is_empty() {
                return Some(title.to_string());
            }
        }
        return None;
    }
    None
}

/// Hashtags in the text, normalized and deduplicated, in order of first
/// appearance. Supports nesting: `#tag/sub`.
pub fn hashtags(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut tags = Vec::new();
    for cap in HASHTAG_PATTERN.captures_iter(text) {
        let tag = normalize_tag(&cap[1]);
        if tag.is_empty() || !seen.insert(tag.clone()) {
            continue;
        }
        tags.push(tag);
    }
    tags
}

/// Canonical wiki-link targets in the content, deduplicated, in order of
/// first appearance. `[[Target|alias]]` and `[[Target#section]]` reduce to
/// the normalized base target.
pub fn wiki_link_targets(content: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut targets = Vec::new();
    for cap in WIKI_LINK_PATTERN.captures_iter(content) {
        let target = normalize_wiki_target(&cap[1]);
        if target.is_empty() || !seen.insert(target.clone()) {
            continue;
        }
        targets.push(target);
    }
    targets
}

fn normalize_wiki_target(raw: &str) -> String {
    let base = raw.split('|').next().unwrap_or("");
    let base = base.split('#').next().unwrap_or("");
    normalize_title(base)
}

/// Lowercased, whitespace-collapsed title key used for wiki-link matching.
pub fn normalize_title(title: &str) -> String {
    title
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

/// Merges two tag lists, normalized and deduplicated, primary list first.
pub fn merge_tags(primary: &[String], secondary: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut merged = Vec::new();
    for tag in primary.iter().chain(secondary.iter()) {
        let tag = normalize_tag(tag);
        if tag.is_empty() || !seen.insert(tag.clone()) {
            continue;
        }
        merged.push(tag);
    }
    merged
}

/// Drops the generic tags that say nothing about subject matter, leaving
/// the set used for tag-overlap edges.
pub fn filter_graph_tags(tags: &[String]) -> Vec<String> {
    const GENERIC: [&str; 5] = ["uncategorized", "image", "search", "link", "note"];
    tags.iter()
        .map(|t| normalize_tag(t))
        .filter(|t| !t.is_empty() && !GENERIC.contains(&t.as_str()))
        .collect()
}

/// Truncates to at most `max` characters, appending an ellipsis when
/// anything was cut. Respects char boundaries.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push_str("...");
    out
}
