//! Obsidian-style vault export.
//!
//! Serializes the graph snapshot to a zip archive of
//! `notes/<sanitized-title>.md` files. Each note carries YAML frontmatter,
//! the summary as a blockquote, the source link, the content, and a
//! `## Related` section of `[[wiki-links]]` for its outgoing `link` edges.
//! Tag edges stay out of the export — they are a rendering heuristic, not
//! a citation.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::{Cursor, Write as _};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::models::Item;
use crate::vault::Vault;

/// Exports the vault as zip bytes.
pub async fn export_vault(vault: &Vault) -> Result<Vec<u8>> {
    let (items, relationships) = vault.graph().await.context("get graph")?;

    // Outgoing link edges per item, for the Related sections.
    let mut rel_map: HashMap<&str, Vec<&str>> = HashMap::new();
    for r in &relationships {
        if r.relation_type != "link" {
            continue;
        }
        rel_map.entry(r.source_id.as_str()).or_default().push(r.target_id.as_str());
    }

    let title_map: HashMap<&str, &str> = items
        .iter()
        .map(|item| (item.id.as_str(), item.title.as_str()))
        .collect();

    let mut zw = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    for item in &items {
        let related = rel_map.get(item.id.as_str()).map(Vec::as_slice).unwrap_or(&[]);
        let content = item_to_markdown(item, related, &title_map);
        let filename = format!("notes/{}.md", sanitize_filename(&item.title));

        zw.start_file(filename, options).context("add archive entry")?;
        zw.write_all(content.as_bytes()).context("write archive entry")?;
    }

    let cursor = zw.finish().context("finish archive")?;
    Ok(cursor.into_inner())
}

fn item_to_markdown(item: &Item, related_ids: &[&str], title_map: &HashMap<&str, &str>) -> String {
    let mut md = String::new();

    md.push_str("---\n");
    let _ = writeln!(md, "id: {}", item.id);
    let _ = writeln!(md, "type: {}", item.item_type);
    if let Some(url) = &item.url {
        let _ = writeln!(md, "url: \"{url}\"");
    }
    let _ = writeln!(md, "created: {}", item.created_at.to_rfc3339());
    if !item.tags.is_empty() {
        let _ = writeln!(md, "tags: [{}]", item.tags.join(", "));
    }
    md.push_str("---\n\n");

    let _ = writeln!(md, "# {}\n", item.title);

    if let Some(summary) = &item.summary {
        let _ = writeln!(md, "> {summary}\n");
    }

    if let Some(url) = &item.url {
        let _ = writeln!(md, "**Source:** [{url}]({url})\n");
    }

    if let Some(content) = &item.content {
        md.push_str("## Content\n\n");
        md.push_str(content);
        md.push_str("\n\n");
    }

    if !related_ids.is_empty() {
        md.push_str("## Related\n\n");
        for id in related_ids {
            if let Some(title) = title_map.get(id) {
                let _ = writeln!(md, "- [[{title}]]");
            }
        }
    }

    md
}

/// Makes a title safe as a filename: path and shell-hostile characters are
/// replaced or dropped, length capped at 100 chars, `untitled` when
/// nothing survives.
fn sanitize_filename(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '/' | '\\' | ':' | '|' => out.push('-'),
            '*' | '?' | '"' | '<' | '>' | '\r' => {}
            '\n' => out.push(' '),
            _ => out.push(c),
        }
    }

    let mut out = out.trim().to_string();
    if out.chars().count() > 100 {
        out = out.chars().take(100).collect();
    }

    if out.is_empty() {
        out = "untitled".to_string();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemType;

    fn sample_item() -> Item {
        let mut item = Item::new(ItemType::Link);
        item.id = "abc-123".to_string();
        item.title = "Post".to_string();
        item.url = Some("https://example.com/post".to_string());
        item.summary = Some("A greeting.".to_string());
        item.content = Some("Hello".to_string());
        item.tags = vec!["greeting".to_string(), "example".to_string()];
        item
    }

    #[test]
    fn markdown_layout() {
        let item = sample_item();
        let mut titles = HashMap::new();
        titles.insert("other-id", "Beta");

        let md = item_to_markdown(&item, &["other-id"], &titles);

        assert!(md.starts_with("---\nid: abc-123\ntype: link\n"));
        assert!(md.contains("url: \"https://example.com/post\""));
        assert!(md.contains("tags: [greeting, example]"));
        assert!(md.contains("\n# Post\n"));
        assert!(md.contains("> A greeting."));
        assert!(md.contains("**Source:** [https://example.com/post](https://example.com/post)"));
        assert!(md.contains("## Content\n\nHello"));
        assert!(md.contains("## Related\n\n- [[Beta]]\n"));
    }

    #[test]
    fn frontmatter_omits_absent_fields() {
        let mut item = Item::new(ItemType::Note);
        item.id = "n1".to_string();
        item.title = "Bare".to_string();

        let md = item_to_markdown(&item, &[], &HashMap::new());
        assert!(!md.contains("url:"));
        assert!(!md.contains("tags:"));
        assert!(!md.contains("## Content"));
        assert!(!md.contains("## Related"));
    }

    #[test]
    fn filenames_are_sanitized() {
        assert_eq!(sanitize_filename("a/b\\c:d|e"), "a-b-c-d-e");
        assert_eq!(sanitize_filename("what? \"why\" <how>"), "what why how");
        assert_eq!(sanitize_filename("line\nbreak"), "line break");
        assert_eq!(sanitize_filename("  "), "untitled");
        assert_eq!(sanitize_filename(""), "untitled");
        let long = "x".repeat(150);
        assert_eq!(sanitize_filename(&long).chars().count(), 100);
    }
}
