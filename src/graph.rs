//! Relationship storage and the graph snapshot.
//!
//! Edges are owned by the vault and cascade away with either endpoint.
//! Writes are upserts on `(source_id, target_id, relation_type)`.
//!
//! The graph view is bounded to the 1 000 most-recent items. Because the
//! wiki-link and tag-overlap writers run concurrently, a pair can end up
//! carrying both a `link` and a `tag` edge; the snapshot reports only the
//! `link` edge for such pairs so renderers draw one line, not two.

use anyhow::{Context, Result};
use sqlx::Row;
use std::collections::HashSet;

use crate::models::{Item, Relationship};
use crate::vault::Vault;

/// Upper bound on items included in a graph snapshot.
pub const GRAPH_ITEM_LIMIT: i64 = 1000;

impl Vault {
    /// Upserts an edge. Strength is stored verbatim.
    pub async fn create_relationship(&self, rel: &Relationship) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO relationships (source_id, target_id, relation_type, strength)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(source_id, target_id, relation_type)
            DO UPDATE SET strength = excluded.strength
            "#,
        )
        .bind(&rel.source_id)
        .bind(&rel.target_id)
        .bind(&rel.relation_type)
        .bind(rel.strength)
        .execute(self.pool())
        .await
        .context("create relationship")?;
        Ok(())
    }

    /// Edges incident on the item, in either direction.
    pub async fn relationships(&self, item_id: &str) -> Result<Vec<Relationship>> {
        let rows = sqlx::query(
            r#"
            SELECT id, source_id, target_id, relation_type, strength
            FROM relationships
            WHERE source_id = ? OR target_id = ?
            "#,
        )
        .bind(item_id)
        .bind(item_id)
        .fetch_all(self.pool())
        .await
        .context("query relationships")?;

        Ok(rows.iter().map(rel_from_row).collect())
    }

    /// Bounded snapshot of the vault's items and edges for rendering.
    ///
    /// Tag edges between pairs that also carry a link edge are dropped;
    /// every other relation type passes through unchanged.
    pub async fn graph(&self) -> Result<(Vec<Item>, Vec<Relationship>)> {
        let items = self.list_items(GRAPH_ITEM_LIMIT, 0).await?;

        let rows = sqlx::query(
            "SELECT id, source_id, target_id, relation_type, strength FROM relationships",
        )
        .fetch_all(self.pool())
        .await
        .context("query graph edges")?;

        let rels: Vec<Relationship> = rows.iter().map(rel_from_row).collect();

        let linked_pairs: HashSet<(String, String)> = rels
            .iter()
            .filter(|r| r.relation_type == "link")
            .map(|r| unordered(&r.source_id, &r.target_id))
            .collect();

        let rels = rels
            .into_iter()
            .filter(|r| {
                r.relation_type != "tag" || !linked_pairs.contains(&unordered(&r.source_id, &r.target_id))
            })
            .collect();

        Ok((items, rels))
    }

    /// Removes every edge from `source_id` to `target_id` regardless of
    /// type.
    pub async fn delete_relationship(&self, source_id: &str, target_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM relationships WHERE source_id = ? AND target_id = ?")
            .bind(source_id)
            .bind(target_id)
            .execute(self.pool())
            .await
            .context("delete relationship")?;
        Ok(())
    }
}

fn rel_from_row(row: &sqlx::sqlite::SqliteRow) -> Relationship {
    Relationship {
        id: row.get("id"),
        source_id: row.get("source_id"),
        target_id: row.get("target_id"),
        relation_type: row.get("relation_type"),
        strength: row.get("strength"),
    }
}

fn unordered(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}
